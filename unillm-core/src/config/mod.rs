//! Configuration module
//!
//! Provider settings can be built in code with [`ProviderConfig`] or loaded
//! from YAML/JSON files. Files are interpolated with `${ENV_VAR}` references
//! before parsing and validated after.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::{interpolate_env_vars, interpolate_provider_env_vars};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{ConnectionConfig, ProviderConfig, UnillmConfig, VertexConfig, CONFIG_VERSION};
pub use secrets::{SafeLogging, SecretString};
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

fn read_config(path: &Path) -> Result<String, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;

    // Interpolate environment variables before parsing
    env::interpolate_env_vars(&content)
}

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<UnillmConfig, ConfigError> {
    let path = path.as_ref();
    let interpolated = read_config(path)?;

    let config: UnillmConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    tracing::debug!(path = %path.display(), providers = config.providers.len(), "Loaded configuration");
    Ok(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<UnillmConfig, ConfigError> {
    let path = path.as_ref();
    let interpolated = read_config(path)?;

    let config: UnillmConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    tracing::debug!(path = %path.display(), providers = config.providers.len(), "Loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::adapter::ProviderKind;

    #[test]
    fn test_parse_valid_yaml() {
        let yaml = r#"
version: "0.1"
providers:
  - name: openai
    type: openai
    api_key: sk-test
  - name: gemini
    type: google
    vertex:
      project_id: my-project
      location_id: us-central1
      access_token: ya29.token
"#;
        let config: UnillmConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(ConfigValidator::new().validate(&config).is_ok());
        assert_eq!(config.provider("gemini").unwrap().kind, ProviderKind::Google);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
version: "0.1"
providers:
  - name: openai
    type: openai
    api_key: sk-test
    routing: round_robin
"#;
        assert!(serde_yaml::from_str::<UnillmConfig>(yaml).is_err());
    }
}
