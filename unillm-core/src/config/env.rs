//! Environment variable interpolation for configuration

use super::error::ConfigError;
use super::schema::ProviderConfig;
use super::secrets::SecretString;
use regex::{Captures, Regex};
use std::env;

const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

fn env_var_pattern() -> Result<Regex, ConfigError> {
    Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Invalid {
        message: format!("bad interpolation pattern: {}", e),
    })
}

/// Replace every `${VAR}` in `content`, failing on the first unset variable
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let pattern = env_var_pattern()?;
    let mut missing: Option<String> = None;

    let result = pattern.replace_all(content, |cap: &Captures| match env::var(&cap[1]) {
        Ok(value) => value,
        Err(_) => {
            missing.get_or_insert_with(|| cap[1].to_string());
            String::new()
        }
    });

    match missing {
        Some(var) => Err(ConfigError::EnvVarNotFound { var }),
        None => Ok(result.into_owned()),
    }
}

/// Interpolate the secret and URL fields of a programmatically built provider
pub fn interpolate_provider_env_vars(provider: &mut ProviderConfig) -> Result<(), ConfigError> {
    let pattern = env_var_pattern()?;

    if pattern.is_match(provider.api_key.expose_secret()) {
        provider.api_key = SecretString::new(interpolate_env_vars(provider.api_key.expose_secret())?);
    }

    if let Some(base_url) = &provider.base_url {
        if pattern.is_match(base_url) {
            provider.base_url = Some(interpolate_env_vars(base_url)?);
        }
    }

    if let Some(vertex) = &mut provider.vertex {
        if pattern.is_match(vertex.access_token.expose_secret()) {
            vertex.access_token =
                SecretString::new(interpolate_env_vars(vertex.access_token.expose_secret())?);
        }
    }

    for value in provider.default_headers.values_mut() {
        if pattern.is_match(value) {
            *value = interpolate_env_vars(value)?;
        }
    }

    Ok(())
}
