//! Configuration validation utilities

use super::error::ValidationError;
use super::schema::{ProviderConfig, UnillmConfig};
use crate::http::RetryPolicy;
use crate::providers::adapter::ProviderKind;
use reqwest::header::{HeaderName, HeaderValue};

/// Configuration validator with rules that span several fields
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &UnillmConfig) -> Result<(), ValidationError> {
        config.validate()?;

        for (i, provider) in config.providers.iter().enumerate() {
            self.validate_provider_rules(provider, &format!("providers[{}]", i))?;
        }

        Ok(())
    }

    /// Validate one provider with extended rules
    pub fn validate_provider(&self, provider: &ProviderConfig, path: &str) -> Result<(), ValidationError> {
        provider.validate(path)?;
        self.validate_provider_rules(provider, path)
    }

    fn validate_provider_rules(&self, provider: &ProviderConfig, path: &str) -> Result<(), ValidationError> {
        if provider.vertex.is_some() && provider.kind != ProviderKind::Google {
            return Err(ValidationError::incompatible(
                format!("{}.vertex", path),
                format!("Vertex settings apply to google providers, not {}", provider.kind),
            ));
        }

        if (provider.http_referer.is_some() || provider.x_title.is_some())
            && provider.kind != ProviderKind::OpenRouter
        {
            return Err(ValidationError::incompatible(
                format!("{}.http_referer", path),
                format!("Attribution headers apply to openrouter providers, not {}", provider.kind),
            ));
        }

        if provider.default_max_tokens == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.default_max_tokens", path),
                "Must be greater than 0",
            ));
        }

        for (name, value) in &provider.default_headers {
            let field = format!("{}.default_headers.{}", path, name);
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ValidationError::invalid_format(field, "not a valid header name"));
            }
            if HeaderValue::from_str(value).is_err() {
                return Err(ValidationError::invalid_format(field, "not a valid header value"));
            }
        }

        if let Some(retry) = &provider.retry_policy {
            validate_retry_policy(retry, &format!("{}.retry_policy", path))?;
        }

        Ok(())
    }
}

fn validate_retry_policy(policy: &RetryPolicy, path: &str) -> Result<(), ValidationError> {
    if policy.max_retries > 0 && policy.initial_delay_ms == 0 {
        return Err(ValidationError::out_of_range(
            format!("{}.initial_delay_ms", path),
            "Must be greater than 0",
        ));
    }

    if policy.max_delay_ms < policy.initial_delay_ms {
        return Err(ValidationError::incompatible(
            format!("{}.max_delay_ms", path),
            "Must be >= initial_delay_ms",
        ));
    }

    if policy.exponential_base < 1.0 {
        return Err(ValidationError::out_of_range(
            format!("{}.exponential_base", path),
            "Must be at least 1.0",
        ));
    }

    if !(0.0..=1.0).contains(&policy.jitter_factor) {
        return Err(ValidationError::out_of_range(
            format!("{}.jitter_factor", path),
            "Must be between 0.0 and 1.0",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VertexConfig;

    #[test]
    fn test_vertex_on_wrong_kind() {
        let provider = ProviderConfig::new(ProviderKind::OpenAI, "sk-test")
            .with_vertex(VertexConfig::new("p", "global", "t"));
        let err = ConfigValidator::new().validate_provider(&provider, "p").unwrap_err();
        assert_eq!(err.field_path, "p.vertex");
    }

    #[test]
    fn test_attribution_on_wrong_kind() {
        let provider = ProviderConfig::new(ProviderKind::Claude, "key").with_attribution("https://a.b", "App");
        assert!(ConfigValidator::new().validate_provider(&provider, "p").is_err());

        let provider = ProviderConfig::new(ProviderKind::OpenRouter, "key").with_attribution("https://a.b", "App");
        assert!(ConfigValidator::new().validate_provider(&provider, "p").is_ok());
    }

    #[test]
    fn test_bad_header_name() {
        let provider = ProviderConfig::new(ProviderKind::OpenAI, "key").with_header("bad header", "v");
        let err = ConfigValidator::new().validate_provider(&provider, "p").unwrap_err();
        assert_eq!(err.field_path, "p.default_headers.bad header");
    }

    #[test]
    fn test_retry_policy_rules() {
        let policy = RetryPolicy {
            initial_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..RetryPolicy::default()
        };
        let provider = ProviderConfig::new(ProviderKind::OpenAI, "key").with_retry_policy(policy);
        let err = ConfigValidator::new().validate_provider(&provider, "p").unwrap_err();
        assert_eq!(err.field_path, "p.retry_policy.max_delay_ms");
    }
}
