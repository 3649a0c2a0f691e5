//! Configuration schema structures with serde support

use super::error::ValidationError;
use super::secrets::{SafeLogging, SecretString};
use crate::http::RetryPolicy;
use crate::providers::adapter::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Supported schema version
pub const CONFIG_VERSION: &str = "0.1";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UnillmConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Configured providers
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Connection settings for providers that do not set their own
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Settings for one vendor endpoint
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique provider name
    pub name: String,

    /// Vendor family
    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// API key (supports environment variable interpolation)
    #[serde(default)]
    pub api_key: SecretString,

    /// Base URL override
    #[serde(default)]
    pub base_url: Option<String>,

    /// Headers sent with every request
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub default_headers: HashMap<String, String>,

    /// Vertex AI settings (Google only)
    #[serde(default)]
    pub vertex: Option<VertexConfig>,

    /// `HTTP-Referer` attribution header (OpenRouter only)
    #[serde(default)]
    pub http_referer: Option<String>,

    /// `X-Title` attribution header (OpenRouter only)
    #[serde(default)]
    pub x_title: Option<String>,

    /// `max_tokens` sent when the request sets none (Claude only)
    #[serde(default)]
    pub default_max_tokens: Option<u32>,

    /// Provider-specific connection settings
    #[serde(default)]
    pub connection: Option<ConnectionConfig>,

    /// Provider-specific retry policy for the initial request
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
}

/// Google Vertex AI endpoint settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VertexConfig {
    /// GCP project id
    pub project_id: String,

    /// Region, or "global"
    #[serde(default = "default_location")]
    pub location_id: String,

    /// Endpoint host override
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// OAuth bearer token
    #[serde(default)]
    pub access_token: SecretString,
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Request timeout in milliseconds (non-streamed calls)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,

    /// Keep-alive timeout in seconds
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle(),
            keepalive_secs: default_keepalive(),
        }
    }
}

// Default value functions for serde
fn default_location() -> String { "global".to_string() }
fn default_connect_timeout() -> u64 { 10_000 }
fn default_request_timeout() -> u64 { 120_000 }
fn default_max_idle() -> usize { 10 }
fn default_keepalive() -> u64 { 90 }

impl UnillmConfig {
    /// Look up a provider by name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != CONFIG_VERSION {
            return Err(ValidationError::invalid_version(CONFIG_VERSION, &self.version));
        }

        if self.providers.is_empty() {
            return Err(ValidationError::required("providers")
                .with_context("At least one provider must be configured"));
        }

        let mut seen_names = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if !seen_names.insert(&provider.name) {
                return Err(ValidationError::duplicate(
                    format!("providers[{}].name", i),
                    provider.name.clone(),
                ));
            }
            provider.validate(&format!("providers[{}]", i))?;
        }

        self.connection.validate("connection")
    }
}

impl ProviderConfig {
    /// Settings for `kind` authenticated with `api_key`, named after the kind
    pub fn new(kind: ProviderKind, api_key: impl Into<SecretString>) -> Self {
        Self {
            name: kind.as_str().to_string(),
            kind,
            api_key: api_key.into(),
            base_url: None,
            default_headers: HashMap::new(),
            vertex: None,
            http_referer: None,
            x_title: None,
            default_max_tokens: None,
            connection: None,
            retry_policy: None,
        }
    }

    /// Set the provider name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Route Google requests through Vertex AI
    pub fn with_vertex(mut self, vertex: VertexConfig) -> Self {
        self.vertex = Some(vertex);
        self
    }

    /// OpenRouter attribution headers
    pub fn with_attribution(mut self, http_referer: impl Into<String>, x_title: impl Into<String>) -> Self {
        self.http_referer = Some(http_referer.into());
        self.x_title = Some(x_title.into());
        self
    }

    /// Set the connection settings
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Retry the initial request of each call
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Configured base URL or the vendor default
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::required(format!("{}.name", path)));
        }

        let uses_vertex = self.kind == ProviderKind::Google && self.vertex.is_some();
        if self.api_key.is_empty() && !uses_vertex {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        if let Some(base_url) = &self.base_url {
            validate_url(&format!("{}.base_url", path), base_url)?;
        }

        if let Some(vertex) = &self.vertex {
            vertex.validate(&format!("{}.vertex", path))?;
        }

        if let Some(connection) = &self.connection {
            connection.validate(&format!("{}.connection", path))?;
        }

        Ok(())
    }
}

impl SafeLogging for ProviderConfig {
    fn safe_for_logging(&self) -> String {
        format!(
            "{} ({}) base_url={} api_key={}",
            self.name,
            self.kind,
            self.resolved_base_url(),
            self.api_key.partial_redact()
        )
    }
}

impl VertexConfig {
    /// Vertex settings for a project in `location_id`
    pub fn new(
        project_id: impl Into<String>,
        location_id: impl Into<String>,
        access_token: impl Into<SecretString>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location_id: location_id.into(),
            api_endpoint: None,
            access_token: access_token.into(),
        }
    }

    /// Models base URL for this project and location
    pub fn base_url(&self) -> String {
        let host = match &self.api_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None if self.location_id == "global" => "https://aiplatform.googleapis.com".to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location_id),
        };
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/",
            host, self.project_id, self.location_id
        )
    }

    /// Validate Vertex settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.project_id.is_empty() {
            return Err(ValidationError::required(format!("{}.project_id", path)));
        }
        if self.location_id.is_empty() {
            return Err(ValidationError::required(format!("{}.location_id", path)));
        }
        if self.access_token.is_empty() {
            return Err(ValidationError::required(format!("{}.access_token", path)));
        }
        Ok(())
    }
}

impl ConnectionConfig {
    /// Validate connection settings
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connect_timeout_ms", path),
                "Must be greater than 0",
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.request_timeout_ms", path),
                "Must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn validate_url(path: &str, value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(ValidationError::invalid_url(
            path,
            format!("scheme must be http or https, got {}", url.scheme()),
        )),
        Err(e) => Err(ValidationError::invalid_url(path, e.to_string())),
    }
}
