//! Provider error types and handling

use thiserror::Error;

use crate::http::error::TransportError;
use crate::providers::adapter::Capability;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when interacting with LLM providers
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request asked for something the vendor cannot do
    #[error("{provider} does not support {capability}")]
    UnsupportedFeature {
        provider: String,
        capability: Capability,
    },

    /// Network, timeout or unrecognized non-2xx failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Well-formed error payload returned by the vendor
    #[error("Provider error{}: {code}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Vendor {
        status: Option<u16>,
        code: String,
        message: String,
    },

    /// Tool call names a tool the registry does not know
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool result whose call id no earlier assistant turn issued
    #[error("Tool result references unknown tool call id '{tool_call_id}'")]
    OrphanedToolResult { tool_call_id: String },

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The stream ended before the vendor closed the turn
    #[error("Stream ended before the turn completed")]
    IncompleteStream,

    /// Response parsing error
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Structured output rejected by the caller's schema validator
    #[error("Structured output does not match schema: {0}")]
    StructuredOutput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    pub(crate) fn unsupported(provider: &str, capability: Capability) -> Self {
        ProviderError::UnsupportedFeature {
            provider: provider.to_string(),
            capability,
        }
    }

    pub(crate) fn vendor(status: Option<u16>, code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Vendor {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(err) => err.is_retryable(),
            ProviderError::Vendor {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}

impl From<crate::config::ConfigError> for ProviderError {
    fn from(err: crate::config::ConfigError) -> Self {
        ProviderError::Configuration(err.to_string())
    }
}
