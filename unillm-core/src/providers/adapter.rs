//! Adapter trait and capabilities
//!
//! An adapter translates between the unified data model and one vendor's wire
//! format. Adapters never perform I/O: the facade hands them requests to build
//! and payloads to parse.

use crate::config::ProviderConfig;
use crate::http::error::extract_error_details;
use crate::http::{HttpRequest, SseFrame};
use crate::protocol::{CompletionRequest, Response};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::stream::{DecoderState, StreamEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Core trait that every vendor adapter implements
pub trait Adapter: Send + Sync {
    /// Adapter name, reported on every response
    fn name(&self) -> &str;

    /// What this vendor can do
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Whether this vendor has `capability`
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().supports(capability)
    }

    /// Base URL every path is resolved against
    fn base_url(&self) -> &str;

    /// Authentication and default headers
    fn headers(&self) -> HashMap<String, String>;

    /// Translate a unified request into the vendor request
    fn build_request(&self, request: &CompletionRequest) -> ProviderResult<HttpRequest>;

    /// Translate a complete vendor response body
    fn parse_response(&self, body: Value) -> ProviderResult<Response>;

    /// Decode one stream frame into normalized events
    fn parse_stream_frame(
        &self,
        frame: &SseFrame,
        state: &mut DecoderState,
    ) -> ProviderResult<Vec<StreamEvent>>;

    /// Recognize a vendor error payload in a non-2xx body
    fn parse_error(&self, status: u16, body: &str) -> Option<ProviderError> {
        let json: Value = serde_json::from_str(body).ok()?;
        extract_error_details(&json)
            .map(|details| ProviderError::vendor(Some(status), details.code, details.message))
    }

    /// Absolute URL for a vendor path
    fn request_url(&self, path: &str) -> String {
        join_url(self.base_url(), path)
    }
}

/// Join a base URL and a path with exactly one slash between them
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Optional vendor features a request may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Streaming,
    ToolCalls,
    StructuredOutput,
    StatelessContinuation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Streaming => "streaming",
            Capability::ToolCalls => "tool calls",
            Capability::StructuredOutput => "structured output",
            Capability::StatelessContinuation => "stateless continuation",
        })
    }
}

/// Vendor capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Does the provider support streaming?
    pub streaming: bool,

    /// Does the provider support tool calling?
    pub tool_calls: bool,

    /// Does the provider honor a response JSON schema?
    pub structured_output: bool,

    /// Can a request continue from a server-side response id?
    pub stateless_continuation: bool,

    /// Provider-specific capability flags
    #[serde(default)]
    pub custom: HashMap<String, Value>,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            streaming: true,
            tool_calls: true,
            structured_output: false,
            stateless_continuation: false,
            custom: HashMap::new(),
        }
    }
}

impl ProviderCapabilities {
    /// Check a single capability
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Streaming => self.streaming,
            Capability::ToolCalls => self.tool_calls,
            Capability::StructuredOutput => self.structured_output,
            Capability::StatelessContinuation => self.stateless_continuation,
        }
    }
}

/// The supported vendor families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "openai_responses")]
    OpenAIResponses,
}

impl ProviderKind {
    /// Name used in configuration and on responses
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Claude => "claude",
            ProviderKind::Google => "google",
            ProviderKind::OpenAIResponses => "openai_responses",
        }
    }

    /// Default API base URL
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI | ProviderKind::OpenAIResponses => "https://api.openai.com/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::Claude => "https://api.anthropic.com/v1",
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta/models/",
        }
    }

    /// Create the adapter for this kind from provider settings
    pub fn create_adapter(&self, config: &ProviderConfig) -> ProviderResult<Arc<dyn Adapter>> {
        use crate::providers::{
            ClaudeAdapter, GoogleAdapter, OpenAIAdapter, OpenRouterAdapter, ResponsesAdapter,
        };

        Ok(match self {
            ProviderKind::OpenAI => Arc::new(OpenAIAdapter::from_config(config)?),
            ProviderKind::OpenRouter => Arc::new(OpenRouterAdapter::from_config(config)?),
            ProviderKind::Claude => Arc::new(ClaudeAdapter::from_config(config)?),
            ProviderKind::Google => Arc::new(GoogleAdapter::from_config(config)?),
            ProviderKind::OpenAIResponses => Arc::new(ResponsesAdapter::from_config(config)?),
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderKind::OpenAI),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "google" | "gemini" => Ok(ProviderKind::Google),
            "openai_responses" | "responses" => Ok(ProviderKind::OpenAIResponses),
            other => Err(ProviderError::Configuration(format!(
                "unknown provider kind '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://api.openai.com/v1", "/models", "https://api.openai.com/v1/models" ; "leading slash")]
    #[test_case("https://api.openai.com/v1/", "/models", "https://api.openai.com/v1/models" ; "double slash")]
    #[test_case("https://api.openai.com/v1", "models", "https://api.openai.com/v1/models" ; "no slash")]
    #[test_case("https://x.test/models/", "gemini:generateContent", "https://x.test/models/gemini:generateContent" ; "base slash")]
    #[test_case("https://x.test", "https://y.test/abs", "https://y.test/abs" ; "absolute path")]
    fn test_join_url(base: &str, path: &str, expected: &str) {
        assert_eq!(join_url(base, path), expected);
    }

    #[test]
    fn test_capabilities_supports() {
        let caps = ProviderCapabilities::default();
        assert!(caps.supports(Capability::Streaming));
        assert!(caps.supports(Capability::ToolCalls));
        assert!(!caps.supports(Capability::StructuredOutput));
        assert!(!caps.supports(Capability::StatelessContinuation));
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [
            ProviderKind::OpenAI,
            ProviderKind::OpenRouter,
            ProviderKind::Claude,
            ProviderKind::Google,
            ProviderKind::OpenAIResponses,
        ] {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
        assert!("bedrock".parse::<ProviderKind>().is_err());
    }
}
