//! Anthropic Claude adapter
//!
//! Translates the unified protocol to the Messages API. Claude has no native
//! response-schema mode, so structured-output requests are refused up front.

pub mod converter;
pub mod streaming;
pub mod types;

pub use types::{ClaudeRequest, ClaudeResponse, ClaudeStreamEvent};

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::config::{ProviderConfig, SecretString};
use crate::http::error::extract_error_details;
use crate::http::{HttpRequest, SseFrame};
use crate::protocol::{CompletionRequest, Response};
use crate::providers::adapter::{Adapter, ProviderCapabilities, ProviderKind};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::preflight::check_capabilities;
use crate::stream::{DecoderState, StreamEvent};

/// Messages endpoint path
pub const MESSAGES_PATH: &str = "/messages";

/// API version sent on every request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API adapter
#[derive(Debug, Clone)]
pub struct ClaudeAdapter {
    name: String,
    base_url: String,
    api_key: SecretString,
    default_headers: HashMap<String, String>,
    default_max_tokens: u32,
    capabilities: ProviderCapabilities,
}

impl ClaudeAdapter {
    /// Adapter for api.anthropic.com
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        let mut custom = HashMap::new();
        custom.insert("system_prompt_location".to_string(), json!("top_level"));

        Self {
            name: ProviderKind::Claude.as_str().to_string(),
            base_url: ProviderKind::Claude.default_base_url().to_string(),
            api_key: api_key.into(),
            default_headers: HashMap::new(),
            default_max_tokens: converter::DEFAULT_MAX_TOKENS,
            capabilities: ProviderCapabilities {
                streaming: true,
                tool_calls: true,
                structured_output: false,
                stateless_continuation: false,
                custom,
            },
        }
    }

    /// Adapter built from provider settings
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        if config.api_key.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "{}: api_key is required",
                config.name
            )));
        }
        let mut adapter = Self::new(config.api_key.clone())
            .with_name(config.name.clone())
            .with_base_url(config.resolved_base_url());
        if let Some(max_tokens) = config.default_max_tokens {
            adapter = adapter.with_default_max_tokens(max_tokens);
        }
        adapter.default_headers = config.default_headers.clone();
        Ok(adapter)
    }

    /// Point at a proxy or gateway
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Name reported on responses
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Output budget for requests that do not set `max_tokens`
    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }
}

impl Adapter for ClaudeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> HashMap<String, String> {
        let mut headers = self.default_headers.clone();
        headers.insert("x-api-key".to_string(), self.api_key.expose_secret().to_string());
        headers.insert("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string());
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers
    }

    fn build_request(&self, request: &CompletionRequest) -> ProviderResult<HttpRequest> {
        check_capabilities(self, request)?;

        let mut body = serde_json::to_value(converter::to_claude_request(
            request,
            self.default_max_tokens,
        ))?;
        request.merge_extra(&mut body);

        Ok(HttpRequest::post(self.request_url(MESSAGES_PATH), body).with_headers(self.headers()))
    }

    fn parse_response(&self, body: Value) -> ProviderResult<Response> {
        if body.get("type").and_then(Value::as_str) == Some("error") {
            if let Some(details) = extract_error_details(&body) {
                return Err(ProviderError::vendor(None, details.code, details.message));
            }
        }
        converter::from_claude_response(body, &self.name)
    }

    fn parse_stream_frame(
        &self,
        frame: &SseFrame,
        state: &mut DecoderState,
    ) -> ProviderResult<Vec<StreamEvent>> {
        streaming::decode_frame(frame, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Message, ResponseSchema};
    use crate::providers::adapter::Capability;

    #[test]
    fn test_headers_and_url() {
        let adapter = ClaudeAdapter::new("sk-ant-test");
        let request = CompletionRequest::new("claude-3-5-haiku-latest", vec![Message::user("hi")])
            .with_max_tokens(256);
        let http = adapter.build_request(&request).unwrap();

        assert_eq!(http.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(http.headers["x-api-key"], "sk-ant-test");
        assert_eq!(http.headers["anthropic-version"], "2023-06-01");
        assert!(!http.headers.contains_key("Authorization"));
        assert_eq!(http.body.unwrap()["max_tokens"], 256);
    }

    #[test]
    fn test_config_default_max_tokens() {
        let mut config = ProviderConfig::new(ProviderKind::Claude, "sk-ant-test");
        config.default_max_tokens = Some(1024);
        let adapter = ClaudeAdapter::from_config(&config).unwrap();
        let request = CompletionRequest::new("claude-3-5-haiku-latest", vec![Message::user("hi")]);

        assert_eq!(adapter.build_request(&request).unwrap().body.unwrap()["max_tokens"], 1024);
    }

    #[test]
    fn test_response_schema_is_unsupported() {
        let adapter = ClaudeAdapter::new("sk-ant-test");
        let request = CompletionRequest::new("claude-3-5-haiku-latest", vec![Message::user("json")])
            .with_response_schema(ResponseSchema::new(json!({"type": "object"})));

        match adapter.build_request(&request) {
            Err(ProviderError::UnsupportedFeature { capability, .. }) => {
                assert_eq!(capability, Capability::StructuredOutput)
            }
            other => panic!("expected UnsupportedFeature, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_payload() {
        let adapter = ClaudeAdapter::new("sk-ant-test");
        let err = adapter
            .parse_error(
                400,
                r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens: Field required"}}"#,
            )
            .unwrap();
        assert!(matches!(
            err,
            ProviderError::Vendor { status: Some(400), ref code, .. } if code == "invalid_request_error"
        ));
    }
}
