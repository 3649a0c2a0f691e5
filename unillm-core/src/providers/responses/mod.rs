//! OpenAI Responses API adapter
//!
//! The Responses API keeps conversation state server-side: every response
//! carries an id that a later request may pass as `previous_response_id`
//! instead of resending the history.

pub mod converter;
pub mod streaming;
pub mod types;

pub use types::{ResponsesRequest, ResponsesResponse, ResponsesStreamEvent};

use std::collections::HashMap;

use serde_json::Value;

use crate::config::{ProviderConfig, SecretString};
use crate::http::error::extract_error_details;
use crate::http::{HttpRequest, SseFrame};
use crate::protocol::{CompletionRequest, Response};
use crate::providers::adapter::{Adapter, ProviderCapabilities, ProviderKind};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::preflight::check_capabilities;
use crate::stream::{DecoderState, StreamEvent};

/// Responses endpoint path
pub const RESPONSES_PATH: &str = "/responses";

/// OpenAI Responses API adapter
#[derive(Debug, Clone)]
pub struct ResponsesAdapter {
    name: String,
    base_url: String,
    api_key: SecretString,
    default_headers: HashMap<String, String>,
    capabilities: ProviderCapabilities,
}

impl ResponsesAdapter {
    /// Adapter for api.openai.com
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            name: ProviderKind::OpenAIResponses.as_str().to_string(),
            base_url: ProviderKind::OpenAIResponses.default_base_url().to_string(),
            api_key: api_key.into(),
            default_headers: HashMap::new(),
            capabilities: ProviderCapabilities {
                streaming: true,
                tool_calls: true,
                structured_output: true,
                stateless_continuation: true,
                custom: HashMap::new(),
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
        adapter.default_headers = config.default_headers.clone();
        Ok(adapter)
    }

    /// Point at a compatible server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Name reported on responses
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Adapter for ResponsesAdapter {
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
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key.expose_secret()),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers
    }

    fn build_request(&self, request: &CompletionRequest) -> ProviderResult<HttpRequest> {
        check_capabilities(self, request)?;

        let mut body = serde_json::to_value(converter::to_responses_request(request)?)?;
        request.merge_extra(&mut body);

        Ok(HttpRequest::post(self.request_url(RESPONSES_PATH), body).with_headers(self.headers()))
    }

    fn parse_response(&self, body: Value) -> ProviderResult<Response> {
        if body.get("status").and_then(Value::as_str) == Some("failed") {
            if let Some(details) = extract_error_details(&body) {
                return Err(ProviderError::vendor(None, details.code, details.message));
            }
        }
        converter::from_responses_response(body, &self.name)
    }

    fn parse_stream_frame(
        &self,
        frame: &SseFrame,
        state: &mut DecoderState,
    ) -> ProviderResult<Vec<StreamEvent>> {
        streaming::decode_frame(frame, state)
    }
}
