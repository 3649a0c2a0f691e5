//! OpenAI chat-completions adapter
//!
//! This module provides an adapter for the OpenAI chat-completions API,
//! translating between the unified protocol and OpenAI's specific format.
//! OpenAI-compatible vendors reuse it with their own name and base URL.

pub mod converter;
pub mod streaming;
pub mod types;

pub use types::{OpenAIRequest, OpenAIResponse, OpenAIStreamChunk};

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

/// Chat-completions endpoint path
pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// OpenAI chat-completions adapter
#[derive(Debug, Clone)]
pub struct OpenAIAdapter {
    name: String,
    base_url: String,
    api_key: SecretString,
    default_headers: HashMap<String, String>,
    capabilities: ProviderCapabilities,
}

impl OpenAIAdapter {
    /// Adapter for api.openai.com
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            name: ProviderKind::OpenAI.as_str().to_string(),
            base_url: ProviderKind::OpenAI.default_base_url().to_string(),
            api_key: api_key.into(),
            default_headers: HashMap::new(),
            capabilities: ProviderCapabilities {
                streaming: true,
                tool_calls: true,
                structured_output: true,
                stateless_continuation: false,
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

    /// Point at an OpenAI-compatible server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Name reported on responses
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }
}

impl Adapter for OpenAIAdapter {
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

        let mut body = serde_json::to_value(converter::to_openai_request(request))?;
        request.merge_extra(&mut body);

        Ok(HttpRequest::post(self.request_url(CHAT_COMPLETIONS_PATH), body).with_headers(self.headers()))
    }

    fn parse_response(&self, body: Value) -> ProviderResult<Response> {
        if body.get("error").is_some() {
            if let Some(details) = extract_error_details(&body) {
                return Err(ProviderError::vendor(None, details.code, details.message));
            }
        }
        converter::from_openai_response(body, &self.name)
    }

    fn parse_stream_frame(
        &self,
        frame: &SseFrame,
        state: &mut DecoderState,
    ) -> ProviderResult<Vec<StreamEvent>> {
        streaming::decode_frame(frame, state)
    }
}
