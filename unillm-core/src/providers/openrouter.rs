//! OpenRouter adapter
//!
//! OpenRouter speaks the OpenAI chat-completions format; it differs only in its
//! base URL and the optional attribution headers.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::{ProviderConfig, SecretString};
use crate::http::{HttpRequest, SseFrame};
use crate::protocol::{CompletionRequest, Response};
use crate::providers::adapter::{Adapter, ProviderCapabilities, ProviderKind};
use crate::providers::error::ProviderResult;
use crate::providers::openai::OpenAIAdapter;
use crate::stream::{DecoderState, StreamEvent};

/// OpenRouter adapter
#[derive(Debug, Clone)]
pub struct OpenRouterAdapter {
    inner: OpenAIAdapter,
}

impl OpenRouterAdapter {
    /// Adapter for openrouter.ai
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            inner: OpenAIAdapter::new(api_key)
                .with_name(ProviderKind::OpenRouter.as_str())
                .with_base_url(ProviderKind::OpenRouter.default_base_url()),
        }
    }

    /// Adapter built from provider settings
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        let mut inner = OpenAIAdapter::from_config(config)?;
        if let Some(referer) = &config.http_referer {
            inner = inner.with_header("HTTP-Referer", referer.clone());
        }
        if let Some(title) = &config.x_title {
            inner = inner.with_header("X-Title", title.clone());
        }
        Ok(Self { inner })
    }

    /// Identify the calling application to OpenRouter
    pub fn with_attribution(self, http_referer: impl Into<String>, x_title: impl Into<String>) -> Self {
        Self {
            inner: self
                .inner
                .with_header("HTTP-Referer", http_referer)
                .with_header("X-Title", x_title),
        }
    }
}

impl Adapter for OpenRouterAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        self.inner.capabilities()
    }

    fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    fn headers(&self) -> HashMap<String, String> {
        self.inner.headers()
    }

    fn build_request(&self, request: &CompletionRequest) -> ProviderResult<HttpRequest> {
        self.inner.build_request(request)
    }

    fn parse_response(&self, body: Value) -> ProviderResult<Response> {
        self.inner.parse_response(body)
    }

    fn parse_stream_frame(
        &self,
        frame: &SseFrame,
        state: &mut DecoderState,
    ) -> ProviderResult<Vec<StreamEvent>> {
        self.inner.parse_stream_frame(frame, state)
    }
}
