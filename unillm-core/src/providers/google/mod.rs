//! Google Gemini adapter
//!
//! Serves both the Gemini API (API-key header) and Vertex AI (bearer token).
//! The model name is part of the URL rather than the body.

pub mod converter;
pub mod streaming;
pub mod types;

pub use types::{GeminiRequest, GeminiResponse};

use std::collections::HashMap;
use std::fmt;

use serde_json::{json, Value};

use crate::config::{ProviderConfig, SecretString, VertexConfig};
use crate::http::error::extract_error_details;
use crate::http::{HttpRequest, SseFrame};
use crate::protocol::{CompletionRequest, Response};
use crate::providers::adapter::{Adapter, ProviderCapabilities, ProviderKind};
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::preflight::check_capabilities;
use crate::stream::{DecoderState, StreamEvent};

/// How requests authenticate
#[derive(Clone)]
enum GoogleAuth {
    /// Gemini API key, sent as `X-GOOG-API-KEY`
    ApiKey(SecretString),
    /// Vertex AI OAuth access token
    Bearer(SecretString),
}

impl fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoogleAuth::ApiKey(key) => write!(f, "ApiKey({})", key.partial_redact()),
            GoogleAuth::Bearer(token) => write!(f, "Bearer({})", token.partial_redact()),
        }
    }
}

/// Gemini / Vertex AI adapter
#[derive(Debug, Clone)]
pub struct GoogleAdapter {
    name: String,
    base_url: String,
    auth: GoogleAuth,
    default_headers: HashMap<String, String>,
    capabilities: ProviderCapabilities,
}

impl GoogleAdapter {
    /// Adapter for the Gemini API
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self::with_auth(
            GoogleAuth::ApiKey(api_key.into()),
            ProviderKind::Google.default_base_url().to_string(),
        )
    }

    /// Adapter for a Vertex AI project
    pub fn vertex(config: &VertexConfig) -> Self {
        Self::with_auth(GoogleAuth::Bearer(config.access_token.clone()), config.base_url())
    }

    fn with_auth(auth: GoogleAuth, base_url: String) -> Self {
        let mut custom = HashMap::new();
        custom.insert("model_in_url".to_string(), json!(true));

        Self {
            name: ProviderKind::Google.as_str().to_string(),
            base_url,
            auth,
            default_headers: HashMap::new(),
            capabilities: ProviderCapabilities {
                streaming: true,
                tool_calls: true,
                structured_output: true,
                stateless_continuation: false,
                custom,
            },
        }
    }

    /// Adapter built from provider settings; Vertex settings take precedence over the API key
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        let mut adapter = match &config.vertex {
            Some(vertex) => {
                if vertex.access_token.is_empty() {
                    return Err(ProviderError::Configuration(format!(
                        "{}: vertex.access_token is required",
                        config.name
                    )));
                }
                Self::vertex(vertex)
            }
            None if config.api_key.is_empty() => {
                return Err(ProviderError::Configuration(format!(
                    "{}: api_key is required",
                    config.name
                )));
            }
            None => Self::new(config.api_key.clone()),
        };
        if let Some(base_url) = &config.base_url {
            adapter = adapter.with_base_url(base_url.clone());
        }
        adapter.name = config.name.clone();
        adapter.default_headers = config.default_headers.clone();
        Ok(adapter)
    }

    /// Point at another models endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Name reported on responses
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether requests go to Vertex AI
    pub fn is_vertex(&self) -> bool {
        matches!(self.auth, GoogleAuth::Bearer(_))
    }

    fn method_path(model: &str, stream: bool) -> String {
        if stream {
            format!("{}:streamGenerateContent?alt=sse", model)
        } else {
            format!("{}:generateContent", model)
        }
    }
}

impl Adapter for GoogleAdapter {
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
        match &self.auth {
            GoogleAuth::ApiKey(key) => {
                headers.insert("X-GOOG-API-KEY".to_string(), key.expose_secret().to_string());
            }
            GoogleAuth::Bearer(token) => {
                headers.insert(
                    "Authorization".to_string(),
                    format!("Bearer {}", token.expose_secret()),
                );
            }
        }
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers
    }

    fn build_request(&self, request: &CompletionRequest) -> ProviderResult<HttpRequest> {
        check_capabilities(self, request)?;

        let mut body = serde_json::to_value(converter::to_gemini_request(request))?;
        request.merge_extra(&mut body);

        let url = self.request_url(&Self::method_path(&request.model, request.stream));
        Ok(HttpRequest::post(url, body).with_headers(self.headers()))
    }

    fn parse_response(&self, body: Value) -> ProviderResult<Response> {
        if body.get("error").is_some() || body.is_array() {
            if let Some(details) = extract_error_details(&body) {
                return Err(ProviderError::vendor(None, details.code, details.message));
            }
        }
        converter::from_gemini_response(body, &self.name)
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
    use crate::protocol::Message;

    #[test]
    fn test_gemini_api_urls_and_key() {
        let adapter = GoogleAdapter::new("AIza-test");
        let request = CompletionRequest::new("gemini-2.0-flash", vec![Message::user("hi")]);

        let http = adapter.build_request(&request).unwrap();
        assert_eq!(
            http.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(http.headers["X-GOOG-API-KEY"], "AIza-test");
        assert!(http.body.unwrap().get("model").is_none());

        let http = adapter.build_request(&request.with_streaming(false)).unwrap();
        assert_eq!(
            http.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_vertex_from_config() {
        let config = ProviderConfig::new(ProviderKind::Google, "")
            .with_vertex(VertexConfig::new("my-project", "us-central1", "ya29.token"));
        let adapter = GoogleAdapter::from_config(&config).unwrap();
        let request = CompletionRequest::new("gemini-2.0-flash", vec![Message::user("hi")]);
        let http = adapter.build_request(&request).unwrap();

        assert!(adapter.is_vertex());
        assert_eq!(
            http.url,
            "https://us-central1-aiplatform.googleapis.com/v1/projects/my-project/locations/us-central1/publishers/google/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(http.headers["Authorization"], "Bearer ya29.token");
        assert!(!http.headers.contains_key("X-GOOG-API-KEY"));
    }

    #[test]
    fn test_missing_credentials() {
        let config = ProviderConfig::new(ProviderKind::Google, "");
        assert!(matches!(
            GoogleAdapter::from_config(&config),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let adapter = GoogleAdapter::new("AIzaSyVerySecretKey1234");
        assert!(!format!("{:?}", adapter).contains("VerySecret"));
    }

    #[test]
    fn test_error_list_payload() {
        let adapter = GoogleAdapter::new("AIza-test");
        let err = adapter
            .parse_response(json!([{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}]))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Vendor { ref message, .. } if message == "API key not valid"));
    }
}
