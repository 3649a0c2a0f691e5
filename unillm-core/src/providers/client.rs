//! Provider facade
//!
//! [`Provider`] pairs an adapter with a transport. It validates requests
//! before anything is sent, routes complete bodies to the adapter and streams
//! through a [`CompletionStream`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{interpolate_provider_env_vars, ConfigValidator, ProviderConfig};
use crate::http::{HttpClient, HttpRequest, Method, Transport, TransportError, REQUEST_ID_HEADER};
use crate::protocol::{CompletionRequest, Response};
use crate::providers::adapter::Adapter;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::preflight::validate_request;
use crate::stream::CompletionStream;

/// Result of [`Provider::complete`]
pub enum Completion {
    /// Non-streaming request
    Response(Response),
    /// Streaming request
    Stream(CompletionStream),
}

impl Completion {
    /// The response, draining the stream if necessary
    pub async fn into_response(self) -> ProviderResult<Response> {
        match self {
            Completion::Response(response) => Ok(response),
            Completion::Stream(stream) => stream.collect_response().await,
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Chat-completion client for one vendor
#[derive(Clone)]
pub struct Provider {
    adapter: Arc<dyn Adapter>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.adapter.name())
            .field("base_url", &self.adapter.base_url())
            .finish()
    }
}

impl Provider {
    /// Combine an adapter with a transport
    pub fn new(adapter: Arc<dyn Adapter>, transport: Arc<dyn Transport>) -> Self {
        Self { adapter, transport }
    }

    /// Build the adapter and a pooled HTTP client from provider settings
    pub fn from_config(config: &ProviderConfig) -> ProviderResult<Self> {
        let mut config = config.clone();
        interpolate_provider_env_vars(&mut config)?;
        ConfigValidator::new()
            .validate_provider(&config, &config.name)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        let adapter = config.kind.create_adapter(&config)?;
        let connection = config.connection.clone().unwrap_or_default();
        let mut client = HttpClient::with_config(&connection)?;
        if let Some(policy) = &config.retry_policy {
            client = client.with_retry_policy(policy.clone());
        }

        debug!(provider = %config.name, kind = %config.kind, "Provider configured");
        Ok(Self::new(adapter, Arc::new(client)))
    }

    /// Adapter name
    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    /// The adapter in use
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Run a completion, streaming when `request.stream` is set
    ///
    /// Invalid requests and requests needing a capability the vendor lacks
    /// fail here without touching the transport.
    pub async fn complete(&self, request: CompletionRequest) -> ProviderResult<Completion> {
        validate_request(self.adapter.as_ref(), &request)?;

        let request_id = Uuid::new_v4();
        let http = self
            .adapter
            .build_request(&request)?
            .with_headers(HashMap::from([(
                REQUEST_ID_HEADER.to_string(),
                request_id.to_string(),
            )]));

        let span = info_span!(
            "completion",
            provider = %self.adapter.name(),
            model = %request.model,
            stream = request.stream,
            %request_id,
        );

        if request.stream {
            self.open_stream(http)
                .instrument(span)
                .await
                .map(Completion::Stream)
        } else {
            self.send_once(http)
                .instrument(span)
                .await
                .map(Completion::Response)
        }
    }

    /// Non-streaming completion
    pub async fn chat(&self, mut request: CompletionRequest) -> ProviderResult<Response> {
        request.stream = false;
        self.complete(request).await?.into_response().await
    }

    /// Streaming completion
    pub async fn stream(&self, mut request: CompletionRequest) -> ProviderResult<CompletionStream> {
        request.stream = true;
        match self.complete(request).await? {
            Completion::Stream(stream) => Ok(stream),
            Completion::Response(_) => Err(ProviderError::InvalidRequest(
                "vendor answered a streaming request without a stream".to_string(),
            )),
        }
    }

    /// Raw call against the vendor API with the adapter's authentication
    ///
    /// Nothing is translated and transport failures are returned unchanged.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        json_data: Option<Value>,
        headers: Option<HashMap<String, String>>,
    ) -> ProviderResult<Value> {
        let mut all_headers = self.adapter.headers();
        all_headers.extend(headers.unwrap_or_default());

        let request = HttpRequest {
            method,
            url: self.adapter.request_url(path),
            headers: all_headers,
            body: json_data,
        };

        info!(provider = %self.adapter.name(), method = %request.method, url = %request.url, "Passthrough request");
        let response = self.transport.send(request).await?;
        Ok(response.body)
    }

    async fn send_once(&self, request: HttpRequest) -> ProviderResult<Response> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let parsed = self.adapter.parse_response(response.body)?;
        info!(
            finish_reason = %parsed.finish_reason,
            tool_calls = parsed.tool_calls.len(),
            "Completion received"
        );
        Ok(parsed)
    }

    async fn open_stream(&self, request: HttpRequest) -> ProviderResult<CompletionStream> {
        let frames = self
            .transport
            .send_stream(request)
            .await
            .map_err(|e| self.map_transport_error(e))?;

        debug!("Stream opened");
        Ok(CompletionStream::new(self.adapter.clone(), frames))
    }

    /// Prefer the vendor's own error payload over the bare status
    fn map_transport_error(&self, err: TransportError) -> ProviderError {
        if let TransportError::Status { status, body, .. } = &err {
            if let Some(vendor) = self.adapter.parse_error(*status, body) {
                warn!(provider = %self.adapter.name(), status, error = %vendor, "Vendor rejected request");
                return vendor;
            }
        }
        warn!(provider = %self.adapter.name(), error = %err, "Transport failure");
        ProviderError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{FrameStream, HttpResponse, SseFrame};
    use crate::protocol::{FinishReason, Message, ResponseSchema, Tool};
    use crate::providers::{ClaudeAdapter, OpenAIAdapter};
    use async_trait::async_trait;
    use futures::{stream, StreamExt};
    use serde_json::json;
    use std::sync::Mutex;

    /// Transport that replays canned results and records requests
    #[derive(Default)]
    struct ScriptedTransport {
        body: Option<Value>,
        frames: Vec<String>,
        failure: Option<TransportError>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.sent.lock().unwrap().push(request);
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: self.body.clone().unwrap_or(Value::Null),
            })
        }

        async fn send_stream(&self, request: HttpRequest) -> Result<FrameStream, TransportError> {
            self.sent.lock().unwrap().push(request);
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            let frames: Vec<Result<SseFrame, TransportError>> =
                self.frames.iter().map(|f| Ok(SseFrame::data(f.clone()))).collect();
            Ok(stream::iter(frames).boxed())
        }
    }

    fn provider(transport: Arc<ScriptedTransport>) -> Provider {
        Provider::new(Arc::new(OpenAIAdapter::new("sk-test")), transport)
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let transport = Arc::new(ScriptedTransport {
            body: Some(json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi!"}, "finish_reason": "stop"}]
            })),
            ..Default::default()
        });
        let response = provider(transport.clone())
            .chat(CompletionRequest::new("gpt-4o-mini", vec![Message::user("Hello")]))
            .await
            .unwrap();

        assert_eq!(response.content, "Hi!");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        let sent = transport.sent.lock().unwrap();
        assert!(sent[0].headers.contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_duplicate_tool_names_never_reach_transport() {
        let transport = Arc::new(ScriptedTransport::default());
        let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("hi")]).with_tools(vec![
            Tool::new("lookup", "", json!({})),
            Tool::new("lookup", "", json!({})),
        ]);
        let err = provider(transport.clone()).complete(request).await.unwrap_err();

        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert_eq!(transport.sent(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_schema_never_reaches_transport() {
        let transport = Arc::new(ScriptedTransport::default());
        let provider = Provider::new(Arc::new(ClaudeAdapter::new("sk-ant")), transport.clone());
        let request = CompletionRequest::new("claude-3-5-haiku-latest", vec![Message::user("hi")])
            .with_response_schema(ResponseSchema::new(json!({"type": "object"})));

        let err = provider.complete(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedFeature { .. }));
        assert_eq!(transport.sent(), 0);
    }

    #[tokio::test]
    async fn test_vendor_error_payload_is_recognized() {
        let transport = Arc::new(ScriptedTransport {
            failure: Some(TransportError::status(
                401,
                r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#,
            )),
            ..Default::default()
        });
        let err = provider(transport)
            .chat(CompletionRequest::new("gpt-4o-mini", vec![Message::user("hi")]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Vendor { status: Some(401), ref code, .. } if code == "invalid_api_key"
        ));
    }

    #[tokio::test]
    async fn test_unrecognized_error_body_stays_transport() {
        let transport = Arc::new(ScriptedTransport {
            failure: Some(TransportError::status(503, "upstream connect error")),
            ..Default::default()
        });
        let err = provider(transport)
            .chat(CompletionRequest::new("gpt-4o-mini", vec![Message::user("hi")]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Transport(TransportError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_forces_streaming_flag() {
        let transport = Arc::new(ScriptedTransport {
            frames: vec![
                r#"{"choices":[{"index":0,"delta":{"content":"He"}}]}"#.to_string(),
                r#"{"choices":[{"index":0,"delta":{"content":"y"},"finish_reason":"stop"}]}"#.to_string(),
                "[DONE]".to_string(),
            ],
            ..Default::default()
        });
        let stream = provider(transport.clone())
            .stream(CompletionRequest::new("gpt-4o-mini", vec![Message::user("hi")]))
            .await
            .unwrap();
        let response = stream.collect_response().await.unwrap();

        assert_eq!(response.content, "Hey");
        assert!(response.complete);
        assert_eq!(transport.sent.lock().unwrap()[0].body.as_ref().unwrap()["stream"], true);
    }

    #[tokio::test]
    async fn test_passthrough_uses_adapter_auth() {
        let transport = Arc::new(ScriptedTransport {
            body: Some(json!({"data": [{"id": "gpt-4o"}]})),
            ..Default::default()
        });
        let body = provider(transport.clone())
            .request(Method::GET, "/models", None, None)
            .await
            .unwrap();

        assert_eq!(body["data"][0]["id"], "gpt-4o");
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].url, "https://api.openai.com/v1/models");
        assert_eq!(sent[0].headers["Authorization"], "Bearer sk-test");
    }

    #[tokio::test]
    async fn test_passthrough_returns_transport_errors_unchanged() {
        let transport = Arc::new(ScriptedTransport {
            failure: Some(TransportError::status(404, r#"{"error":{"message":"nope","code":"not_found"}}"#)),
            ..Default::default()
        });
        let err = provider(transport)
            .request(Method::GET, "/models/unknown", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(TransportError::Status { status: 404, .. })));
    }
}
