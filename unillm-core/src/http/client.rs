//! HTTP client implementation using reqwest

use crate::config::ConnectionConfig;
use crate::http::error::{parse_retry_after, TransportError};
use crate::http::retry::RetryPolicy;
use crate::http::{FrameStream, HttpRequest, HttpResponse, SseFrame, Transport, REQUEST_ID_HEADER};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder, Response};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Maximum response size for non-streamed bodies
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("unillm/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: Arc<Client>,

    /// Whole-request timeout for non-streamed calls
    request_timeout: Duration,

    /// Retry policy for the initial request
    retry_policy: RetryPolicy,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(&ConnectionConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: &ConnectionConfig) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.keepalive_secs))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            retry_policy: RetryPolicy::no_retry(),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// Retry the initial request according to `policy`
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Send once, mapping non-2xx responses to `TransportError::Status`
    async fn execute(
        &self,
        request: &HttpRequest,
        request_id: Uuid,
        timeout: Option<Duration>,
    ) -> Result<Response, TransportError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        if header_value(request, REQUEST_ID_HEADER).is_none() {
            builder = builder.header(REQUEST_ID_HEADER, request_id.to_string());
        }

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let err = TransportError::from(e);
            match &err {
                TransportError::Timeout => {
                    warn!(url = %request.url, %request_id, "Request timeout")
                }
                _ => error!(url = %request.url, %request_id, error = %err, "Request error"),
            }
            err
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), %request_id, "Response status");

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();

            warn!(
                status = status.as_u16(),
                url = %request.url,
                %request_id,
                "Request failed"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        Ok(response)
    }

    /// Check response size to prevent OOM
    fn check_content_length(&self, response: &Response) -> Result<(), TransportError> {
        match response.content_length() {
            Some(length) if length as usize > self.max_response_size => Err(TransportError::Body(
                format!(
                    "Response size {} exceeds maximum {}",
                    length, self.max_response_size
                ),
            )),
            _ => Ok(()),
        }
    }
}

fn header_value<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Reuse the caller's request id so log lines on both sides correlate
fn request_id_of(request: &HttpRequest) -> Uuid {
    header_value(request, REQUEST_ID_HEADER)
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::new_v4)
}

fn collect_headers(response: &Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let request_id = request_id_of(&request);
        info!(method = %request.method, url = %request.url, %request_id, "Sending request");

        let response = self
            .retry_policy
            .execute(|| self.execute(&request, request_id, Some(self.request_timeout)))
            .await?;

        self.check_content_length(&response)?;

        let status = response.status().as_u16();
        let headers = collect_headers(&response);
        let text = response.text().await.map_err(|e| {
            TransportError::Body(format!("Failed to read response body: {} [request_id: {}]", e, request_id))
        })?;

        if text.len() > self.max_response_size {
            return Err(TransportError::Body(format!(
                "Response size {} exceeds maximum {} [request_id: {}]",
                text.len(),
                self.max_response_size,
                request_id
            )));
        }

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                error!(%request_id, error = %e, "Response is not JSON");
                TransportError::Body(format!("Invalid JSON: {} [request_id: {}]", e, request_id))
            })?
        };

        info!(status, %request_id, "Request completed");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<FrameStream, TransportError> {
        let request_id = request_id_of(&request);
        info!(method = %request.method, url = %request.url, %request_id, "Opening event stream");

        // No whole-request timeout: a stream may legitimately outlive it
        let response = self
            .retry_policy
            .execute(|| self.execute(&request, request_id, None))
            .await?;

        let frames = response
            .bytes_stream()
            .eventsource()
            .map(move |event| match event {
                Ok(event) => Ok(SseFrame {
                    event: match event.event.as_str() {
                        "" | "message" => None,
                        name => Some(name.to_string()),
                    },
                    data: event.data,
                }),
                Err(e) => {
                    warn!(%request_id, error = %e, "Event stream error");
                    Err(TransportError::Stream(e.to_string()))
                }
            });

        Ok(frames.boxed())
    }
}
