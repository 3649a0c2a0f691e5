//! HTTP transport for reaching vendor APIs
//!
//! This module implements the transport layer, handling:
//! - The `Transport` seam the provider facade talks to
//! - Connection pooling and client management (`HttpClient`)
//! - Server-sent event framing for streamed responses
//! - Error mapping and initial-request retries

pub mod client;
pub mod error;
pub mod retry;

pub use client::HttpClient;
pub use error::TransportError;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use futures::stream::BoxStream;
pub use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;

/// Header correlating a request across caller and transport logs
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// A fully built vendor request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,

    /// Absolute URL
    pub url: String,

    /// Request headers
    pub headers: HashMap<String, String>,

    /// JSON body, if any
    pub body: Option<Value>,
}

impl HttpRequest {
    /// POST request with a JSON body
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: HashMap::new(),
            body: Some(body),
        }
    }

    /// Add or replace headers
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// A decoded 2xx response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Response headers (lowercase names)
    pub headers: HashMap<String, String>,

    /// Decoded JSON body; `Null` for an empty body
    pub body: Value,
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, when the server named the event
    pub event: Option<String>,

    /// `data:` payload
    pub data: String,
}

impl SseFrame {
    /// Frame with only a data payload
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    /// Frame with an event name and data payload
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }
}

/// Ordered frames of a streamed response
pub type FrameStream = BoxStream<'static, Result<SseFrame, TransportError>>;

/// Capability to perform HTTP calls
///
/// Implementations report non-2xx responses as [`TransportError::Status`]
/// carrying the raw body so the caller can recognize vendor error payloads.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and decode the JSON response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Send a request and return its server-sent events in order
    async fn send_stream(&self, request: HttpRequest) -> Result<FrameStream, TransportError>;
}
