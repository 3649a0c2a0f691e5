//! Transport errors and vendor error payload extraction

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Failures of the transport layer
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Could not establish a connection
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Non-2xx response
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    /// Response body could not be read or decoded
    #[error("Invalid response body: {0}")]
    Body(String),

    /// The event stream broke after it started
    #[error("Stream interrupted: {0}")]
    Stream(String),

    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Non-2xx response without retry hint
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        TransportError::Status {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    /// Whether the request may succeed when sent again
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connect(_) | TransportError::Timeout => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Server-provided delay before retrying
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Error details extracted from a vendor error body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Extract error details from a JSON error payload
pub fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // Gemini wraps a list: [{ "error": { ... } }]
    if let Some(first) = json.as_array().and_then(|items| items.first()) {
        return extract_error_details(first);
    }

    // { "error": { "message": "...", "type" | "code" | "status": "..." } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            let code = ["code", "type", "status"]
                .iter()
                .filter_map(|key| error.get(*key))
                .find_map(|value| match value {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .unwrap_or_else(|| "error".to_string());
            return Some(ErrorDetails {
                code,
                message: message.to_string(),
            });
        }
        if let Some(message) = error.as_str() {
            return Some(ErrorDetails {
                code: "error".to_string(),
                message: message.to_string(),
            });
        }
    }

    None
}

/// Parse Retry-After header value
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    // Seconds only; HTTP dates are ignored
    header_value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_openai_error() {
        let body = json!({"error": {"message": "Invalid model", "type": "invalid_request_error", "code": "model_not_found"}});
        let details = extract_error_details(&body).unwrap();
        assert_eq!(details.code, "model_not_found");
        assert_eq!(details.message, "Invalid model");
    }

    #[test]
    fn test_extract_anthropic_error() {
        let body = json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}});
        let details = extract_error_details(&body).unwrap();
        assert_eq!(details.code, "overloaded_error");
    }

    #[test]
    fn test_extract_google_error_list() {
        let body = json!([{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}]);
        let details = extract_error_details(&body).unwrap();
        assert_eq!(details.code, "400");
        assert_eq!(details.message, "API key not valid");
    }

    #[test]
    fn test_unrecognized_payload() {
        assert!(extract_error_details(&json!({"detail": "nope"})).is_none());
        assert!(extract_error_details(&json!("gateway down")).is_none());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(TransportError::status(429, "").is_retryable());
        assert!(TransportError::status(502, "").is_retryable());
        assert!(!TransportError::status(401, "").is_retryable());
        assert!(!TransportError::Stream("reset".into()).is_retryable());
    }
}
