//! Normalized responses and stream chunks

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Message, ResponseSchema, ToolCall};
use crate::providers::error::{ProviderError, ProviderResult};

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop point or stop sequence
    Stop,
    /// The turn ends with tool calls to execute
    ToolCalls,
    /// Token limit reached
    Length,
    /// Output withheld by the vendor's safety filter
    ContentFilter,
    /// Vendor reported an error finish
    Error,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Error => "error",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,

    /// Number of tokens in the completion
    pub completion_tokens: u32,

    /// Total number of tokens used
    pub total_tokens: u32,
}

impl Usage {
    /// Usage with total derived from the two counts
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Normalized result of a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Assistant text, possibly empty
    pub content: String,

    /// Tool calls in vendor order
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Reason the model stopped
    pub finish_reason: FinishReason,

    /// Token usage, when the vendor reported it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Raw vendor payload
    #[serde(default)]
    pub original: Value,

    /// Continuation token for vendors with server-side conversation state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_response_id: Option<String>,

    /// Name of the adapter that produced this response
    pub provider: String,

    /// False for partial aggregates of an interrupted stream
    #[serde(default = "complete_default")]
    pub complete: bool,
}

fn complete_default() -> bool {
    true
}

impl Response {
    /// Whether the model asked for tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// This turn as an assistant message, ready to append to the conversation
    pub fn to_assistant_message(&self) -> Message {
        Message::assistant_with_tool_calls(self.content.clone(), self.tool_calls.clone())
    }

    /// Deserialize structured output from the content
    pub fn parse_json<T: DeserializeOwned>(&self) -> ProviderResult<T> {
        serde_json::from_str(&self.content).map_err(|e| {
            ProviderError::ParseError(format!("structured output is not valid JSON: {}", e))
        })
    }

    /// Parse the content as JSON and check it against the schema with a caller-supplied validator
    pub fn validate_structured(
        &self,
        schema: &ResponseSchema,
        validator: &dyn SchemaValidator,
    ) -> ProviderResult<Value> {
        let value: Value = self.parse_json()?;
        validator
            .validate(&schema.schema, &value)
            .map_err(ProviderError::StructuredOutput)?;
        Ok(value)
    }
}

/// Pluggable JSON Schema validation
pub trait SchemaValidator: Send + Sync {
    /// Check `value` against `schema`, describing the first violation on failure
    fn validate(&self, schema: &Value, value: &Value) -> Result<(), String>;
}

/// Incremental tool-call data carried by a stream chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the tool call within the turn
    pub index: usize,

    /// Correlation id, on the chunk that first reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    /// Tool name, on the chunk that first reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Raw argument text fragment
    #[serde(default)]
    pub arguments_fragment: String,
}

/// One increment of a streamed completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text delta, possibly empty
    #[serde(default)]
    pub delta: String,

    /// Tool-call delta
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_delta: Option<ToolCallDelta>,

    /// Set on the terminal chunk only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Set on the terminal chunk only, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub(crate) fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            ..Default::default()
        }
    }

    pub(crate) fn tool(delta: ToolCallDelta) -> Self {
        Self {
            tool_call_delta: Some(delta),
            ..Default::default()
        }
    }

    pub(crate) fn terminal(finish_reason: FinishReason, usage: Option<Usage>) -> Self {
        Self {
            finish_reason: Some(finish_reason),
            usage,
            ..Default::default()
        }
    }

    /// Whether this is the last chunk of the stream
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn response(content: &str) -> Response {
        Response {
            content: content.to_string(),
            tool_calls: vec![],
            finish_reason: FinishReason::Stop,
            usage: Some(Usage::new(3, 4)),
            original: Value::Null,
            vendor_response_id: None,
            provider: "openai".to_string(),
            complete: true,
        }
    }

    struct RequireName;

    impl SchemaValidator for RequireName {
        fn validate(&self, _schema: &Value, value: &Value) -> Result<(), String> {
            if value.get("name").is_some() {
                Ok(())
            } else {
                Err("missing property 'name'".to_string())
            }
        }
    }

    #[test]
    fn test_usage_total() {
        assert_eq!(Usage::new(3, 4).total_tokens, 7);
    }

    #[test]
    fn test_parse_json() {
        #[derive(Deserialize)]
        struct Person {
            name: String,
        }

        let person: Person = response(r#"{"name":"Ada"}"#).parse_json().unwrap();
        assert_eq!(person.name, "Ada");
        assert!(matches!(
            response("not json").parse_json::<Person>(),
            Err(ProviderError::ParseError(_))
        ));
    }

    #[test]
    fn test_validate_structured_delegates() {
        let schema = ResponseSchema::new(json!({"type": "object"}));
        assert!(response(r#"{"name":"Ada"}"#)
            .validate_structured(&schema, &RequireName)
            .is_ok());
        let err = response(r#"{"age":3}"#)
            .validate_structured(&schema, &RequireName)
            .unwrap_err();
        assert!(err.to_string().contains("missing property"));
    }

    #[test]
    fn test_to_assistant_message_keeps_tool_calls() {
        let mut resp = response("");
        resp.tool_calls = vec![ToolCall::new("call_1", "f", json!({}))];
        let message = resp.to_assistant_message();
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].call_id, "call_1");
    }

    #[test]
    fn test_finish_reason_serialization() {
        assert_eq!(serde_json::to_value(FinishReason::ToolCalls).unwrap(), json!("tool_calls"));
        assert_eq!(FinishReason::ContentFilter.to_string(), "content_filter");
    }
}
