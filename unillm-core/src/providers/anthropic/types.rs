//! Anthropic Messages API wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages API request
#[derive(Debug, Serialize)]
pub struct ClaudeRequest {
    pub model: String,

    /// Required by the Messages API
    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub messages: Vec<ClaudeMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ClaudeTool>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ClaudeToolChoice>,
}

/// Conversation turn; only `user` and `assistant` are valid roles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeMessage {
    pub role: String,
    pub content: Vec<ClaudeContentBlock>,
}

/// Content block inside a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ClaudeImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Blocks this crate does not model (thinking, citations, ...)
    #[serde(other)]
    Unsupported,
}

/// Image payload, inline or by reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct ClaudeTool {
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub input_schema: Value,
}

/// Tool selection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeToolChoice {
    Auto,
    Any,
    None,
    Tool { name: String },
}

/// Messages API response
#[derive(Debug, Deserialize)]
pub struct ClaudeResponse {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub content: Vec<ClaudeContentBlock>,

    #[serde(default)]
    pub stop_reason: Option<String>,

    #[serde(default)]
    pub usage: Option<ClaudeUsage>,
}

/// Token usage; stream events report the two halves separately
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ClaudeUsage {
    #[serde(default)]
    pub input_tokens: Option<u32>,

    #[serde(default)]
    pub output_tokens: Option<u32>,
}

/// Server-sent event payloads, discriminated by `type`
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeStreamEvent {
    MessageStart {
        message: ClaudeStreamMessage,
    },
    ContentBlockStart {
        index: u64,
        content_block: ClaudeContentBlock,
    },
    ContentBlockDelta {
        index: u64,
        delta: ClaudeStreamDelta,
    },
    ContentBlockStop {
        index: u64,
    },
    MessageDelta {
        delta: ClaudeMessageDelta,
        #[serde(default)]
        usage: Option<ClaudeUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: ClaudeErrorDetail,
    },
}

/// Message header carried by `message_start`
#[derive(Debug, Deserialize)]
pub struct ClaudeStreamMessage {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub usage: Option<ClaudeUsage>,
}

/// Incremental block content
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeStreamDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Unsupported,
}

/// Stop information carried by `message_delta`
#[derive(Debug, Deserialize)]
pub struct ClaudeMessageDelta {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// In-stream error
#[derive(Debug, Deserialize)]
pub struct ClaudeErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: String,

    #[serde(default)]
    pub message: String,
}
