//! Core protocol types for unified chat completions
//!
//! This module contains the caller-facing request side of the data model:
//! messages, tool declarations, tool calls and per-request options. The design
//! prioritizes:
//! - Type safety through enums and strong typing
//! - Vendor neutrality (adapters own every wire-format detail)
//! - Immutability once a value has been handed across the API boundary

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions that guide the model's behavior
    System,
    /// User input message
    User,
    /// Assistant (model) response
    Assistant,
    /// Tool result answering an earlier assistant tool call
    Tool,
}

impl MessageRole {
    /// Lowercase wire name shared by most vendors
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// Content of a message - plain text or an ordered list of parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Structured content parts (for multimodal support)
    Parts(Vec<ContentPart>),
}

/// Individual content part for multimodal messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content part
    Text { text: String },
    /// Image content (base64 encoded or URL)
    Image {
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        base64: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentPart {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Create an image part referencing a URL
    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::Image {
            url: Some(url.into()),
            base64: None,
            mime_type: None,
        }
    }

    /// Create an inline base64 image part
    pub fn image_base64(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentPart::Image {
            url: None,
            base64: Some(data.into()),
            mime_type: Some(mime_type.into()),
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: MessageContent,

    /// Tool calls issued by the assistant on this turn
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_calls: Vec<ToolCall>,

    /// Identifier of the tool call a tool-result message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool name on tool-result messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A callable's declaration offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name, unique within one request
    pub name: String,

    /// Human-readable description shown to the model
    #[serde(default)]
    pub description: String,

    /// Parameters schema (JSON Schema)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parameters: Option<Value>,

    /// Same schema under the name some vendors use
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input_schema: Option<Value>,
}

impl Tool {
    /// Declare a tool with a JSON Schema for its parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Some(parameters),
            input_schema: None,
        }
    }

    /// Set the `input_schema` variant of the parameters schema
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// The parameters schema, whichever field carries it
    pub fn schema(&self) -> Value {
        self.parameters
            .as_ref()
            .or(self.input_schema.as_ref())
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "type": "object", "properties": {} }))
    }

    /// Declared parameter names in schema order
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters
            .as_ref()
            .or(self.input_schema.as_ref())
            .and_then(|schema| schema.get("properties"))
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Argument text of a tool call that did not parse as JSON
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("malformed arguments for tool call '{call_id}': {message}")]
pub struct MalformedToolArguments {
    /// Call the arguments belong to
    pub call_id: String,
    /// The raw argument text as received
    pub raw: String,
    /// Parser message
    pub message: String,
}

/// A model-issued request to invoke a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor-assigned correlation id, echoed back verbatim
    pub call_id: String,

    /// Name of the tool to invoke
    pub tool_name: String,

    /// Parsed arguments; `Null` when `malformed` is set
    pub arguments: Value,

    /// Parse failure of the argument text, if any
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub malformed: Option<MalformedToolArguments>,
}

impl ToolCall {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
            malformed: None,
        }
    }

    /// Build a call from argument text, recording a parse failure instead of failing
    pub(crate) fn from_raw_arguments(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        raw: &str,
    ) -> Self {
        let call_id = call_id.into();
        let tool_name = tool_name.into();
        match parse_arguments(raw) {
            Ok(arguments) => Self::new(call_id, tool_name, arguments),
            Err(e) => Self {
                malformed: Some(MalformedToolArguments {
                    call_id: call_id.clone(),
                    raw: raw.to_string(),
                    message: e.to_string(),
                }),
                call_id,
                tool_name,
                arguments: Value::Null,
            },
        }
    }

    /// Arguments, or the parse failure attached to this call
    pub fn arguments(&self) -> Result<&Value, &MalformedToolArguments> {
        match &self.malformed {
            Some(err) => Err(err),
            None => Ok(&self.arguments),
        }
    }

    /// Arguments serialized back to JSON text, as vendors expect on echo
    pub fn arguments_json(&self) -> String {
        match &self.malformed {
            Some(err) => err.raw.clone(),
            None => self.arguments.to_string(),
        }
    }

    /// Package a tool's output as the tool-result message answering this call
    pub fn to_result_message(&self, output: impl Into<String>) -> Message {
        MessageBuilder::new(MessageRole::Tool, output)
            .with_tool_call_id(self.call_id.clone())
            .with_name(self.tool_name.clone())
            .build()
    }
}

/// Parse tool-call argument text; empty text means no arguments
pub(crate) fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(raw)
}

/// Tool choice configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides
    Auto,
    /// Never call tools
    None,
    /// Must call at least one tool
    Required,
    /// Must call the named tool
    Function(String),
}

/// JSON Schema the model output must conform to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// The JSON Schema
    pub schema: Value,

    /// Schema name reported to the vendor
    #[serde(default = "default_schema_name")]
    pub name: String,

    /// Ask the vendor for strict adherence
    #[serde(default = "default_true")]
    pub strict: bool,

    /// Output MIME type (Gemini)
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_schema_name() -> String {
    "response".to_string()
}

fn default_true() -> bool {
    true
}

fn default_mime_type() -> String {
    "application/json".to_string()
}

impl ResponseSchema {
    /// Wrap a JSON Schema with default name, strictness and MIME type
    pub fn new(schema: Value) -> Self {
        Self {
            schema,
            name: default_schema_name(),
            strict: true,
            mime_type: default_mime_type(),
        }
    }

    /// Set the schema name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set strict mode
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Chat-completions `response_format` block
    pub fn for_openai(&self) -> Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.name,
                "schema": self.schema,
                "strict": self.strict,
            }
        })
    }

    /// Responses API `text.format` block
    pub fn for_openai_responses(&self) -> Value {
        serde_json::json!({
            "type": "json_schema",
            "name": self.name,
            "schema": self.schema,
            "strict": self.strict,
        })
    }

    /// Gemini schema, which rejects `additionalProperties`
    pub fn for_google(&self) -> Value {
        remove_additional_properties(&self.schema)
    }
}

/// Recursively drop `additionalProperties` keys from a schema
pub fn remove_additional_properties(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| {
                    key.as_str() != "additionalProperties" && key.as_str() != "additional_properties"
                })
                .map(|(key, value)| (key.clone(), remove_additional_properties(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(remove_additional_properties).collect()),
        other => other.clone(),
    }
}

/// Optional per-request settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Tool choice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Structured output schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<ResponseSchema>,

    /// Opaque continuation token from an earlier response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,

    /// Ask chat-completions vendors to report usage on the stream
    #[serde(default)]
    pub include_usage: bool,

    /// Vendor-specific body fields, merged verbatim where not already set
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub extra: Map<String, Value>,
}

/// A unified chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,

    /// Conversation so far
    pub messages: Vec<Message>,

    /// Tools offered to the model
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools: Vec<Tool>,

    /// Stream the completion
    #[serde(default)]
    pub stream: bool,

    /// Optional settings
    #[serde(default)]
    pub options: CompletionOptions,
}

// ============================================================================
// Builder and convenience traits
// ============================================================================

/// Trait for converting types into messages
pub trait IntoMessage {
    /// Convert self into a Message
    fn into_message(self) -> Message;
}

impl IntoMessage for Message {
    fn into_message(self) -> Message {
        self
    }
}

impl IntoMessage for String {
    fn into_message(self) -> Message {
        Message::user(self)
    }
}

impl IntoMessage for &str {
    fn into_message(self) -> Message {
        Message::user(self)
    }
}

/// Builder for constructing messages
pub struct MessageBuilder {
    role: MessageRole,
    content: MessageContent,
    tool_calls: Vec<ToolCall>,
    tool_call_id: Option<String>,
    name: Option<String>,
}

impl MessageBuilder {
    /// Create a new message builder with role and text content
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a new message builder with role and multimodal parts
    pub fn with_parts(role: MessageRole, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Set the name field
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach tool calls (assistant turns)
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Set the answered tool call id (tool turns)
    pub fn with_tool_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = Some(id.into());
        self
    }

    /// Build the message
    pub fn build(self) -> Message {
        Message {
            role: self.role,
            content: self.content,
            tool_calls: self.tool_calls,
            tool_call_id: self.tool_call_id,
            name: self.name,
        }
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        MessageBuilder::new(MessageRole::System, content).build()
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        MessageBuilder::new(MessageRole::User, content).build()
    }

    /// Create a multimodal user message
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        MessageBuilder::with_parts(MessageRole::User, parts).build()
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        MessageBuilder::new(MessageRole::Assistant, content).build()
    }

    /// Create an assistant message that carries tool calls
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        MessageBuilder::new(MessageRole::Assistant, content)
            .with_tool_calls(tool_calls)
            .build()
    }

    /// Create a tool response message
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        MessageBuilder::new(MessageRole::Tool, content)
            .with_tool_call_id(tool_call_id)
            .build()
    }

    /// Concatenated text of the message content
    pub fn text(&self) -> String {
        self.content.text()
    }
}

impl CompletionRequest {
    /// Create a new request with model and messages
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            stream: false,
            options: CompletionOptions::default(),
        }
    }

    /// Offer tools to the model
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    /// Enable streaming
    pub fn with_streaming(mut self, include_usage: bool) -> Self {
        self.stream = true;
        self.options.include_usage = include_usage;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    /// Set top_p for nucleus sampling
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.options.top_p = Some(top_p);
        self
    }

    /// Add a single stop sequence
    pub fn with_stop_sequence(mut self, stop: impl Into<String>) -> Self {
        self.options.stop.get_or_insert_with(Vec::new).push(stop.into());
        self
    }

    /// Set tool choice
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.options.tool_choice = Some(choice);
        self
    }

    /// Request structured output
    pub fn with_response_schema(mut self, schema: ResponseSchema) -> Self {
        self.options.response_schema = Some(schema);
        self
    }

    /// Continue from an earlier vendor response
    pub fn with_previous_response_id(mut self, id: impl Into<String>) -> Self {
        self.options.previous_response_id = Some(id.into());
        self
    }

    /// Pass a vendor-specific body field through untouched
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.extra.insert(key.into(), value);
        self
    }

    /// Merge `extra` fields into a serialized vendor body without overriding it
    pub(crate) fn merge_extra(&self, body: &mut Value) {
        if let Value::Object(map) = body {
            for (key, value) in &self.options.extra {
                map.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }
}

impl MessageContent {
    /// Check if content is empty
    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(s) => s.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }

    /// Get text representation
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s.as_str()),
            MessageContent::Parts(_) => None,
        }
    }

    /// Text of all text parts, joined
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect(),
        }
    }
}
