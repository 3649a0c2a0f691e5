//! OpenAI Responses API wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Responses API request
#[derive(Debug, Serialize)]
pub struct ResponsesRequest {
    pub model: String,

    pub input: ResponsesInput,

    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<ResponsesTextConfig>,
}

/// `input` is a bare string for a single user prompt, typed items otherwise
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponsesInput {
    Text(String),
    Items(Vec<InputItem>),
}

/// Typed input item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: String,
        content: InputContent,
    },
    FunctionCall {
        call_id: String,
        name: String,
        /// JSON text, echoed as the model produced it
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

/// Message content, plain or multimodal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputContent {
    Text(String),
    Parts(Vec<InputContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContentPart {
    InputText { text: String },
    /// URL or `data:` URL
    InputImage { image_url: String },
}

/// Function tool; the Responses API flattens the function definition
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub strict: bool,
}

/// `text` block carrying the output format
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesTextConfig {
    pub format: Value,
}

/// Responses API response object; also embedded in lifecycle stream events
#[derive(Debug, Default, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub output: Vec<OutputItem>,

    #[serde(default)]
    pub usage: Option<ResponsesUsage>,

    #[serde(default)]
    pub incomplete_details: Option<IncompleteDetails>,

    #[serde(default)]
    pub error: Option<ResponsesError>,
}

/// Output item
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    FunctionCall {
        #[serde(default)]
        call_id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        arguments: String,
    },
    /// Reasoning, web search and other item kinds
    #[serde(other)]
    Other,
}

/// Content block of an output message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    OutputText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u32,

    #[serde(default)]
    pub output_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncompleteDetails {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesError {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: String,
}

/// Stream events, discriminated by their dotted `type`
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    #[serde(rename = "response.created")]
    Created { response: ResponsesResponse },

    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { output_index: u64, item: OutputItem },

    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta { delta: String },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { output_index: u64, delta: String },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone { output_index: u64 },

    #[serde(rename = "response.completed")]
    Completed { response: ResponsesResponse },

    #[serde(rename = "response.incomplete")]
    Incomplete { response: ResponsesResponse },

    #[serde(rename = "response.failed")]
    Failed { response: ResponsesResponse },

    /// Top-level stream error; `code`/`message` sit beside `type`
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },

    /// Events that carry nothing the engine needs
    #[serde(other)]
    Other,
}
