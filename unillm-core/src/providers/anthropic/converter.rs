//! Conversion between the unified protocol and the Anthropic Messages format

use serde_json::{json, Value};

use super::types::*;
use crate::protocol::{
    CompletionRequest, ContentPart, FinishReason, Message, MessageContent, MessageRole, Response,
    Tool, ToolCall, ToolChoice, Usage,
};
use crate::providers::error::ProviderResult;

/// Output budget used when neither the request nor the config sets one
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Convert a unified request to Messages API format
pub fn to_claude_request(request: &CompletionRequest, default_max_tokens: u32) -> ClaudeRequest {
    let options = &request.options;

    let system: Vec<String> = request
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.text())
        .filter(|text| !text.is_empty())
        .collect();

    ClaudeRequest {
        model: request.model.clone(),
        max_tokens: options.max_tokens.unwrap_or(default_max_tokens),
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages: to_claude_messages(&request.messages),
        temperature: options.temperature,
        top_p: options.top_p,
        stop_sequences: options.stop.clone(),
        stream: request.stream,
        tools: (!request.tools.is_empty())
            .then(|| request.tools.iter().map(to_claude_tool).collect()),
        tool_choice: options.tool_choice.as_ref().map(to_claude_tool_choice),
    }
}

/// Convert the conversation, merging consecutive tool results into one user turn
fn to_claude_messages(messages: &[Message]) -> Vec<ClaudeMessage> {
    let mut converted: Vec<ClaudeMessage> = Vec::new();
    let mut previous_was_tool = false;

    for message in messages {
        match message.role {
            MessageRole::System => continue,
            MessageRole::User => {
                let content = to_claude_blocks(&message.content);
                // The Messages API rejects turns with an empty content array
                if content.is_empty() {
                    continue;
                }
                converted.push(ClaudeMessage {
                    role: "user".to_string(),
                    content,
                });
            }
            MessageRole::Assistant => {
                let mut content = to_claude_blocks(&message.content);
                content.extend(message.tool_calls.iter().map(to_tool_use_block));
                if content.is_empty() {
                    continue;
                }
                converted.push(ClaudeMessage {
                    role: "assistant".to_string(),
                    content,
                });
            }
            MessageRole::Tool => {
                let block = ClaudeContentBlock::ToolResult {
                    tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                    content: message.content.text(),
                };
                match converted.last_mut() {
                    Some(last) if previous_was_tool => last.content.push(block),
                    _ => converted.push(ClaudeMessage {
                        role: "user".to_string(),
                        content: vec![block],
                    }),
                }
            }
        }
        previous_was_tool = message.role == MessageRole::Tool;
    }

    converted
}

fn to_claude_blocks(content: &MessageContent) -> Vec<ClaudeContentBlock> {
    match content {
        MessageContent::Text(text) if text.is_empty() => Vec::new(),
        MessageContent::Text(text) => vec![ClaudeContentBlock::Text { text: text.clone() }],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(ClaudeContentBlock::Text { text: text.clone() }),
                ContentPart::Image {
                    url,
                    base64,
                    mime_type,
                } => {
                    let source = match (base64, url) {
                        (Some(data), _) => ClaudeImageSource::Base64 {
                            media_type: mime_type.clone().unwrap_or_else(|| "image/jpeg".to_string()),
                            data: data.clone(),
                        },
                        (None, Some(url)) => ClaudeImageSource::Url { url: url.clone() },
                        (None, None) => return None,
                    };
                    Some(ClaudeContentBlock::Image { source })
                }
            })
            .collect(),
    }
}

fn to_tool_use_block(call: &ToolCall) -> ClaudeContentBlock {
    // `input` must be an object even when the original arguments never parsed
    let input = match call.arguments() {
        Ok(Value::Object(map)) => Value::Object(map.clone()),
        _ => json!({}),
    };
    ClaudeContentBlock::ToolUse {
        id: call.call_id.clone(),
        name: call.tool_name.clone(),
        input,
    }
}

fn to_claude_tool(tool: &Tool) -> ClaudeTool {
    ClaudeTool {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: tool.schema(),
    }
}

fn to_claude_tool_choice(choice: &ToolChoice) -> ClaudeToolChoice {
    match choice {
        ToolChoice::Auto => ClaudeToolChoice::Auto,
        ToolChoice::None => ClaudeToolChoice::None,
        ToolChoice::Required => ClaudeToolChoice::Any,
        ToolChoice::Function(name) => ClaudeToolChoice::Tool { name: name.clone() },
    }
}

/// Map an Anthropic stop reason
pub fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "tool_use" => FinishReason::ToolCalls,
        "max_tokens" => FinishReason::Length,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

impl From<ClaudeUsage> for Usage {
    fn from(usage: ClaudeUsage) -> Self {
        Usage::new(
            usage.input_tokens.unwrap_or_default(),
            usage.output_tokens.unwrap_or_default(),
        )
    }
}

/// Convert a Messages API response body to a unified response
pub fn from_claude_response(body: Value, provider: &str) -> ProviderResult<Response> {
    let response: ClaudeResponse = serde_json::from_value(body.clone())?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            ClaudeContentBlock::Text { text } => content.push_str(&text),
            ClaudeContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall::new(id, name, input));
            }
            _ => {}
        }
    }

    let finish_reason = match response.stop_reason.as_deref() {
        Some(reason) => map_stop_reason(reason),
        None if !tool_calls.is_empty() => FinishReason::ToolCalls,
        None => FinishReason::Stop,
    };

    Ok(Response {
        content,
        tool_calls,
        finish_reason,
        usage: response.usage.map(Usage::from),
        original: body,
        vendor_response_id: None,
        provider: provider.to_string(),
        complete: true,
    })
}
