//! Conversion between the unified protocol and the Gemini format

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use super::types::*;
use crate::protocol::{
    remove_additional_properties, CompletionRequest, ContentPart, FinishReason, Message,
    MessageContent, MessageRole, Response, Tool, ToolCall, ToolChoice, Usage,
};
use crate::providers::error::ProviderResult;

/// Convert a unified request to Gemini format
pub fn to_gemini_request(request: &CompletionRequest) -> GeminiRequest {
    let options = &request.options;

    let system_parts: Vec<GeminiPart> = request
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.text())
        .filter(|text| !text.is_empty())
        .map(GeminiPart::text)
        .collect();

    let schema = options.response_schema.as_ref().map(|s| s.for_google());
    let generation_config = GeminiGenerationConfig {
        temperature: options.temperature,
        top_p: options.top_p,
        max_output_tokens: options.max_tokens,
        stop_sequences: options.stop.clone(),
        response_mime_type: options.response_schema.as_ref().map(|s| s.mime_type.clone()),
        response_schema: schema,
    };

    GeminiRequest {
        contents: to_gemini_contents(&request.messages),
        system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
            role: None,
            parts: system_parts,
        }),
        tools: (!request.tools.is_empty()).then(|| {
            vec![GeminiTool {
                function_declarations: request.tools.iter().map(to_declaration).collect(),
            }]
        }),
        tool_config: options.tool_choice.as_ref().map(to_tool_config),
        generation_config: (!generation_config.is_empty()).then_some(generation_config),
    }
}

/// Convert the conversation; consecutive tool results share one user turn
fn to_gemini_contents(messages: &[Message]) -> Vec<GeminiContent> {
    // Gemini answers a call by function name, so results look the name up by id
    let names: HashMap<&str, &str> = messages
        .iter()
        .flat_map(|m| m.tool_calls.iter())
        .map(|call| (call.call_id.as_str(), call.tool_name.as_str()))
        .collect();

    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut previous_was_tool = false;

    for message in messages {
        match message.role {
            MessageRole::System => continue,
            MessageRole::User => contents.push(GeminiContent {
                role: Some("user".to_string()),
                parts: to_gemini_parts(&message.content),
            }),
            MessageRole::Assistant => {
                let mut parts = to_gemini_parts(&message.content);
                parts.extend(message.tool_calls.iter().map(to_function_call_part));
                contents.push(GeminiContent {
                    role: Some("model".to_string()),
                    parts,
                });
            }
            MessageRole::Tool => {
                let call_id = message.tool_call_id.as_deref().unwrap_or_default();
                let name = names
                    .get(call_id)
                    .copied()
                    .or(message.name.as_deref())
                    .unwrap_or(call_id);
                let part = GeminiPart {
                    function_response: Some(GeminiFunctionResponse {
                        name: name.to_string(),
                        response: json!({ "result": message.content.text() }),
                    }),
                    ..GeminiPart::default()
                };
                match contents.last_mut() {
                    Some(last) if previous_was_tool => last.parts.push(part),
                    _ => contents.push(GeminiContent {
                        role: Some("user".to_string()),
                        parts: vec![part],
                    }),
                }
            }
        }
        previous_was_tool = message.role == MessageRole::Tool;
    }

    contents
}

fn to_gemini_parts(content: &MessageContent) -> Vec<GeminiPart> {
    match content {
        MessageContent::Text(text) if text.is_empty() => Vec::new(),
        MessageContent::Text(text) => vec![GeminiPart::text(text.clone())],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(GeminiPart::text(text.clone())),
                ContentPart::Image {
                    url,
                    base64,
                    mime_type,
                } => {
                    let mime_type = mime_type.clone().unwrap_or_else(|| "image/jpeg".to_string());
                    match (base64, url) {
                        (Some(data), _) => Some(GeminiPart {
                            inline_data: Some(GeminiInlineData {
                                mime_type,
                                data: data.clone(),
                            }),
                            ..GeminiPart::default()
                        }),
                        (None, Some(url)) => Some(GeminiPart {
                            file_data: Some(GeminiFileData {
                                mime_type,
                                file_uri: url.clone(),
                            }),
                            ..GeminiPart::default()
                        }),
                        (None, None) => None,
                    }
                }
            })
            .collect(),
    }
}

fn to_function_call_part(call: &ToolCall) -> GeminiPart {
    let args = match call.arguments() {
        Ok(Value::Object(map)) => Value::Object(map.clone()),
        _ => Value::Object(Map::new()),
    };
    GeminiPart {
        function_call: Some(GeminiFunctionCall {
            id: None,
            name: call.tool_name.clone(),
            args,
        }),
        ..GeminiPart::default()
    }
}

fn to_declaration(tool: &Tool) -> GeminiFunctionDeclaration {
    let schema = tool.schema();
    GeminiFunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: (!schema.is_null()).then(|| remove_additional_properties(&schema)),
    }
}

fn to_tool_config(choice: &ToolChoice) -> GeminiToolConfig {
    let (mode, allowed) = match choice {
        ToolChoice::Auto => ("AUTO", None),
        ToolChoice::None => ("NONE", None),
        ToolChoice::Required => ("ANY", None),
        ToolChoice::Function(name) => ("ANY", Some(vec![name.clone()])),
    };
    GeminiToolConfig {
        function_calling_config: GeminiFunctionCallingConfig {
            mode: mode.to_string(),
            allowed_function_names: allowed,
        },
    }
}

/// Map a Gemini finish reason; `STOP` after function calls means the turn wants tool results
pub fn map_finish_reason(reason: &str, has_tool_calls: bool) -> FinishReason {
    match reason {
        "STOP" if has_tool_calls => FinishReason::ToolCalls,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY" => {
            FinishReason::ContentFilter
        }
        "MALFORMED_FUNCTION_CALL" => FinishReason::Error,
        _ if has_tool_calls => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

impl From<GeminiUsage> for Usage {
    fn from(usage: GeminiUsage) -> Self {
        Usage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: if usage.total_token_count > 0 {
                usage.total_token_count
            } else {
                usage.prompt_token_count + usage.candidates_token_count
            },
        }
    }
}

/// Convert a generateContent body to a unified response
pub fn from_gemini_response(body: Value, provider: &str) -> ProviderResult<Response> {
    let response: GeminiResponse = serde_json::from_value(body.clone())?;
    let usage = response.usage_metadata.map(Usage::from);

    let blocked = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_ref())
        .is_some();

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(Response {
            content: String::new(),
            tool_calls: Vec::new(),
            finish_reason: if blocked {
                FinishReason::ContentFilter
            } else {
                FinishReason::Stop
            },
            usage,
            original: body,
            vendor_response_id: None,
            provider: provider.to_string(),
            complete: true,
        });
    };

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.visible_text() {
            content.push_str(text);
        }
        if let Some(call) = part.function_call {
            let call_id = call
                .id
                .unwrap_or_else(|| format!("call_{}", tool_calls.len()));
            tool_calls.push(ToolCall::new(call_id, call.name, normalize_args(call.args)));
        }
    }

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some(reason) => map_finish_reason(reason, !tool_calls.is_empty()),
        None if !tool_calls.is_empty() => FinishReason::ToolCalls,
        None => FinishReason::Stop,
    };

    Ok(Response {
        content,
        tool_calls,
        finish_reason,
        usage,
        original: body,
        vendor_response_id: None,
        provider: provider.to_string(),
        complete: true,
    })
}

/// Calls without arguments arrive with `args` absent
pub(crate) fn normalize_args(args: Value) -> Value {
    match args {
        Value::Null => Value::Object(Map::new()),
        args => args,
    }
}
