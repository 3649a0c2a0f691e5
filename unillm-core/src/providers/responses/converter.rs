//! Conversion between the unified protocol and the Responses API format

use std::collections::HashSet;

use serde_json::{json, Value};

use super::types::*;
use crate::protocol::{
    CompletionRequest, ContentPart, FinishReason, Message, MessageContent, MessageRole, Response,
    Tool, ToolCall, ToolChoice, Usage,
};
use crate::providers::error::{ProviderError, ProviderResult};

/// Convert a unified request to Responses API format
pub fn to_responses_request(request: &CompletionRequest) -> ProviderResult<ResponsesRequest> {
    let options = &request.options;

    // With a previous response id the vendor holds the issued calls
    if options.previous_response_id.is_none() {
        check_tool_result_pairing(&request.messages)?;
    }

    Ok(ResponsesRequest {
        model: request.model.clone(),
        input: to_responses_input(&request.messages),
        stream: request.stream,
        previous_response_id: options.previous_response_id.clone(),
        temperature: options.temperature,
        top_p: options.top_p,
        max_output_tokens: options.max_tokens,
        tools: (!request.tools.is_empty())
            .then(|| request.tools.iter().map(to_responses_tool).collect()),
        tool_choice: options.tool_choice.as_ref().map(to_responses_tool_choice),
        text: options.response_schema.as_ref().map(|schema| ResponsesTextConfig {
            format: schema.for_openai_responses(),
        }),
    })
}

/// Every tool result must answer a call issued earlier in the conversation
pub fn check_tool_result_pairing(messages: &[Message]) -> ProviderResult<()> {
    let mut issued: HashSet<&str> = HashSet::new();
    for message in messages {
        issued.extend(message.tool_calls.iter().map(|call| call.call_id.as_str()));
        if message.role == MessageRole::Tool {
            let tool_call_id = message.tool_call_id.as_deref().unwrap_or_default();
            if !issued.contains(tool_call_id) {
                return Err(ProviderError::OrphanedToolResult {
                    tool_call_id: tool_call_id.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn to_responses_input(messages: &[Message]) -> ResponsesInput {
    if let [only] = messages {
        if only.role == MessageRole::User && only.tool_calls.is_empty() {
            if let Some(text) = only.content.as_text() {
                return ResponsesInput::Text(text.to_string());
            }
        }
    }

    let mut items = Vec::new();
    for message in messages {
        match message.role {
            MessageRole::Tool => items.push(InputItem::FunctionCallOutput {
                call_id: message.tool_call_id.clone().unwrap_or_default(),
                output: message.content.text(),
            }),
            MessageRole::Assistant => {
                if !message.content.is_empty() {
                    items.push(InputItem::Message {
                        role: "assistant".to_string(),
                        content: InputContent::Text(message.content.text()),
                    });
                }
                items.extend(message.tool_calls.iter().map(to_function_call_item));
            }
            MessageRole::System | MessageRole::User => items.push(InputItem::Message {
                role: message.role.as_str().to_string(),
                content: to_input_content(&message.content),
            }),
        }
    }
    ResponsesInput::Items(items)
}

fn to_input_content(content: &MessageContent) -> InputContent {
    match content {
        MessageContent::Text(text) => InputContent::Text(text.clone()),
        MessageContent::Parts(parts) => InputContent::Parts(
            parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(InputContentPart::InputText { text: text.clone() }),
                    ContentPart::Image {
                        url,
                        base64,
                        mime_type,
                    } => {
                        let image_url = match (url, base64) {
                            (Some(url), _) => url.clone(),
                            (None, Some(data)) => format!(
                                "data:{};base64,{}",
                                mime_type.as_deref().unwrap_or("image/jpeg"),
                                data
                            ),
                            (None, None) => return None,
                        };
                        Some(InputContentPart::InputImage { image_url })
                    }
                })
                .collect(),
        ),
    }
}

fn to_function_call_item(call: &ToolCall) -> InputItem {
    InputItem::FunctionCall {
        call_id: call.call_id.clone(),
        name: call.tool_name.clone(),
        arguments: call.arguments_json(),
    }
}

fn to_responses_tool(tool: &Tool) -> ResponsesTool {
    ResponsesTool {
        tool_type: "function".to_string(),
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: tool.schema(),
        strict: true,
    }
}

fn to_responses_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({"type": "function", "name": name}),
    }
}

/// Finish reason from a response's terminal status
pub fn map_status(
    status: Option<&str>,
    incomplete: Option<&IncompleteDetails>,
    has_tool_calls: bool,
) -> FinishReason {
    match status {
        Some("incomplete") => match incomplete.and_then(|d| d.reason.as_deref()) {
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Length,
        },
        Some("failed") | Some("cancelled") => FinishReason::Error,
        _ if has_tool_calls => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

impl From<ResponsesUsage> for Usage {
    fn from(usage: ResponsesUsage) -> Self {
        Usage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: if usage.total_tokens > 0 {
                usage.total_tokens
            } else {
                usage.input_tokens + usage.output_tokens
            },
        }
    }
}

/// Convert a Responses API body to a unified response
pub fn from_responses_response(body: Value, provider: &str) -> ProviderResult<Response> {
    let response: ResponsesResponse = serde_json::from_value(body.clone())?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    let mut refused = false;
    for item in response.output {
        match item {
            OutputItem::Message { content: blocks } => {
                for block in blocks {
                    match block {
                        OutputContent::OutputText { text } => content.push_str(&text),
                        OutputContent::Refusal { refusal } => {
                            refused = true;
                            content.push_str(&refusal);
                        }
                        OutputContent::Other => {}
                    }
                }
            }
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => tool_calls.push(ToolCall::from_raw_arguments(call_id, name, &arguments)),
            OutputItem::Other => {}
        }
    }

    let finish_reason = if refused {
        FinishReason::ContentFilter
    } else {
        map_status(
            response.status.as_deref(),
            response.incomplete_details.as_ref(),
            !tool_calls.is_empty(),
        )
    };

    Ok(Response {
        content,
        tool_calls,
        finish_reason,
        usage: response.usage.map(Usage::from),
        original: body,
        vendor_response_id: response.id,
        provider: provider.to_string(),
        complete: true,
    })
}
