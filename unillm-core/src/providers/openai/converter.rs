//! Conversion between the unified protocol and the OpenAI chat-completions format

use serde_json::{json, Value};

use super::types::*;
use crate::protocol::{
    CompletionRequest, ContentPart, FinishReason, Message, MessageContent, Response, Tool,
    ToolCall, ToolChoice, Usage,
};
use crate::providers::error::{ProviderError, ProviderResult};

/// Convert a unified request to OpenAI format
pub fn to_openai_request(request: &CompletionRequest) -> OpenAIRequest {
    let options = &request.options;
    OpenAIRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(to_openai_message).collect(),
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        top_p: options.top_p,
        stop: options.stop.clone(),
        stream: request.stream,
        stream_options: (request.stream && options.include_usage)
            .then_some(OpenAIStreamOptions { include_usage: true }),
        response_format: options.response_schema.as_ref().map(|s| s.for_openai()),
        tools: (!request.tools.is_empty())
            .then(|| request.tools.iter().map(to_openai_tool).collect()),
        tool_choice: options.tool_choice.as_ref().map(to_openai_tool_choice),
    }
}

/// Convert a unified message to OpenAI format
fn to_openai_message(message: &Message) -> OpenAIMessage {
    let tool_calls = (!message.tool_calls.is_empty()).then(|| {
        message
            .tool_calls
            .iter()
            .map(|call| OpenAIToolCall {
                id: call.call_id.clone(),
                tool_type: function_type(),
                function: OpenAIFunctionCall {
                    name: call.tool_name.clone(),
                    arguments: Value::String(call.arguments_json()),
                },
            })
            .collect::<Vec<_>>()
    });

    // Assistant turns that only call tools carry no content
    let content = if tool_calls.is_some() && message.content.is_empty() {
        None
    } else {
        Some(to_openai_content(&message.content))
    };

    OpenAIMessage {
        role: message.role.as_str().to_string(),
        content,
        name: message.name.clone(),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// Convert message content to OpenAI format
fn to_openai_content(content: &MessageContent) -> OpenAIContent {
    match content {
        MessageContent::Text(text) => OpenAIContent::Text(text.clone()),
        MessageContent::Parts(parts) => OpenAIContent::Parts(
            parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(OpenAIContentPart::Text { text: text.clone() }),
                    ContentPart::Image {
                        url,
                        base64,
                        mime_type,
                    } => {
                        let url = match (url, base64) {
                            (Some(url), _) => url.clone(),
                            (None, Some(data)) => format!(
                                "data:{};base64,{}",
                                mime_type.as_deref().unwrap_or("image/jpeg"),
                                data
                            ),
                            (None, None) => return None,
                        };
                        Some(OpenAIContentPart::ImageUrl {
                            image_url: OpenAIImageUrl { url, detail: None },
                        })
                    }
                })
                .collect(),
        ),
    }
}

fn to_openai_tool(tool: &Tool) -> OpenAITool {
    OpenAITool {
        tool_type: function_type(),
        function: OpenAIFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.schema(),
        },
    }
}

fn to_openai_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({
            "type": "function",
            "function": { "name": name }
        }),
    }
}

/// Map an OpenAI finish reason
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "error" => FinishReason::Error,
        _ => FinishReason::Stop,
    }
}

impl From<OpenAIUsage> for Usage {
    fn from(usage: OpenAIUsage) -> Self {
        Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: if usage.total_tokens > 0 {
                usage.total_tokens
            } else {
                usage.prompt_tokens + usage.completion_tokens
            },
        }
    }
}

/// Convert an OpenAI response body to a unified response
pub fn from_openai_response(body: Value, provider: &str) -> ProviderResult<Response> {
    let response: OpenAIResponse = serde_json::from_value(body.clone())?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

    let content = match choice.message.content {
        Some(OpenAIContent::Text(text)) => text,
        Some(OpenAIContent::Parts(parts)) => parts
            .into_iter()
            .filter_map(|part| match part {
                OpenAIContentPart::Text { text } => Some(text),
                _ => None,
            })
            .collect(),
        None => String::new(),
    };

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(from_openai_tool_call)
        .collect();

    let finish_reason = match choice.finish_reason.as_deref() {
        Some(reason) => map_finish_reason(reason),
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

fn from_openai_tool_call(call: OpenAIToolCall) -> ToolCall {
    match call.function.arguments {
        Value::String(raw) => ToolCall::from_raw_arguments(call.id, call.function.name, &raw),
        Value::Null => ToolCall::new(call.id, call.function.name, json!({})),
        arguments => ToolCall::new(call.id, call.function.name, arguments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseSchema;

    #[test]
    fn test_request_with_tools_and_schema() {
        let request = CompletionRequest::new("gpt-4o", vec![Message::user("hi")])
            .with_tools(vec![Tool::new("lookup", "Find things", json!({"type": "object"}))])
            .with_tool_choice(ToolChoice::Function("lookup".into()))
            .with_response_schema(ResponseSchema::new(json!({"type": "object"})).with_name("answer"));

        let body = serde_json::to_value(to_openai_request(&request)).unwrap();
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");
        assert_eq!(body["tool_choice"]["function"]["name"], "lookup");
        assert_eq!(body["response_format"]["json_schema"]["name"], "answer");
        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn test_assistant_tool_call_echo() {
        let call = ToolCall::new("call_1", "lookup", json!({"q": "x"}));
        let message = Message::assistant_with_tool_calls("", vec![call.clone()]);
        let result = call.to_result_message("found");

        let request = CompletionRequest::new("gpt-4o", vec![message, result]);
        let body = serde_json::to_value(to_openai_request(&request)).unwrap();
        let assistant = &body["messages"][0];
        assert!(assistant.get("content").is_none());
        assert_eq!(assistant["tool_calls"][0]["id"], "call_1");
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{\"q\":\"x\"}");
        assert_eq!(body["messages"][1]["role"], "tool");
        assert_eq!(body["messages"][1]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_base64_image_becomes_data_url() {
        let request = CompletionRequest::new(
            "gpt-4o",
            vec![Message::user_parts(vec![ContentPart::image_base64("AAAA", "image/png")])],
        );
        let body = serde_json::to_value(to_openai_request(&request)).unwrap();
        assert_eq!(
            body["messages"][0]["content"][0]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_parse_object_arguments() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{"id": "c", "function": {"name": "f", "arguments": {"a": 1}}}]
                }
            }]
        });
        let response = from_openai_response(body, "openrouter").unwrap();
        assert_eq!(response.tool_calls[0].arguments, json!({"a": 1}));
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
    }

    #[test]
    fn test_no_choices_is_parse_error() {
        let err = from_openai_response(json!({"choices": []}), "openai").unwrap_err();
        assert!(matches!(err, ProviderError::ParseError(_)));
    }
}
