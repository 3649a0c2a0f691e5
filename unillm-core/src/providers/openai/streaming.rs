//! Stream decoding for OpenAI chat-completions frames
//!
//! Tool calls arrive as an array of deltas keyed by `index`; the first delta of
//! a call carries its id and name, later ones only argument text. The finish
//! reason precedes the optional usage chunk and the `[DONE]` sentinel.

use serde_json::Value;
use tracing::warn;

use super::converter::map_finish_reason;
use super::types::OpenAIStreamChunk;
use crate::http::error::extract_error_details;
use crate::http::SseFrame;
use crate::protocol::{FinishReason, Usage};
use crate::providers::error::ProviderResult;
use crate::stream::{DecoderState, StreamEvent};

const DONE: &str = "[DONE]";

/// Decode one chat-completions frame
pub fn decode_frame(frame: &SseFrame, state: &mut DecoderState) -> ProviderResult<Vec<StreamEvent>> {
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }

    if data == DONE {
        let finish_reason = state.pending_finish.take().unwrap_or(FinishReason::Stop);
        return Ok(vec![StreamEvent::TurnEnd {
            finish_reason,
            usage: state.usage.take(),
        }]);
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            // Log parsing error but continue stream
            warn!("Failed to parse stream chunk: {}", e);
            return Ok(Vec::new());
        }
    };

    if value.get("error").is_some() {
        if let Some(details) = extract_error_details(&value) {
            return Ok(vec![StreamEvent::Error {
                code: details.code,
                message: details.message,
            }]);
        }
    }

    let chunk: OpenAIStreamChunk = match serde_json::from_value(value) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Unexpected stream chunk shape: {}", e);
            return Ok(Vec::new());
        }
    };

    let mut events = Vec::new();

    if let Some(usage) = chunk.usage {
        state.usage = Some(Usage::from(usage));
    }

    for choice in chunk.choices.into_iter().filter(|c| c.index == 0) {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                events.push(StreamEvent::TextDelta(content));
            }
        }

        for call in choice.delta.tool_calls.unwrap_or_default() {
            state.note_tool(call.index);
            let (name, arguments) = match call.function {
                Some(function) => (function.name, function.arguments),
                None => (None, None),
            };
            // Some compatible servers repeat `"id": ""` / `"name": ""` on continuation deltas
            let call_id = call.id.filter(|id| !id.is_empty());
            let name = name.filter(|n| !n.is_empty());

            if call_id.is_some() || name.is_some() {
                events.push(StreamEvent::ToolCallStart {
                    index: call.index,
                    call_id,
                    tool_name: name,
                });
            }
            if let Some(text) = arguments.filter(|a| !a.is_empty()) {
                events.push(StreamEvent::ToolCallArgFragment {
                    index: call.index,
                    text,
                });
            }
        }

        if let Some(reason) = choice.finish_reason {
            state.pending_finish = Some(map_finish_reason(&reason));
        }
    }

    Ok(events)
}
