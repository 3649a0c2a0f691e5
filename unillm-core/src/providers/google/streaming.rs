//! Stream decoding for Gemini `streamGenerateContent?alt=sse`
//!
//! Each frame is a partial generateContent response. Function calls always
//! arrive whole, so each one opens, fills and closes its slot in one frame.
//! The frame carrying `finishReason` ends the turn.

use serde_json::Value;
use tracing::warn;

use super::converter::{map_finish_reason, normalize_args};
use super::types::GeminiResponse;
use crate::http::error::extract_error_details;
use crate::http::SseFrame;
use crate::protocol::{FinishReason, Usage};
use crate::providers::error::ProviderResult;
use crate::stream::{DecoderState, StreamEvent};

/// Decode one Gemini stream frame
pub fn decode_frame(frame: &SseFrame, state: &mut DecoderState) -> ProviderResult<Vec<StreamEvent>> {
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse Gemini stream chunk: {}", e);
            return Ok(Vec::new());
        }
    };

    if value.get("error").is_some() || value.is_array() {
        if let Some(details) = extract_error_details(&value) {
            return Ok(vec![StreamEvent::Error {
                code: details.code,
                message: details.message,
            }]);
        }
    }

    let chunk: GeminiResponse = match serde_json::from_value(value) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Unexpected Gemini stream chunk shape: {}", e);
            return Ok(Vec::new());
        }
    };

    if let Some(usage) = chunk.usage_metadata {
        state.usage = Some(Usage::from(usage));
    }

    let blocked = chunk
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_ref())
        .is_some();

    let mut events = Vec::new();
    let Some(candidate) = chunk.candidates.into_iter().next() else {
        if blocked {
            events.push(StreamEvent::TurnEnd {
                finish_reason: FinishReason::ContentFilter,
                usage: state.usage.take(),
            });
        }
        return Ok(events);
    };

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.visible_text().filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta(text.to_string()));
        }
        if let Some(call) = part.function_call {
            let index = state.next_tool();
            events.push(StreamEvent::ToolCallStart {
                index,
                call_id: Some(call.id.unwrap_or_else(|| format!("call_{}", index))),
                tool_name: Some(call.name),
            });
            events.push(StreamEvent::ToolCallArgFragment {
                index,
                text: normalize_args(call.args).to_string(),
            });
            events.push(StreamEvent::ToolCallEnd { index });
        }
    }

    if let Some(reason) = candidate.finish_reason {
        events.push(StreamEvent::TurnEnd {
            finish_reason: map_finish_reason(&reason, state.saw_tool_calls()),
            usage: state.usage.take(),
        });
    }

    Ok(events)
}
