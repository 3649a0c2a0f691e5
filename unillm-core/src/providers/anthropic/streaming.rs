//! Stream decoding for Anthropic Messages events
//!
//! Every content block is bracketed by `content_block_start` and
//! `content_block_stop` and addressed by its block index. Text blocks and
//! tool-use blocks share that index space, so tool blocks are mapped onto
//! dense tool-call slots. The stop reason arrives in `message_delta`, ahead of
//! the closing `message_stop`.

use tracing::{debug, warn};

use super::converter::map_stop_reason;
use super::types::*;
use crate::http::SseFrame;
use crate::protocol::FinishReason;
use crate::providers::error::ProviderResult;
use crate::stream::{DecoderState, StreamEvent};

/// Decode one Messages API stream frame
pub fn decode_frame(frame: &SseFrame, state: &mut DecoderState) -> ProviderResult<Vec<StreamEvent>> {
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let event: ClaudeStreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => {
            warn!(event = ?frame.event, "Skipping unrecognized Claude stream event: {}", e);
            return Ok(Vec::new());
        }
    };

    let events = match event {
        ClaudeStreamEvent::MessageStart { message } => {
            if let Some(usage) = message.usage {
                state.merge_usage(usage.input_tokens, usage.output_tokens);
            }
            Vec::new()
        }
        ClaudeStreamEvent::ContentBlockStart {
            index,
            content_block,
        } => match content_block {
            ClaudeContentBlock::Text { text } if !text.is_empty() => {
                vec![StreamEvent::TextDelta(text)]
            }
            ClaudeContentBlock::ToolUse { id, name, .. } => {
                let slot = state.open_tool(index);
                vec![StreamEvent::ToolCallStart {
                    index: slot,
                    call_id: Some(id),
                    tool_name: Some(name),
                }]
            }
            _ => Vec::new(),
        },
        ClaudeStreamEvent::ContentBlockDelta { index, delta } => match delta {
            ClaudeStreamDelta::TextDelta { text } if !text.is_empty() => {
                vec![StreamEvent::TextDelta(text)]
            }
            ClaudeStreamDelta::InputJsonDelta { partial_json } => match state.tool_slot(index) {
                Some(slot) if !partial_json.is_empty() => vec![StreamEvent::ToolCallArgFragment {
                    index: slot,
                    text: partial_json,
                }],
                Some(_) => Vec::new(),
                None => {
                    warn!(block = index, "Argument delta for a block that is not a tool call");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        },
        ClaudeStreamEvent::ContentBlockStop { index } => match state.tool_slot(index) {
            Some(slot) => vec![StreamEvent::ToolCallEnd { index: slot }],
            None => Vec::new(),
        },
        ClaudeStreamEvent::MessageDelta { delta, usage } => {
            if let Some(reason) = delta.stop_reason {
                state.pending_finish = Some(map_stop_reason(&reason));
            }
            if let Some(usage) = usage {
                state.merge_usage(usage.input_tokens, usage.output_tokens);
            }
            Vec::new()
        }
        ClaudeStreamEvent::MessageStop => {
            let finish_reason = state.pending_finish.take().unwrap_or(if state.saw_tool_calls() {
                FinishReason::ToolCalls
            } else {
                FinishReason::Stop
            });
            vec![StreamEvent::TurnEnd {
                finish_reason,
                usage: state.usage.take(),
            }]
        }
        ClaudeStreamEvent::Ping => {
            debug!("Claude keep-alive");
            Vec::new()
        }
        ClaudeStreamEvent::Error { error } => vec![StreamEvent::Error {
            code: error.error_type,
            message: error.message,
        }],
    };

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Usage;

    fn decode(state: &mut DecoderState, event: &str, data: &str) -> Vec<StreamEvent> {
        decode_frame(&SseFrame::named(event, data), state).unwrap()
    }

    #[test]
    fn test_text_block_then_tool_block() {
        let mut state = DecoderState::default();
        decode(
            &mut state,
            "message_start",
            r#"{"type":"message_start","message":{"id":"msg_1","type":"message","role":"assistant","content":[],"model":"claude-3-5-sonnet-latest","usage":{"input_tokens":25,"output_tokens":1}}}"#,
        );
        decode(
            &mut state,
            "content_block_start",
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
        );
        let events = decode(
            &mut state,
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Checking"}}"#,
        );
        assert_eq!(events, vec![StreamEvent::TextDelta("Checking".into())]);
        assert!(decode(&mut state, "content_block_stop", r#"{"type":"content_block_stop","index":0}"#).is_empty());

        let events = decode(
            &mut state,
            "content_block_start",
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"get_weather","input":{}}}"#,
        );
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallStart {
                index: 0,
                call_id: Some("toolu_1".into()),
                tool_name: Some("get_weather".into()),
            }]
        );

        let events = decode(
            &mut state,
            "content_block_delta",
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"city\": \"Paris\"}"}}"#,
        );
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallArgFragment {
                index: 0,
                text: "{\"city\": \"Paris\"}".into(),
            }]
        );
        assert_eq!(
            decode(&mut state, "content_block_stop", r#"{"type":"content_block_stop","index":1}"#),
            vec![StreamEvent::ToolCallEnd { index: 0 }]
        );

        decode(
            &mut state,
            "message_delta",
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use","stop_sequence":null},"usage":{"output_tokens":15}}"#,
        );
        assert_eq!(
            decode(&mut state, "message_stop", r#"{"type":"message_stop"}"#),
            vec![StreamEvent::TurnEnd {
                finish_reason: FinishReason::ToolCalls,
                usage: Some(Usage::new(25, 15)),
            }]
        );
    }

    #[test]
    fn test_ping_and_unknown_events_are_ignored() {
        let mut state = DecoderState::default();
        assert!(decode(&mut state, "ping", r#"{"type": "ping"}"#).is_empty());
        assert!(decode(&mut state, "mystery", r#"{"type": "mystery"}"#).is_empty());
        assert!(decode(
            &mut state,
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"hm"}}"#
        )
        .is_empty());
    }

    #[test]
    fn test_error_event() {
        let mut state = DecoderState::default();
        let events = decode(
            &mut state,
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        assert_eq!(
            events,
            vec![StreamEvent::Error {
                code: "overloaded_error".into(),
                message: "Overloaded".into(),
            }]
        );
    }
}
