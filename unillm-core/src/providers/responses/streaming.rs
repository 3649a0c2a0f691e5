//! Stream decoding for Responses API events
//!
//! Function calls are announced by `response.output_item.added` and addressed
//! by `output_index` afterwards. Output indexes also count message and
//! reasoning items, so tool calls are mapped onto dense slots.

use tracing::warn;

use super::converter::map_status;
use super::types::*;
use crate::http::SseFrame;
use crate::protocol::Usage;
use crate::providers::error::ProviderResult;
use crate::stream::{DecoderState, StreamEvent};

/// Decode one Responses API stream frame
pub fn decode_frame(frame: &SseFrame, state: &mut DecoderState) -> ProviderResult<Vec<StreamEvent>> {
    let data = frame.data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(Vec::new());
    }

    let event: ResponsesStreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => {
            warn!(event = ?frame.event, "Skipping unrecognized Responses stream event: {}", e);
            return Ok(Vec::new());
        }
    };

    let events = match event {
        ResponsesStreamEvent::Created { response } => {
            response.id.map(StreamEvent::ResponseId).into_iter().collect()
        }
        ResponsesStreamEvent::OutputItemAdded {
            output_index,
            item: OutputItem::FunctionCall { call_id, name, .. },
        } => {
            let index = state.open_tool(output_index);
            vec![StreamEvent::ToolCallStart {
                index,
                call_id: (!call_id.is_empty()).then_some(call_id),
                tool_name: (!name.is_empty()).then_some(name),
            }]
        }
        ResponsesStreamEvent::OutputItemAdded { .. } => Vec::new(),
        ResponsesStreamEvent::OutputTextDelta { delta } if !delta.is_empty() => {
            vec![StreamEvent::TextDelta(delta)]
        }
        ResponsesStreamEvent::OutputTextDelta { .. } => Vec::new(),
        ResponsesStreamEvent::FunctionCallArgumentsDelta {
            output_index,
            delta,
        } => match state.tool_slot(output_index) {
            Some(index) if !delta.is_empty() => {
                vec![StreamEvent::ToolCallArgFragment { index, text: delta }]
            }
            Some(_) => Vec::new(),
            None => {
                warn!(output_index, "Argument delta for an unannounced function call");
                Vec::new()
            }
        },
        ResponsesStreamEvent::FunctionCallArgumentsDone { output_index } => state
            .tool_slot(output_index)
            .map(|index| StreamEvent::ToolCallEnd { index })
            .into_iter()
            .collect(),
        ResponsesStreamEvent::Completed { response }
        | ResponsesStreamEvent::Incomplete { response } => {
            let finish_reason = map_status(
                response.status.as_deref(),
                response.incomplete_details.as_ref(),
                state.saw_tool_calls(),
            );
            let mut events: Vec<StreamEvent> =
                response.id.map(StreamEvent::ResponseId).into_iter().collect();
            events.push(StreamEvent::TurnEnd {
                finish_reason,
                usage: response.usage.map(Usage::from),
            });
            events
        }
        ResponsesStreamEvent::Failed { response } => {
            let error = response.error.unwrap_or_default();
            vec![StreamEvent::Error {
                code: error.code.unwrap_or_else(|| "response_failed".to_string()),
                message: error.message,
            }]
        }
        ResponsesStreamEvent::Error { code, message } => vec![StreamEvent::Error {
            code: code.unwrap_or_else(|| "error".to_string()),
            message: message.unwrap_or_default(),
        }],
        ResponsesStreamEvent::Other => Vec::new(),
    };

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FinishReason;

    fn decode(state: &mut DecoderState, data: &str) -> Vec<StreamEvent> {
        decode_frame(&SseFrame::data(data), state).unwrap()
    }

    #[test]
    fn test_created_reports_response_id() {
        let mut state = DecoderState::default();
        let events = decode(
            &mut state,
            r#"{"type":"response.created","sequence_number":0,"response":{"id":"resp_1","object":"response","status":"in_progress","output":[]}}"#,
        );
        assert_eq!(events, vec![StreamEvent::ResponseId("resp_1".into())]);
    }

    #[test]
    fn test_function_call_lifecycle() {
        let mut state = DecoderState::default();
        let events = decode(
            &mut state,
            r#"{"type":"response.output_item.added","output_index":1,"item":{"type":"function_call","id":"fc_1","call_id":"call_1","name":"get_weather","arguments":""}}"#,
        );
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallStart {
                index: 0,
                call_id: Some("call_1".into()),
                tool_name: Some("get_weather".into()),
            }]
        );

        let events = decode(
            &mut state,
            r#"{"type":"response.function_call_arguments.delta","item_id":"fc_1","output_index":1,"delta":"{\"city\":"}"#,
        );
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallArgFragment {
                index: 0,
                text: "{\"city\":".into(),
            }]
        );

        let events = decode(
            &mut state,
            r#"{"type":"response.function_call_arguments.done","item_id":"fc_1","output_index":1,"arguments":"{\"city\":\"Rome\"}"}"#,
        );
        assert_eq!(events, vec![StreamEvent::ToolCallEnd { index: 0 }]);

        let events = decode(
            &mut state,
            r#"{"type":"response.completed","response":{"id":"resp_1","status":"completed","output":[],"usage":{"input_tokens":8,"output_tokens":4,"total_tokens":12}}}"#,
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::ResponseId("resp_1".into()),
                StreamEvent::TurnEnd {
                    finish_reason: FinishReason::ToolCalls,
                    usage: Some(Usage::new(8, 4)),
                }
            ]
        );
    }

    #[test]
    fn test_text_delta_and_unknown_events() {
        let mut state = DecoderState::default();
        assert_eq!(
            decode(
                &mut state,
                r#"{"type":"response.output_text.delta","item_id":"msg_1","output_index":0,"content_index":0,"delta":"Hi"}"#
            ),
            vec![StreamEvent::TextDelta("Hi".into())]
        );
        assert!(decode(
            &mut state,
            r#"{"type":"response.content_part.added","output_index":0,"content_index":0,"part":{"type":"output_text","text":""}}"#
        )
        .is_empty());
    }

    #[test]
    fn test_failed_and_error_events() {
        let mut state = DecoderState::default();
        assert_eq!(
            decode(
                &mut state,
                r#"{"type":"response.failed","response":{"id":"resp_1","status":"failed","error":{"code":"server_error","message":"boom"}}}"#
            ),
            vec![StreamEvent::Error {
                code: "server_error".into(),
                message: "boom".into(),
            }]
        );
        assert_eq!(
            decode(
                &mut state,
                r#"{"type":"error","code":"rate_limit_exceeded","message":"slow down","param":null}"#
            ),
            vec![StreamEvent::Error {
                code: "rate_limit_exceeded".into(),
                message: "slow down".into(),
            }]
        );
    }
}
