//! Per-stream reconstruction state machine

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::{DecoderState, StreamEvent};
use crate::http::SseFrame;
use crate::protocol::{FinishReason, Response, StreamChunk, ToolCall, ToolCallDelta, Usage};
use crate::providers::adapter::Adapter;
use crate::providers::error::{ProviderError, ProviderResult};

/// Lifecycle of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Still accepting frames
    Open,
    /// The turn ended and the aggregate is complete
    Finished,
    /// Failed before the turn ended
    Aborted,
}

/// Tool call under construction
#[derive(Debug, Default)]
struct ToolCallFragment {
    call_id: Option<String>,
    tool_name: Option<String>,
    arguments: String,
    parsed: Option<ToolCall>,
}

impl ToolCallFragment {
    fn close(&mut self, index: usize) -> &ToolCall {
        let (call_id, tool_name, arguments) = (&self.call_id, &self.tool_name, &self.arguments);
        self.parsed.get_or_insert_with(|| {
            let call_id = call_id.clone().unwrap_or_else(|| {
                warn!(index, "Tool call closed without an id");
                format!("call_{}", index)
            });
            let tool_name = tool_name.clone().unwrap_or_else(|| {
                warn!(index, "Tool call closed without a name");
                String::new()
            });
            ToolCall::from_raw_arguments(call_id, tool_name, arguments)
        })
    }

    fn snapshot(&self, index: usize) -> ToolCall {
        match &self.parsed {
            Some(call) => call.clone(),
            None => ToolCall::from_raw_arguments(
                self.call_id.clone().unwrap_or_else(|| format!("call_{}", index)),
                self.tool_name.clone().unwrap_or_default(),
                &self.arguments,
            ),
        }
    }
}

/// Reconstructs chunks and the final response of one stream
#[derive(Debug)]
pub struct StreamEngine {
    provider: String,
    decoder: DecoderState,
    text: String,
    fragments: BTreeMap<usize, ToolCallFragment>,
    response_id: Option<String>,
    last_payload: Option<String>,
    status: StreamStatus,
    response: Option<Response>,
    deferred_error: Option<ProviderError>,
}

impl StreamEngine {
    /// Fresh engine for a stream served by `provider`
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            decoder: DecoderState::default(),
            text: String::new(),
            fragments: BTreeMap::new(),
            response_id: None,
            last_payload: None,
            status: StreamStatus::Open,
            response: None,
            deferred_error: None,
        }
    }

    /// Current lifecycle state
    pub fn status(&self) -> StreamStatus {
        self.status
    }

    /// Whether the turn ended
    pub fn is_finished(&self) -> bool {
        self.status == StreamStatus::Finished
    }

    /// Decode one frame with `adapter` and apply the resulting events
    ///
    /// When an event fails after earlier events of the same frame produced
    /// chunks, those chunks are returned and the error is held back until
    /// [`take_error`](Self::take_error) or the next call.
    pub fn push_frame(
        &mut self,
        adapter: &dyn Adapter,
        frame: &SseFrame,
    ) -> ProviderResult<Vec<StreamChunk>> {
        if let Some(err) = self.deferred_error.take() {
            return Err(err);
        }
        if self.status != StreamStatus::Open {
            warn!(provider = %self.provider, status = ?self.status, "Ignoring frame after stream end");
            return Ok(Vec::new());
        }

        let events = match adapter.parse_stream_frame(frame, &mut self.decoder) {
            Ok(events) => events,
            Err(e) => {
                self.abort();
                return Err(e);
            }
        };
        if frame.data.starts_with('{') || frame.data.starts_with('[') {
            self.last_payload = Some(frame.data.clone());
        }

        let mut chunks = Vec::with_capacity(events.len());
        for event in events {
            match self.apply(event) {
                Ok(Some(chunk)) => chunks.push(chunk),
                Ok(None) => {}
                Err(err) if chunks.is_empty() => return Err(err),
                Err(err) => {
                    self.deferred_error = Some(err);
                    break;
                }
            }
        }
        Ok(chunks)
    }

    /// Error held back by [`push_frame`](Self::push_frame), if any
    pub fn take_error(&mut self) -> Option<ProviderError> {
        self.deferred_error.take()
    }

    /// Apply one event
    pub fn apply(&mut self, event: StreamEvent) -> ProviderResult<Option<StreamChunk>> {
        if self.status != StreamStatus::Open {
            warn!(provider = %self.provider, ?event, "Ignoring event after stream end");
            return Ok(None);
        }

        match event {
            StreamEvent::TextDelta(text) => {
                if text.is_empty() {
                    return Ok(None);
                }
                self.text.push_str(&text);
                Ok(Some(StreamChunk::text(text)))
            }
            StreamEvent::ToolCallStart {
                index,
                call_id,
                tool_name,
            } => {
                let call_id = call_id.filter(|id| !id.is_empty());
                let tool_name = tool_name.filter(|name| !name.is_empty());
                let fragment = self.fragments.entry(index).or_default();
                if call_id.is_some() {
                    fragment.call_id = call_id.clone();
                }
                if tool_name.is_some() {
                    fragment.tool_name = tool_name.clone();
                }
                Ok(Some(StreamChunk::tool(ToolCallDelta {
                    index,
                    call_id,
                    tool_name,
                    arguments_fragment: String::new(),
                })))
            }
            StreamEvent::ToolCallArgFragment { index, text } => {
                let fragment = self.fragments.entry(index).or_default();
                if fragment.parsed.is_some() {
                    warn!(index, "Argument fragment for a closed tool call");
                    return Ok(None);
                }
                fragment.arguments.push_str(&text);
                Ok(Some(StreamChunk::tool(ToolCallDelta {
                    index,
                    call_id: None,
                    tool_name: None,
                    arguments_fragment: text,
                })))
            }
            StreamEvent::ToolCallEnd { index } => {
                match self.fragments.get_mut(&index) {
                    Some(fragment) => {
                        let call = fragment.close(index);
                        if let Some(err) = &call.malformed {
                            warn!(index, error = %err, "Tool call arguments did not parse");
                        }
                    }
                    None => debug!(index, "End for unknown tool call"),
                }
                Ok(None)
            }
            StreamEvent::TurnEnd {
                finish_reason,
                usage,
            } => Ok(Some(self.finish_turn(finish_reason, usage))),
            StreamEvent::ResponseId(id) => {
                self.response_id = Some(id);
                Ok(None)
            }
            StreamEvent::Error { code, message } => {
                warn!(provider = %self.provider, %code, %message, "Vendor error in stream");
                self.abort();
                Err(ProviderError::vendor(None, code, message))
            }
        }
    }

    /// End of frames; closes the turn if the vendor already reported why it stopped
    pub fn finish(&mut self) -> ProviderResult<Option<StreamChunk>> {
        if let Some(err) = self.deferred_error.take() {
            return Err(err);
        }
        match self.status {
            StreamStatus::Finished | StreamStatus::Aborted => Ok(None),
            StreamStatus::Open => match self.decoder.pending_finish.take() {
                Some(finish_reason) => {
                    let usage = self.decoder.usage.take();
                    Ok(Some(self.finish_turn(finish_reason, usage)))
                }
                None => {
                    warn!(provider = %self.provider, "Stream ended without end of turn");
                    self.abort();
                    Err(ProviderError::IncompleteStream)
                }
            },
        }
    }

    /// Mark the stream failed; the partial aggregate stays inspectable
    pub fn abort(&mut self) {
        if self.status == StreamStatus::Open {
            self.status = StreamStatus::Aborted;
        }
    }

    /// The aggregate, once the turn has ended
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Take the aggregate, once the turn has ended
    pub fn into_response(self) -> Option<Response> {
        self.response
    }

    /// Aggregate of everything received so far, flagged incomplete unless finished
    pub fn partial(&self) -> Response {
        if let Some(response) = &self.response {
            return response.clone();
        }
        Response {
            content: self.text.clone(),
            tool_calls: self
                .fragments
                .iter()
                .map(|(index, fragment)| fragment.snapshot(*index))
                .collect(),
            finish_reason: self.decoder.pending_finish.unwrap_or(FinishReason::Error),
            usage: self.decoder.usage,
            original: self.original(),
            vendor_response_id: self.response_id.clone(),
            provider: self.provider.clone(),
            complete: false,
        }
    }

    fn original(&self) -> Value {
        self.last_payload
            .as_deref()
            .and_then(|payload| serde_json::from_str(payload).ok())
            .unwrap_or(Value::Null)
    }

    fn finish_turn(&mut self, finish_reason: FinishReason, usage: Option<Usage>) -> StreamChunk {
        let usage = usage.or(self.decoder.usage.take());
        let tool_calls = self
            .fragments
            .iter_mut()
            .map(|(index, fragment)| fragment.close(*index).clone())
            .collect();

        debug!(provider = %self.provider, %finish_reason, "Stream turn ended");
        self.response = Some(Response {
            content: std::mem::take(&mut self.text),
            tool_calls,
            finish_reason,
            usage,
            original: self.original(),
            vendor_response_id: self.response_id.clone(),
            provider: self.provider.clone(),
            complete: true,
        });
        self.status = StreamStatus::Finished;
        StreamChunk::terminal(finish_reason, usage)
    }
}
