//! Stream reconstruction
//!
//! Vendors stream completions in different shapes. Adapters decode each frame
//! into [`StreamEvent`]s; the [`StreamEngine`] turns those events into
//! normalized [`StreamChunk`](crate::protocol::StreamChunk)s and, once the
//! turn ends, into a complete [`Response`](crate::protocol::Response).

pub mod completion;
pub mod engine;

pub use completion::CompletionStream;
pub use engine::{StreamEngine, StreamStatus};

use crate::protocol::{FinishReason, Usage};
use std::collections::HashMap;

/// Vendor-neutral stream event
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Assistant text
    TextDelta(String),

    /// A tool call opened or gained its id/name
    ToolCallStart {
        index: usize,
        call_id: Option<String>,
        tool_name: Option<String>,
    },

    /// Raw argument text for a tool call
    ToolCallArgFragment { index: usize, text: String },

    /// The vendor closed a tool call's argument stream
    ToolCallEnd { index: usize },

    /// The turn is over
    TurnEnd {
        finish_reason: FinishReason,
        usage: Option<Usage>,
    },

    /// Server-side conversation handle
    ResponseId(String),

    /// In-stream vendor error
    Error { code: String, message: String },
}

/// Per-stream scratch state owned by the engine and mutated by adapter decoding
#[derive(Debug, Default)]
pub struct DecoderState {
    /// Vendor block/output index to tool-call slot
    tool_slots: HashMap<u64, usize>,

    /// Next unused tool-call slot
    next_tool_index: usize,

    /// Finish reason reported ahead of the end-of-turn marker
    pub pending_finish: Option<FinishReason>,

    /// Usage collected so far
    pub usage: Option<Usage>,
}

impl DecoderState {
    /// Allocate the next tool-call slot for a vendor block index
    pub fn open_tool(&mut self, block: u64) -> usize {
        let index = self.next_tool_index;
        self.next_tool_index += 1;
        self.tool_slots.insert(block, index);
        index
    }

    /// Allocate a tool-call slot that has no vendor block index
    pub fn next_tool(&mut self) -> usize {
        let index = self.next_tool_index;
        self.next_tool_index += 1;
        index
    }

    /// Slot previously allocated for a vendor block index
    pub fn tool_slot(&self, block: u64) -> Option<usize> {
        self.tool_slots.get(&block).copied()
    }

    /// Whether any tool call has been seen on this stream
    pub fn saw_tool_calls(&self) -> bool {
        self.next_tool_index > 0
    }

    /// Record a tool call seen by vendors that index calls themselves
    pub fn note_tool(&mut self, index: usize) {
        self.next_tool_index = self.next_tool_index.max(index + 1);
    }

    /// Merge a partial usage report
    pub fn merge_usage(&mut self, prompt: Option<u32>, completion: Option<u32>) {
        let usage = self.usage.get_or_insert_with(Usage::default);
        if let Some(prompt) = prompt {
            usage.prompt_tokens = prompt;
        }
        if let Some(completion) = completion {
            usage.completion_tokens = completion;
        }
        usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_slots_are_sequential() {
        let mut state = DecoderState::default();
        assert_eq!(state.open_tool(1), 0);
        assert_eq!(state.open_tool(3), 1);
        assert_eq!(state.tool_slot(3), Some(1));
        assert_eq!(state.tool_slot(0), None);
        assert!(state.saw_tool_calls());
    }

    #[test]
    fn test_merge_usage() {
        let mut state = DecoderState::default();
        state.merge_usage(Some(10), None);
        state.merge_usage(None, Some(5));
        assert_eq!(state.usage, Some(Usage::new(10, 5)));
    }
}
