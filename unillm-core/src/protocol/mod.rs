//! Protocol module for the unified chat-completion data model
//!
//! These structures are designed to be:
//! - Vendor-agnostic
//! - Shared by the blocking and streaming paths
//! - Type-safe and serializable

pub mod response;
pub mod types;

pub use response::{FinishReason, Response, SchemaValidator, StreamChunk, ToolCallDelta, Usage};
pub use types::{
    remove_additional_properties, CompletionOptions, CompletionRequest, ContentPart,
    MalformedToolArguments, Message, MessageContent, MessageRole, ResponseSchema, Tool, ToolCall,
    ToolChoice,
};

// Re-export common traits for convenience
pub use types::{IntoMessage, MessageBuilder};
