//! unillm Core Library
//!
//! One chat-completion API over several vendor chat APIs. A request built
//! from the unified [`protocol`] types is translated by a vendor adapter, sent
//! through a [`http::Transport`] and answered with a normalized
//! [`protocol::Response`] or a [`stream::CompletionStream`] of chunks.
//!
//! ```no_run
//! use unillm_core::config::ProviderConfig;
//! use unillm_core::protocol::{CompletionRequest, Message};
//! use unillm_core::providers::{Provider, ProviderKind};
//!
//! # async fn run() -> Result<(), unillm_core::providers::ProviderError> {
//! let config = ProviderConfig::new(ProviderKind::OpenAI, "${OPENAI_API_KEY}");
//! let provider = Provider::from_config(&config)?;
//! let response = provider
//!     .chat(CompletionRequest::new("gpt-4o-mini", vec![Message::user("Hello!")]))
//!     .await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod stream;
pub mod tools;

pub use protocol::{
    CompletionRequest, FinishReason, Message, MessageRole, Response, StreamChunk, Tool, ToolCall,
    ToolChoice, Usage,
};
pub use providers::{Completion, Provider, ProviderError, ProviderKind, ProviderResult};
pub use tools::{execute_tool, execute_tools, ToolArgs, ToolRegistry};

/// Returns the version of the unillm Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
