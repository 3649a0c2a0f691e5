//! Vendor adapters and the provider facade
//!
//! Each vendor module translates the unified data model to and from one wire
//! format. [`Provider`] combines an adapter with a transport and is the entry
//! point callers use.

pub mod adapter;
pub mod anthropic;
pub mod client;
pub mod error;
pub mod google;
pub mod openai;
pub mod openrouter;
pub mod preflight;
pub mod responses;

pub use adapter::{Adapter, Capability, ProviderCapabilities, ProviderKind};
pub use client::{Completion, Provider};
pub use error::{ProviderError, ProviderResult};

// Re-export concrete adapters
pub use anthropic::ClaudeAdapter;
pub use google::GoogleAdapter;
pub use openai::OpenAIAdapter;
pub use openrouter::OpenRouterAdapter;
pub use responses::ResponsesAdapter;
