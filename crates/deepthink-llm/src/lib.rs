//! Text completion client for deepthink
//!
//! The research agents only need plain prompt-in, text-out completions. This
//! crate provides:
//!
//! - [`Message`] / [`Role`]: chat messages with text content
//! - [`CompletionRequest`] / [`CompletionResponse`]: request and response types
//! - [`LLMProvider`]: the provider trait the agents are written against
//! - [`providers::OpenAIProvider`]: an OpenAI-compatible chat completions backend

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
