//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// Trait for LLM providers
///
/// Implementations turn a [`CompletionRequest`] into generated text. The
/// agents hold providers as `Arc<dyn LLMProvider>`, so tests can plug in
/// scripted implementations.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Provider name used in logs (e.g. "openai")
    fn name(&self) -> &str;
}
