//! Errors raised by completion providers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

#[derive(Error, Debug)]
pub enum LLMError {
    /// Required provider setting is missing or malformed
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider rejected the API key")]
    AuthenticationFailed,

    #[error("Rate limited by provider: {0}")]
    RateLimitExceeded(String),

    #[error("Unknown model: {0}")]
    ModelNotFound(String),

    /// Any other non-success HTTP status
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered, but not with usable text
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}
