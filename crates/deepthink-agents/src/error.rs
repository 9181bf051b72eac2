//! Error types for the research agents

use deepthink_core::{CollaboratorError, FocusArea, SubjectId};
use deepthink_llm::LLMError;
use thiserror::Error;

/// Errors raised inside the agents before they are reported to the executor
#[derive(Debug, Error)]
pub enum AgentError {
    /// Language model call failed
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    /// Market data provider failed
    #[error("Market data error: {0}")]
    MarketData(String),

    /// HTTP request to a data provider failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Data provider refused the request because of its quota
    #[error("{0} rate limit exceeded")]
    RateLimited(String),

    /// Provider answered but the data is not usable
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Prompt template could not be rendered
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Model answer could not be interpreted
    #[error("Unusable model response: {0}")]
    UnusableResponse(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    pub fn fetch(self, subject: &SubjectId, focus: &FocusArea) -> CollaboratorError {
        CollaboratorError::Fetch {
            subject: subject.to_string(),
            focus: focus.clone(),
            message: self.to_string(),
        }
    }

    pub fn analysis(self, subject: &SubjectId, focus: &FocusArea) -> CollaboratorError {
        CollaboratorError::Analysis {
            subject: subject.to_string(),
            focus: focus.clone(),
            message: self.to_string(),
        }
    }

    pub fn summarization(self, subject: &SubjectId) -> CollaboratorError {
        CollaboratorError::Summarization {
            subject: subject.to_string(),
            message: self.to_string(),
        }
    }

    pub fn advice(self, subject: &SubjectId) -> CollaboratorError {
        CollaboratorError::Advice {
            subject: subject.to_string(),
            message: self.to_string(),
        }
    }
}
