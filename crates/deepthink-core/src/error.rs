//! Error types for deepthink

use crate::focus::FocusArea;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for deepthink-core
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the memory store, the decision policy and the cycle executor
#[derive(Error, Debug)]
pub enum Error {
    /// Persisted session exists but cannot be parsed into a valid session
    #[error("Corrupt session state for {subject}: {reason}")]
    CorruptState { subject: String, reason: String },

    /// Iteration index does not match the next free slot
    #[error("Iteration sequence violation: expected index {expected}, found {found}")]
    SequenceViolation { expected: usize, found: usize },

    /// Illegal session status transition
    #[error("Invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Decision policy preconditions violated
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Subject identifier rejected
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// Subject is already being processed by this executor
    #[error("Session for {0} is already running")]
    SessionBusy(String),

    /// Durable storage failed
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External collaborator failure that escaped containment
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl Error {
    /// Build a [`Error::CorruptState`] for a subject
    pub fn corrupt(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptState {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`Error::Storage`] from an I/O error and the path involved
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Failures reported by external collaborators
///
/// These never cross the cycle executor's loop boundary on their own; the
/// executor turns them into degraded iterations or a FAILED session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    /// Data fetch failed
    #[error("Fetch failed for {subject} ({focus}): {message}")]
    Fetch {
        subject: String,
        focus: FocusArea,
        message: String,
    },

    /// Analysis of fetched data failed
    #[error("Analysis failed for {subject} ({focus}): {message}")]
    Analysis {
        subject: String,
        focus: FocusArea,
        message: String,
    },

    /// Final summary generation failed
    #[error("Summarization failed for {subject}: {message}")]
    Summarization { subject: String, message: String },

    /// Adaptive focus suggestion failed
    #[error("Focus advice failed for {subject}: {message}")]
    Advice { subject: String, message: String },
}
