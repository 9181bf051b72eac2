//! Core abstractions for deepthink
//!
//! This crate defines the data model of an iterative research session and the
//! interfaces of the external collaborators that feed it:
//!
//! - [`Session`] / [`Iteration`]: the persisted state of one subject's research
//! - [`FocusArea`]: the closed set of research categories plus an ad-hoc fallback
//! - [`Fetcher`], [`Analyzer`], [`Summarizer`], [`FocusAdvisor`]: collaborator traits
//! - [`Error`] / [`CollaboratorError`]: the error taxonomy shared by all crates

pub mod collaborator;
pub mod error;
pub mod focus;
pub mod session;
pub mod subject;

pub use collaborator::{Analyzer, DataPayload, Fetcher, FocusAdvisor, Summarizer};
pub use error::{CollaboratorError, Error, Result};
pub use focus::{CustomFocus, FocusArea};
pub use session::{
    Action, AnalysisRecord, DataRef, FailureStage, FocusState, Iteration, IterationFailure,
    PlanningDecision, Sentiment, Session, SessionStatus,
};
pub use subject::SubjectId;
