//! Session and iteration records
//!
//! A [`Session`] is the complete research state of one subject. It is treated
//! as a value: the memory store takes a session and hands back an updated
//! copy, and the cycle executor only ever holds the latest value.

use crate::focus::FocusArea;
use crate::subject::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Research in progress
    Active,
    /// Finalized with a summary (terminal)
    Complete,
    /// Stopped by an unrecoverable collaborator failure (terminal)
    Failed,
}

impl SessionStatus {
    /// COMPLETE and FAILED have no outgoing transitions except reset
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "ACTIVE",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Overall tone of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        };
        f.write_str(name)
    }
}

/// Outcome of a planning step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Run another iteration
    Continue,
    /// Stop and produce the final summary
    Summarize,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => f.write_str("CONTINUE"),
            Self::Summarize => f.write_str("SUMMARIZE"),
        }
    }
}

/// Focus bookkeeping for a session
///
/// Both lists are duplicate-free. `required_focuses` is kept in priority
/// order; `completed_focuses` in the order the areas were completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusState {
    pub current_focus: FocusArea,
    pub required_focuses: Vec<FocusArea>,
    pub completed_focuses: Vec<FocusArea>,
}

impl FocusState {
    /// Fresh focus state positioned on the first required area
    pub fn new(required: Vec<FocusArea>) -> Self {
        let mut required_focuses: Vec<FocusArea> = Vec::with_capacity(required.len());
        for focus in required {
            if !required_focuses.contains(&focus) {
                required_focuses.push(focus);
            }
        }
        let current_focus = required_focuses
            .first()
            .cloned()
            .unwrap_or(FocusArea::FinancialPerformance);

        Self {
            current_focus,
            required_focuses,
            completed_focuses: Vec::new(),
        }
    }

    /// Whether `focus` has been marked completed
    pub fn is_completed(&self, focus: &FocusArea) -> bool {
        self.completed_focuses.contains(focus)
    }

    /// Required areas not yet completed, in priority order
    pub fn uncovered(&self) -> impl Iterator<Item = &FocusArea> {
        self.required_focuses
            .iter()
            .filter(|focus| !self.completed_focuses.contains(focus))
    }

    /// `|completed ∩ required| / |required| * 100`, clamped to [0, 100]
    pub fn completion_pct(&self) -> f64 {
        if self.required_focuses.is_empty() {
            return 0.0;
        }
        let covered = self
            .required_focuses
            .iter()
            .filter(|focus| self.completed_focuses.contains(focus))
            .count();
        (covered as f64 / self.required_focuses.len() as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Reference to the data an iteration was based on
///
/// Payloads are not embedded; only a source tag, a bounded preview and the
/// payload size are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRef {
    pub source: String,
    pub preview: String,
    pub size_bytes: usize,
}

impl DataRef {
    /// Reference recorded when no data could be fetched
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.size_bytes == 0
    }
}

/// Structured result of analyzing one focus area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Key points, most important first
    pub insights: Vec<String>,
    pub sentiment: Sentiment,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Full analysis text, when the analyzer produced one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub narrative: String,
}

impl AnalysisRecord {
    /// Create a record, clamping confidence into [0, 1]
    pub fn new(insights: Vec<String>, sentiment: Sentiment, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            insights,
            sentiment,
            confidence,
            narrative: String::new(),
        }
    }

    /// Attach the full analysis text
    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = narrative.into();
        self
    }

    /// Placeholder used when fetching or analysis failed
    pub fn degraded() -> Self {
        Self::new(Vec::new(), Sentiment::Neutral, 0.0)
    }
}

/// Decision taken after an iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningDecision {
    pub action: Action,
    pub next_focus: Option<FocusArea>,
    pub reasoning: String,
}

impl PlanningDecision {
    pub fn continue_with(next_focus: FocusArea, reasoning: impl Into<String>) -> Self {
        Self {
            action: Action::Continue,
            next_focus: Some(next_focus),
            reasoning: reasoning.into(),
        }
    }

    pub fn summarize(reasoning: impl Into<String>) -> Self {
        Self {
            action: Action::Summarize,
            next_focus: None,
            reasoning: reasoning.into(),
        }
    }

    pub fn is_summarize(&self) -> bool {
        self.action == Action::Summarize
    }
}

/// Stage at which a degraded iteration failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Fetch,
    Analysis,
}

/// Collaborator failure recorded on a degraded iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationFailure {
    pub stage: FailureStage,
    pub message: String,
}

/// One fetch → analyze → decide pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// Position in the session, starting at 0
    pub index: usize,
    pub focus: FocusArea,
    pub fetched_data_ref: DataRef,
    pub analysis_record: AnalysisRecord,
    /// Filled once the decision policy has run for this iteration
    pub planning_decision: Option<PlanningDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<IterationFailure>,
    pub timestamp: DateTime<Utc>,
}

impl Iteration {
    /// Iteration with fetched data and a completed analysis
    pub fn new(
        index: usize,
        focus: FocusArea,
        fetched_data_ref: DataRef,
        analysis_record: AnalysisRecord,
    ) -> Self {
        Self {
            index,
            focus,
            fetched_data_ref,
            analysis_record,
            planning_decision: None,
            failure: None,
            timestamp: Utc::now(),
        }
    }

    /// Iteration recorded after a collaborator failure
    pub fn degraded(
        index: usize,
        focus: FocusArea,
        fetched_data_ref: DataRef,
        stage: FailureStage,
        message: impl Into<String>,
    ) -> Self {
        Self {
            failure: Some(IterationFailure {
                stage,
                message: message.into(),
            }),
            ..Self::new(index, focus, fetched_data_ref, AnalysisRecord::degraded())
        }
    }

    /// Whether the fetch stage failed for this iteration
    pub fn fetch_failed(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|failure| failure.stage == FailureStage::Fetch)
    }

    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

/// Research state of one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub subject_id: SubjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Append-only; `iterations[i].index == i`
    pub iterations: Vec<Iteration>,
    pub focus_state: FocusState,
    /// Derived from `focus_state`, kept for inspection of the persisted form
    pub completion_pct: f64,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Session {
    /// Fresh ACTIVE session with no iterations
    pub fn new(subject_id: SubjectId, required_focuses: Vec<FocusArea>) -> Self {
        let now = Utc::now();
        let focus_state = FocusState::new(required_focuses);
        Self {
            subject_id,
            created_at: now,
            updated_at: now,
            iterations: Vec::new(),
            completion_pct: focus_state.completion_pct(),
            focus_state,
            status: SessionStatus::Active,
            failure_reason: None,
        }
    }

    /// Index the next appended iteration must carry
    pub fn next_index(&self) -> usize {
        self.iterations.len()
    }

    pub fn latest_iteration(&self) -> Option<&Iteration> {
        self.iterations.last()
    }

    /// Last iteration still waiting for its planning decision
    pub fn pending_iteration(&self) -> Option<&Iteration> {
        self.iterations
            .last()
            .filter(|iteration| iteration.planning_decision.is_none())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
