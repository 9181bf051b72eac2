//! Progress events emitted by the cycle executor

use async_trait::async_trait;
use deepthink_core::{FocusArea, Iteration, PlanningDecision, Session, SubjectId};

/// Receives executor progress; every callback defaults to a no-op
#[async_trait]
pub trait CycleEventHandler: Send + Sync {
    /// Called before the fetch of a new iteration
    async fn on_iteration_start(&self, _subject: &SubjectId, _index: usize, _focus: &FocusArea) {}

    /// Called once an iteration, degraded or not, has been persisted
    async fn on_iteration_recorded(&self, _subject: &SubjectId, _iteration: &Iteration) {}

    /// Called after a planning decision has been recorded
    async fn on_decision(&self, _subject: &SubjectId, _decision: &PlanningDecision) {}

    /// Called when a run ends in COMPLETE or FAILED
    async fn on_run_complete(&self, _session: &Session) {}
}

/// Handler that ignores every event
pub struct NoOpEventHandler;

#[async_trait]
impl CycleEventHandler for NoOpEventHandler {}
