//! The memory store

use crate::backend::{FileBackend, InMemoryBackend, SessionBackend, write_atomic};
use crate::config::SessionDefaults;
use crate::schema;
use chrono::{DateTime, Utc};
use deepthink_core::{
    Error, FocusArea, Iteration, PlanningDecision, Result, Session, SessionStatus, SubjectId,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owner of session state and its persisted form
///
/// Transition methods (`append_iteration`, `finalize`, ...) are pure: they
/// consume a session and return the updated value with `updated_at`
/// refreshed. Only `persist`, `reset` and `export` touch storage.
#[derive(Clone)]
pub struct MemoryStore {
    backend: Arc<dyn SessionBackend>,
    defaults: SessionDefaults,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new(backend: Arc<dyn SessionBackend>, defaults: SessionDefaults) -> Self {
        Self { backend, defaults }
    }

    /// File-backed store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>, defaults: SessionDefaults) -> Result<Self> {
        let backend = FileBackend::open(dir).await?;
        Ok(Self::new(Arc::new(backend), defaults))
    }

    /// Store that keeps everything in process memory
    pub fn in_memory(defaults: SessionDefaults) -> Self {
        Self::new(Arc::new(InMemoryBackend::new()), defaults)
    }

    pub fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    /// Fresh ACTIVE session built from the configured defaults
    pub fn fresh(&self, subject: &SubjectId) -> Session {
        Session::new(subject.clone(), self.defaults.required_focuses.clone())
    }

    /// Load the persisted session of `subject`, or a fresh one if none exists
    ///
    /// A fresh session is not written until [`MemoryStore::persist`] is called.
    pub async fn load(&self, subject: &SubjectId) -> Result<Session> {
        match self.backend.load_raw(subject).await? {
            Some(bytes) => {
                let session = schema::decode(subject, &bytes)?;
                debug!(
                    subject = %subject,
                    iterations = session.iterations.len(),
                    status = %session.status,
                    "Loaded session"
                );
                Ok(session)
            }
            None => {
                debug!(subject = %subject, "No stored session, starting fresh");
                Ok(self.fresh(subject))
            }
        }
    }

    /// Append `iteration`, which must carry the next free index
    pub fn append_iteration(&self, mut session: Session, iteration: Iteration) -> Result<Session> {
        ensure_active(&session, "append iteration")?;

        let expected = session.next_index();
        if iteration.index != expected {
            return Err(Error::SequenceViolation {
                expected,
                found: iteration.index,
            });
        }

        session.iterations.push(iteration);
        Ok(touch(session))
    }

    /// Mark `focus` as completed and recompute the completion percentage
    ///
    /// Completing an area twice is a no-op.
    pub fn mark_focus_completed(&self, mut session: Session, focus: &FocusArea) -> Result<Session> {
        ensure_active(&session, "complete focus")?;

        if !session.focus_state.is_completed(focus) {
            session.focus_state.completed_focuses.push(focus.clone());
        }
        session.completion_pct = session.focus_state.completion_pct();
        Ok(touch(session))
    }

    /// Fill the planning decision slot of the latest iteration
    pub fn record_decision(
        &self,
        mut session: Session,
        decision: PlanningDecision,
    ) -> Result<Session> {
        ensure_active(&session, "record decision")?;

        let Some(latest) = session.iterations.last_mut() else {
            return Err(Error::InvalidSessionState(
                "cannot record a decision before the first iteration".to_string(),
            ));
        };
        if let Some(existing) = &latest.planning_decision {
            return Err(Error::InvalidSessionState(format!(
                "iteration {} already decided {}",
                latest.index, existing.action
            )));
        }

        latest.planning_decision = Some(decision);
        Ok(touch(session))
    }

    pub fn set_current_focus(&self, mut session: Session, focus: FocusArea) -> Result<Session> {
        ensure_active(&session, "change focus")?;
        session.focus_state.current_focus = focus;
        Ok(touch(session))
    }

    /// ACTIVE → COMPLETE
    ///
    /// The latest iteration must already carry a SUMMARIZE decision.
    pub fn finalize(&self, mut session: Session) -> Result<Session> {
        if session.is_terminal() {
            return Err(Error::InvalidTransition {
                from: session.status.to_string(),
                to: SessionStatus::Complete.to_string(),
                reason: "session is already terminal".to_string(),
            });
        }

        let summarized = session
            .latest_iteration()
            .and_then(|iteration| iteration.planning_decision.as_ref())
            .is_some_and(PlanningDecision::is_summarize);
        if !summarized {
            return Err(Error::InvalidTransition {
                from: session.status.to_string(),
                to: SessionStatus::Complete.to_string(),
                reason: "latest iteration has no SUMMARIZE decision".to_string(),
            });
        }

        session.status = SessionStatus::Complete;
        info!(subject = %session.subject_id, iterations = session.iterations.len(), "Session finalized");
        Ok(touch(session))
    }

    /// ACTIVE → FAILED, keeping the partial history
    pub fn mark_failed(&self, mut session: Session, reason: impl Into<String>) -> Result<Session> {
        if session.is_terminal() {
            return Err(Error::InvalidTransition {
                from: session.status.to_string(),
                to: SessionStatus::Failed.to_string(),
                reason: "session is already terminal".to_string(),
            });
        }

        let reason = reason.into();
        warn!(subject = %session.subject_id, reason = %reason, "Session marked failed");
        session.status = SessionStatus::Failed;
        session.failure_reason = Some(reason);
        Ok(touch(session))
    }

    /// Write the session durably
    pub async fn persist(&self, session: &Session) -> Result<()> {
        let bytes = schema::encode(session)?;
        self.backend.store_raw(&session.subject_id, &bytes).await?;
        debug!(
            subject = %session.subject_id,
            location = %self.backend.location(&session.subject_id),
            iterations = session.iterations.len(),
            "Session persisted"
        );
        Ok(())
    }

    /// Discard any stored session and return a fresh one
    pub async fn reset(&self, subject: &SubjectId) -> Result<Session> {
        let existed = self.backend.remove(subject).await?;
        info!(subject = %subject, existed, "Session reset");
        Ok(self.fresh(subject))
    }

    /// Copy the stored session document of `subject` to `path`
    ///
    /// The document is validated first, so a corrupt record is never exported.
    pub async fn export(&self, subject: &SubjectId, path: &Path) -> Result<PathBuf> {
        let Some(bytes) = self.backend.load_raw(subject).await? else {
            return Err(Error::InvalidSessionState(format!(
                "no stored session for {subject}"
            )));
        };
        let session = schema::decode(subject, &bytes)?;

        write_atomic(path, &schema::encode(&session)?).await?;
        info!(subject = %subject, path = %path.display(), "Session exported");
        Ok(path.to_path_buf())
    }
}

/// `<SUBJECT>_memory_<YYYYmmdd_HHMMSS>.json`
pub fn export_file_name(subject: &SubjectId, at: DateTime<Utc>) -> String {
    format!("{subject}_memory_{}.json", at.format("%Y%m%d_%H%M%S"))
}

fn ensure_active(session: &Session, action: &str) -> Result<()> {
    if session.is_terminal() {
        return Err(Error::InvalidTransition {
            from: session.status.to_string(),
            to: SessionStatus::Active.to_string(),
            reason: format!("cannot {action} on a terminal session"),
        });
    }
    Ok(())
}

fn touch(mut session: Session) -> Session {
    session.updated_at = Utc::now().max(session.updated_at);
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepthink_core::{AnalysisRecord, DataRef, Sentiment};

    fn subject() -> SubjectId {
        SubjectId::new("NVDA").unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::in_memory(SessionDefaults::new(vec![
            FocusArea::FinancialPerformance,
            FocusArea::RiskAssessment,
        ]))
    }

    fn iteration(index: usize, focus: FocusArea, confidence: f64) -> Iteration {
        Iteration::new(
            index,
            focus,
            DataRef::empty(),
            AnalysisRecord::new(vec![], Sentiment::Neutral, confidence),
        )
    }

    #[tokio::test]
    async fn test_load_missing_returns_fresh() {
        let store = store();
        let session = store.load(&subject()).await.unwrap();

        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.iterations.is_empty());
        assert_eq!(
            session.focus_state.required_focuses,
            vec![FocusArea::FinancialPerformance, FocusArea::RiskAssessment]
        );
    }

    #[test]
    fn test_append_enforces_sequence() {
        let store = store();
        let session = store.fresh(&subject());

        let session = store
            .append_iteration(session, iteration(0, FocusArea::FinancialPerformance, 0.8))
            .unwrap();
        let err = store
            .append_iteration(session.clone(), iteration(2, FocusArea::RiskAssessment, 0.8))
            .unwrap_err();

        assert!(matches!(
            err,
            Error::SequenceViolation {
                expected: 1,
                found: 2
            }
        ));
        assert_eq!(session.iterations.len(), 1);
    }

    #[test]
    fn test_indices_stay_dense() {
        let store = store();
        let mut session = store.fresh(&subject());
        for index in 0..6 {
            session = store
                .append_iteration(session, iteration(index, FocusArea::Valuation, 0.5))
                .unwrap();
            session = store
                .record_decision(session, PlanningDecision::continue_with(FocusArea::Valuation, "x"))
                .unwrap();
        }
        assert!(session.iterations.iter().enumerate().all(|(i, it)| it.index == i));
    }

    #[test]
    fn test_completion_pct_monotonic() {
        let store = store();
        let mut session = store.fresh(&subject());
        let mut last = session.completion_pct;

        for focus in [
            FocusArea::custom("esg"),
            FocusArea::RiskAssessment,
            FocusArea::RiskAssessment,
            FocusArea::FinancialPerformance,
        ] {
            session = store.mark_focus_completed(session, &focus).unwrap();
            assert!(session.completion_pct >= last);
            last = session.completion_pct;
        }

        assert!((session.completion_pct - 100.0).abs() < f64::EPSILON);
        assert_eq!(session.focus_state.completed_focuses.len(), 3);
    }

    #[test]
    fn test_record_decision_once() {
        let store = store();
        let session = store.fresh(&subject());
        assert!(matches!(
            store.record_decision(session.clone(), PlanningDecision::summarize("done")),
            Err(Error::InvalidSessionState(_))
        ));

        let session = store
            .append_iteration(session, iteration(0, FocusArea::FinancialPerformance, 0.9))
            .unwrap();
        let session = store
            .record_decision(session, PlanningDecision::summarize("done"))
            .unwrap();
        assert!(
            store
                .record_decision(session, PlanningDecision::summarize("again"))
                .is_err()
        );
    }

    #[test]
    fn test_finalize_transitions() {
        let store = store();
        let session = store.fresh(&subject());
        let session = store
            .append_iteration(session, iteration(0, FocusArea::FinancialPerformance, 0.9))
            .unwrap();

        // pending decision
        assert!(matches!(
            store.finalize(session.clone()),
            Err(Error::InvalidTransition { .. })
        ));

        let session = store
            .record_decision(session, PlanningDecision::summarize("max iterations reached"))
            .unwrap();
        let complete = store.finalize(session).unwrap();
        assert_eq!(complete.status, SessionStatus::Complete);

        let err = store.finalize(complete.clone()).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { ref from, .. } if from == "COMPLETE"));
        assert!(store.mark_failed(complete.clone(), "late").is_err());
        assert!(
            store
                .append_iteration(complete, iteration(1, FocusArea::Valuation, 0.9))
                .is_err()
        );
    }

    #[test]
    fn test_mark_failed_keeps_history() {
        let store = store();
        let session = store.fresh(&subject());
        let session = store
            .append_iteration(session, iteration(0, FocusArea::FinancialPerformance, 0.0))
            .unwrap();

        let failed = store.mark_failed(session, "fetch failed twice").unwrap();

        assert_eq!(failed.status, SessionStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("fetch failed twice"));
        assert_eq!(failed.iterations.len(), 1);
        assert!(store.finalize(failed).is_err());
    }

    #[tokio::test]
    async fn test_persist_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path(), SessionDefaults::default())
            .await
            .unwrap();

        let mut session = store.fresh(&subject());
        session = store
            .append_iteration(session, iteration(0, FocusArea::FinancialPerformance, 0.75))
            .unwrap();
        session = store
            .mark_focus_completed(session, &FocusArea::FinancialPerformance)
            .unwrap();
        session = store
            .record_decision(
                session,
                PlanningDecision::continue_with(
                    FocusArea::CompetitiveAnalysis,
                    "required focus area not yet covered",
                ),
            )
            .unwrap();
        session = store
            .set_current_focus(session, FocusArea::CompetitiveAnalysis)
            .unwrap();
        store.persist(&session).await.unwrap();

        let reopened = MemoryStore::open(dir.path(), SessionDefaults::default())
            .await
            .unwrap();
        assert_eq!(reopened.load(&subject()).await.unwrap(), session);
    }

    #[tokio::test]
    async fn test_load_corrupt_is_surfaced() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.insert_raw(&subject(), "{\"schema_version\":1}").await;
        let store = MemoryStore::new(backend.clone(), SessionDefaults::default());

        let err = store.load(&subject()).await.unwrap_err();
        assert!(matches!(err, Error::CorruptState { .. }));
        // nothing discarded
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_reset_discards_state() {
        let store = store();
        let session = store
            .append_iteration(
                store.fresh(&subject()),
                iteration(0, FocusArea::FinancialPerformance, 0.2),
            )
            .unwrap();
        let session = store.mark_failed(session, "boom").unwrap();
        store.persist(&session).await.unwrap();

        let fresh = store.reset(&subject()).await.unwrap();
        assert_eq!(fresh.status, SessionStatus::Active);
        assert!(fresh.iterations.is_empty());

        let loaded = store.load(&subject()).await.unwrap();
        assert!(loaded.iterations.is_empty());
    }

    #[tokio::test]
    async fn test_export_copies_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store();
        let session = store.fresh(&subject());
        store.persist(&session).await.unwrap();

        let target = dir.path().join("exports").join("nvda.json");
        let written = store.export(&subject(), &target).await.unwrap();
        assert_eq!(written, target);

        let bytes = std::fs::read(&target).unwrap();
        assert_eq!(schema::decode(&subject(), &bytes).unwrap(), session);

        let missing = SubjectId::new("NONE").unwrap();
        assert!(store.export(&missing, &target).await.is_err());
    }

    #[test]
    fn test_export_file_name() {
        let at = DateTime::parse_from_rfc3339("2024-03-05T07:08:09Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            export_file_name(&subject(), at),
            "NVDA_memory_20240305_070809.json"
        );
    }
}
