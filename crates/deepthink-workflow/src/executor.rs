//! Cycle executor
//!
//! Drives one research run for a subject:
//! 1. Load (or create) the session from the memory store
//! 2. Fetch data and analyze it for the current focus
//! 3. Append the iteration and persist
//! 4. Ask the decision policy for the next step, record it and persist
//! 5. Loop until the policy says SUMMARIZE, then summarize and finalize
//!
//! Collaborator failures never escape the loop: they turn into degraded
//! iterations, a fallback summary, or a FAILED session. Memory store and policy
//! errors are propagated unchanged.

use crate::events::CycleEventHandler;
use crate::fallback::fallback_summary;
use deepthink_core::{
    Analyzer, DataRef, Error, FailureStage, Fetcher, FocusAdvisor, FocusArea, Iteration, Result,
    Session, SessionStatus, SubjectId, Summarizer,
};
use deepthink_memory::MemoryStore;
use deepthink_policy::DecisionPolicy;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalResult {
    pub session: Session,
    /// Markdown summary; `None` when the run ended FAILED or the session was
    /// already terminal
    pub summary_text: Option<String>,
}

impl FinalResult {
    pub fn is_complete(&self) -> bool {
        self.session.status == SessionStatus::Complete
    }
}

/// Runs the fetch, analyze and decide loop for subjects
pub struct CycleExecutor {
    store: MemoryStore,
    policy: DecisionPolicy,
    fetcher: Arc<dyn Fetcher>,
    analyzer: Arc<dyn Analyzer>,
    summarizer: Arc<dyn Summarizer>,
    advisor: Option<Arc<dyn FocusAdvisor>>,
    event_handler: Option<Arc<dyn CycleEventHandler>>,
    active: Mutex<HashSet<SubjectId>>,
}

impl std::fmt::Debug for CycleExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleExecutor")
            .field("store", &self.store)
            .field("policy", &self.policy)
            .field("advisor", &self.advisor.is_some())
            .finish_non_exhaustive()
    }
}

impl CycleExecutor {
    pub fn new(
        store: MemoryStore,
        policy: DecisionPolicy,
        fetcher: Arc<dyn Fetcher>,
        analyzer: Arc<dyn Analyzer>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            store,
            policy,
            fetcher,
            analyzer,
            summarizer,
            advisor: None,
            event_handler: None,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Consult `advisor` when the latest analysis leaves open questions
    pub fn with_advisor(mut self, advisor: Arc<dyn FocusAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Set the event handler for receiving progress events
    pub fn with_event_handler(mut self, handler: Arc<dyn CycleEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Run `subject` until it is summarized, fails, or hits `max_iterations`
    ///
    /// A session left ACTIVE by an earlier run resumes where it stopped. A
    /// COMPLETE or FAILED session is returned unchanged without a summary.
    pub async fn run(&self, subject: &SubjectId, max_iterations: usize) -> Result<FinalResult> {
        if max_iterations == 0 {
            return Err(Error::InvalidSessionState(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        let _claim = self.claim(subject)?;
        let mut session = self.store.load(subject).await?;

        if session.is_terminal() {
            warn!(
                subject = %subject,
                status = %session.status,
                "Session is terminal, reset it to run again"
            );
            return Ok(FinalResult {
                session,
                summary_text: None,
            });
        }

        info!(
            subject = %subject,
            iterations = session.iterations.len(),
            max_iterations,
            "Run started"
        );

        // a crash between append and decision leaves the last slot empty
        if session.pending_iteration().is_some() {
            debug!(subject = %subject, "Re-deciding pending iteration");
            session = self.plan(session, max_iterations).await?;
        }

        while !summarize_requested(&session) {
            let focus = session.focus_state.current_focus.clone();
            let index = session.next_index();
            self.emit_start(subject, index, &focus).await;

            let iteration = match self.fetcher.fetch(subject, &focus).await {
                Ok(payload) => {
                    let data_ref = payload.to_data_ref();
                    match self.analyzer.analyze(&payload, &focus, subject).await {
                        Ok(record) => Iteration::new(index, focus.clone(), data_ref, record),
                        Err(e) => {
                            warn!(
                                subject = %subject,
                                iteration = index,
                                focus = %focus,
                                error = %e,
                                "Analysis failed"
                            );
                            Iteration::degraded(
                                index,
                                focus.clone(),
                                data_ref,
                                FailureStage::Analysis,
                                e.to_string(),
                            )
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        subject = %subject,
                        iteration = index,
                        focus = %focus,
                        error = %e,
                        "Fetch failed"
                    );
                    Iteration::degraded(
                        index,
                        focus.clone(),
                        DataRef::empty(),
                        FailureStage::Fetch,
                        e.to_string(),
                    )
                }
            };

            let repeated_fetch_failure = iteration.fetch_failed()
                && session
                    .latest_iteration()
                    .is_some_and(|prev| prev.fetch_failed() && prev.focus == focus);
            let confidence = iteration.analysis_record.confidence;
            let degraded = iteration.is_degraded();

            session = self.store.append_iteration(session, iteration)?;
            if !degraded && confidence >= self.policy.config().confidence_threshold {
                session = self.store.mark_focus_completed(session, &focus)?;
            }
            self.store.persist(&session).await?;

            info!(
                subject = %subject,
                iteration = index,
                focus = %focus,
                confidence,
                completion_pct = session.completion_pct,
                "Iteration recorded"
            );
            if let (Some(handler), Some(recorded)) =
                (&self.event_handler, session.latest_iteration())
            {
                handler.on_iteration_recorded(subject, recorded).await;
            }

            if repeated_fetch_failure {
                session = self
                    .store
                    .mark_failed(session, format!("fetch failed twice in a row for {focus}"))?;
                self.store.persist(&session).await?;
                self.emit_complete(&session).await;
                return Ok(FinalResult {
                    session,
                    summary_text: None,
                });
            }

            session = self.plan(session, max_iterations).await?;
        }

        let summary = match self.summarizer.summarize(&session.iterations, subject).await {
            Ok(text) => text,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Summarizer failed, using fallback summary");
                fallback_summary(subject, &session.iterations, &e.to_string())
            }
        };

        session = self.store.finalize(session)?;
        self.store.persist(&session).await?;
        info!(
            subject = %subject,
            iterations = session.iterations.len(),
            completion_pct = session.completion_pct,
            "Run complete"
        );
        self.emit_complete(&session).await;

        Ok(FinalResult {
            session,
            summary_text: Some(summary),
        })
    }

    /// Run independent subjects concurrently
    ///
    /// Results come back in input order. A subject listed twice, or already
    /// running on this executor, is rejected with [`Error::SessionBusy`].
    pub async fn run_many(
        &self,
        subjects: &[SubjectId],
        max_iterations: usize,
    ) -> Vec<(SubjectId, Result<FinalResult>)> {
        let mut seen = HashSet::new();
        let runs = subjects.iter().map(|subject| {
            let duplicate = !seen.insert(subject.clone());
            async move {
                let result = if duplicate {
                    Err(Error::SessionBusy(subject.to_string()))
                } else {
                    self.run(subject, max_iterations).await
                };
                (subject.clone(), result)
            }
        });
        join_all(runs).await
    }

    /// Decide the next step for the latest iteration, record it and persist
    async fn plan(&self, session: Session, max_iterations: usize) -> Result<Session> {
        let latest = session
            .latest_iteration()
            .map(|it| it.analysis_record.clone())
            .ok_or_else(|| {
                Error::InvalidSessionState("cannot plan before the first iteration".to_string())
            })?;

        let decision = self
            .policy
            .decide(&session, &latest, max_iterations, self.advisor.as_deref())
            .await?;
        let next_focus = decision.next_focus.clone();

        let mut session = self.store.record_decision(session, decision)?;
        if let Some(focus) = next_focus {
            session = self.store.set_current_focus(session, focus)?;
        }
        self.store.persist(&session).await?;

        if let Some(handler) = &self.event_handler {
            let decision = session
                .latest_iteration()
                .and_then(|it| it.planning_decision.as_ref());
            if let Some(decision) = decision {
                handler.on_decision(&session.subject_id, decision).await;
            }
        }
        Ok(session)
    }

    fn claim(&self, subject: &SubjectId) -> Result<RunClaim<'_>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(subject.clone()) {
            return Err(Error::SessionBusy(subject.to_string()));
        }
        Ok(RunClaim {
            active: &self.active,
            subject: subject.clone(),
        })
    }

    async fn emit_start(&self, subject: &SubjectId, index: usize, focus: &FocusArea) {
        if let Some(handler) = &self.event_handler {
            handler.on_iteration_start(subject, index, focus).await;
        }
    }

    async fn emit_complete(&self, session: &Session) {
        if let Some(handler) = &self.event_handler {
            handler.on_run_complete(session).await;
        }
    }
}

fn summarize_requested(session: &Session) -> bool {
    session
        .latest_iteration()
        .and_then(|it| it.planning_decision.as_ref())
        .is_some_and(|decision| decision.is_summarize())
}

/// Marks a subject as running until dropped
struct RunClaim<'a> {
    active: &'a Mutex<HashSet<SubjectId>>,
    subject: SubjectId,
}

impl Drop for RunClaim<'_> {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.subject);
    }
}
