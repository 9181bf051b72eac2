//! Continue-or-summarize rules

use crate::config::PolicyConfig;
use crate::uncertainty::{KeywordUncertainty, UncertaintySignal};
use deepthink_core::{
    AnalysisRecord, Error, FocusAdvisor, FocusArea, PlanningDecision, Result, Session,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reasoning strings attached to planning decisions
pub mod reasoning {
    pub const MAX_ITERATIONS: &str = "max iterations reached";
    pub const REQUIRED_UNCOVERED: &str = "required focus area not yet covered";
    pub const LOW_CONFIDENCE: &str = "confidence below threshold";
    pub const OPEN_QUESTIONS: &str = "open questions remain in latest analysis";
    pub const COVERED: &str = "all required areas covered with sufficient confidence";
}

/// Outcome of the deterministic rule evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Run another iteration on `next_focus`
    Continue {
        next_focus: FocusArea,
        reasoning: String,
    },
    /// Stop and summarize
    Summarize { reasoning: String },
    /// Open questions remain; the next focus is chosen outside the rules
    Explore,
}

/// The decision policy
///
/// Rules, first match wins:
/// 1. iteration count reached the cap: summarize
/// 2. a required focus is not covered: continue with the first one in priority order
/// 3. latest confidence below the threshold: re-examine the latest focus
/// 4. the latest analysis flags open questions: explore
/// 5. otherwise summarize
#[derive(Clone)]
pub struct DecisionPolicy {
    config: PolicyConfig,
    uncertainty: Arc<dyn UncertaintySignal>,
}

impl std::fmt::Debug for DecisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

impl DecisionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            uncertainty: Arc::new(KeywordUncertainty::default()),
        }
    }

    /// Replace the open-question detector
    pub fn with_uncertainty(mut self, signal: Arc<dyn UncertaintySignal>) -> Self {
        self.uncertainty = signal;
        self
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Apply the rules to `session` after its latest iteration
    ///
    /// `max_iterations` is the cap of the current run. Identical inputs always
    /// produce the same verdict.
    pub fn evaluate(
        &self,
        session: &Session,
        latest: &AnalysisRecord,
        max_iterations: usize,
    ) -> Result<Verdict> {
        if max_iterations == 0 {
            return Err(Error::InvalidSessionState(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if session.focus_state.required_focuses.is_empty() {
            return Err(Error::InvalidSessionState(format!(
                "session {} has no required focus areas",
                session.subject_id
            )));
        }

        if session.iterations.len() >= max_iterations {
            return Ok(Verdict::Summarize {
                reasoning: reasoning::MAX_ITERATIONS.to_string(),
            });
        }

        if let Some(next_focus) = session.focus_state.uncovered().next() {
            return Ok(Verdict::Continue {
                next_focus: next_focus.clone(),
                reasoning: reasoning::REQUIRED_UNCOVERED.to_string(),
            });
        }

        if latest.confidence < self.config.confidence_threshold {
            return Ok(Verdict::Continue {
                next_focus: latest_focus(session),
                reasoning: reasoning::LOW_CONFIDENCE.to_string(),
            });
        }

        if self.uncertainty.has_open_questions(latest) {
            return Ok(Verdict::Explore);
        }

        Ok(Verdict::Summarize {
            reasoning: reasoning::COVERED.to_string(),
        })
    }

    /// Evaluate the rules and resolve an [`Verdict::Explore`] outcome
    ///
    /// The advisor is asked for the next focus when open questions remain.
    /// Without an advisor, or when it fails, the first exploration focus not
    /// yet completed is used, falling back to the latest focus.
    pub async fn decide(
        &self,
        session: &Session,
        latest: &AnalysisRecord,
        max_iterations: usize,
        advisor: Option<&dyn FocusAdvisor>,
    ) -> Result<PlanningDecision> {
        let decision = match self.evaluate(session, latest, max_iterations)? {
            Verdict::Summarize { reasoning } => PlanningDecision::summarize(reasoning),
            Verdict::Continue {
                next_focus,
                reasoning,
            } => PlanningDecision::continue_with(next_focus, reasoning),
            Verdict::Explore => {
                let next_focus = match advisor {
                    Some(advisor) => match advisor.suggest_focus(session).await {
                        Ok(focus) => {
                            debug!(
                                subject = %session.subject_id,
                                advisor = advisor.name(),
                                focus = %focus,
                                "Advisor suggested focus"
                            );
                            focus
                        }
                        Err(e) => {
                            warn!(
                                subject = %session.subject_id,
                                advisor = advisor.name(),
                                error = %e,
                                "Focus advisor failed, using exploration fallback"
                            );
                            self.exploration_fallback(session)
                        }
                    },
                    None => self.exploration_fallback(session),
                };
                PlanningDecision::continue_with(next_focus, reasoning::OPEN_QUESTIONS)
            }
        };

        info!(
            subject = %session.subject_id,
            iteration = session.iterations.len().saturating_sub(1),
            action = %decision.action,
            next_focus = ?decision.next_focus.as_ref().map(FocusArea::as_str),
            reasoning = %decision.reasoning,
            "Planning decision"
        );

        Ok(decision)
    }

    /// Deterministic focus used when open questions remain
    pub fn exploration_fallback(&self, session: &Session) -> FocusArea {
        self.config
            .exploration_focuses
            .iter()
            .find(|focus| !session.focus_state.is_completed(focus))
            .cloned()
            .unwrap_or_else(|| latest_focus(session))
    }
}

fn latest_focus(session: &Session) -> FocusArea {
    session
        .latest_iteration()
        .map_or_else(|| session.focus_state.current_focus.clone(), |it| it.focus.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepthink_core::{
        Action, CollaboratorError, DataRef, Iteration, Sentiment, SubjectId,
    };

    const A: FocusArea = FocusArea::FinancialPerformance;
    const B: FocusArea = FocusArea::RiskAssessment;

    fn session(required: Vec<FocusArea>) -> Session {
        Session::new(SubjectId::new("AAPL").unwrap(), required)
    }

    fn record(confidence: f64) -> AnalysisRecord {
        AnalysisRecord::new(
            vec!["Operating margin expanded".to_string()],
            Sentiment::Positive,
            confidence,
        )
    }

    /// Push an iteration the way the executor does, completing the focus when
    /// confidence clears the default threshold
    fn push(session: &mut Session, focus: FocusArea, analysis: AnalysisRecord) {
        let covered = analysis.confidence >= 0.6;
        let index = session.iterations.len();
        if index > 0 {
            session.iterations[index - 1].planning_decision =
                Some(PlanningDecision::continue_with(focus.clone(), "test"));
        }
        session
            .iterations
            .push(Iteration::new(index, focus.clone(), DataRef::empty(), analysis));
        if covered && !session.focus_state.is_completed(&focus) {
            session.focus_state.completed_focuses.push(focus);
        }
        session.completion_pct = session.focus_state.completion_pct();
    }

    struct FixedAdvisor(std::result::Result<FocusArea, CollaboratorError>);

    #[async_trait]
    impl FocusAdvisor for FixedAdvisor {
        async fn suggest_focus(
            &self,
            _session: &Session,
        ) -> std::result::Result<FocusArea, CollaboratorError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_two_required_scenario() {
        let policy = DecisionPolicy::default();
        let mut s = session(vec![A, B]);

        push(&mut s, A, record(0.8));
        let verdict = policy.evaluate(&s, &record(0.8), 5).unwrap();
        assert_eq!(
            verdict,
            Verdict::Continue {
                next_focus: B,
                reasoning: reasoning::REQUIRED_UNCOVERED.to_string()
            }
        );

        push(&mut s, B, record(0.8));
        let verdict = policy.evaluate(&s, &record(0.8), 5).unwrap();
        assert_eq!(
            verdict,
            Verdict::Summarize {
                reasoning: reasoning::COVERED.to_string()
            }
        );
    }

    #[test]
    fn test_low_confidence_reexamines_required() {
        let policy = DecisionPolicy::default();
        let mut s = session(vec![A]);

        push(&mut s, A, record(0.3));
        assert!(!s.focus_state.is_completed(&A));

        match policy.evaluate(&s, &record(0.3), 5).unwrap() {
            Verdict::Continue { next_focus, .. } => assert_eq!(next_focus, A),
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn test_cap_takes_precedence() {
        let policy = DecisionPolicy::default();
        let mut s = session(vec![A, B]);
        push(&mut s, A, record(0.1));

        assert_eq!(
            policy.evaluate(&s, &record(0.1), 1).unwrap(),
            Verdict::Summarize {
                reasoning: reasoning::MAX_ITERATIONS.to_string()
            }
        );
    }

    #[test]
    fn test_rule_three_after_coverage() {
        let policy = DecisionPolicy::default();
        let mut s = session(vec![A]);
        push(&mut s, A, record(0.9));
        push(&mut s, FocusArea::Valuation, record(0.2));

        assert_eq!(
            policy.evaluate(&s, &record(0.2), 5).unwrap(),
            Verdict::Continue {
                next_focus: FocusArea::Valuation,
                reasoning: reasoning::LOW_CONFIDENCE.to_string()
            }
        );
    }

    #[test]
    fn test_priority_order_is_deterministic() {
        let policy = DecisionPolicy::default();
        let mut s = session(vec![
            FocusArea::GrowthProspects,
            FocusArea::CompetitiveAnalysis,
            FocusArea::RiskAssessment,
        ]);
        push(&mut s, FocusArea::CompetitiveAnalysis, record(0.9));

        let first = policy.evaluate(&s, &record(0.9), 5).unwrap();
        let second = policy.evaluate(&s.clone(), &record(0.9), 5).unwrap();
        assert_eq!(first, second);
        assert!(matches!(
            first,
            Verdict::Continue { next_focus: FocusArea::GrowthProspects, .. }
        ));
    }

    #[test]
    fn test_preconditions() {
        let policy = DecisionPolicy::default();
        let empty = session(vec![]);
        assert!(matches!(
            policy.evaluate(&empty, &record(0.9), 5),
            Err(Error::InvalidSessionState(_))
        ));

        let s = session(vec![A]);
        assert!(matches!(
            policy.evaluate(&s, &record(0.9), 0),
            Err(Error::InvalidSessionState(_))
        ));
    }

    #[tokio::test]
    async fn test_explore_uses_advisor() {
        let policy = DecisionPolicy::default();
        let mut s = session(vec![A]);
        let open = record(0.9).with_narrative("Debt covenants remain unclear");
        push(&mut s, A, open.clone());

        assert_eq!(policy.evaluate(&s, &open, 5).unwrap(), Verdict::Explore);

        let advisor = FixedAdvisor(Ok(FocusArea::custom("debt structure")));
        let decision = policy.decide(&s, &open, 5, Some(&advisor as &dyn FocusAdvisor)).await.unwrap();
        assert_eq!(decision.action, Action::Continue);
        assert_eq!(decision.next_focus, Some(FocusArea::custom("debt_structure")));
        assert_eq!(decision.reasoning, reasoning::OPEN_QUESTIONS);
    }

    #[tokio::test]
    async fn test_explore_fallback() {
        let policy = DecisionPolicy::default();
        let mut s = session(vec![A]);
        let open = record(0.9).with_narrative("More information is needed");
        push(&mut s, A, open.clone());

        let failing = FixedAdvisor(Err(CollaboratorError::Advice {
            subject: "AAPL".to_string(),
            message: "timeout".to_string(),
        }));
        let decision = policy.decide(&s, &open, 5, Some(&failing as &dyn FocusAdvisor)).await.unwrap();
        assert_eq!(decision.next_focus, Some(FocusArea::Valuation));

        // valuation already covered: fall back to the latest focus
        push(&mut s, FocusArea::Valuation, open.clone());
        let decision = policy.decide(&s, &open, 5, None).await.unwrap();
        assert_eq!(decision.next_focus, Some(FocusArea::Valuation));
    }

    #[tokio::test]
    async fn test_decide_summarize_has_no_focus() {
        let policy = DecisionPolicy::default();
        let mut s = session(vec![A]);
        push(&mut s, A, record(0.95));

        let decision = policy.decide(&s, &record(0.95), 5, None).await.unwrap();
        assert!(decision.is_summarize());
        assert!(decision.next_focus.is_none());
    }
}
