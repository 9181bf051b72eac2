//! LLM-backed focus advisor

use crate::config::AgentsConfig;
use crate::error::{AgentError, Result};
use crate::prompts::{ADVICE_SYSTEM, PromptLibrary};
use async_trait::async_trait;
use deepthink_core::{CollaboratorError, FocusAdvisor, FocusArea, Session};
use deepthink_llm::{CompletionRequest, LLMProvider};
use std::sync::Arc;

/// Longest free-form answer accepted as an ad-hoc focus, in words
const MAX_CUSTOM_WORDS: usize = 4;

/// [`FocusAdvisor`] that lets a language model pick the next focus area
pub struct LlmFocusAdvisor {
    provider: Arc<dyn LLMProvider>,
    prompts: Arc<PromptLibrary>,
    config: AgentsConfig,
    candidates: Vec<FocusArea>,
}

impl LlmFocusAdvisor {
    /// Advisor choosing among the well-known focus areas
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        prompts: Arc<PromptLibrary>,
        config: AgentsConfig,
    ) -> Self {
        Self {
            provider,
            prompts,
            config,
            candidates: FocusArea::KNOWN.to_vec(),
        }
    }

    /// Replace the focus areas offered to the model
    pub fn with_candidates(mut self, candidates: Vec<FocusArea>) -> Self {
        self.candidates = candidates;
        self
    }

    async fn run(&self, session: &Session) -> Result<FocusArea> {
        let open: Vec<FocusArea> = self
            .candidates
            .iter()
            .filter(|focus| !session.focus_state.is_completed(focus))
            .cloned()
            .collect();
        let offered = if open.is_empty() {
            &self.candidates
        } else {
            &open
        };

        let prompt = self.prompts.next_focus(session, offered)?;
        let settings = self.config.advice;
        let request = CompletionRequest::new(&self.config.model, prompt)
            .with_system(ADVICE_SYSTEM)
            .with_sampling(settings.temperature, settings.max_tokens);

        let response = self.provider.complete(request).await?;
        let focus = interpret_reply(&response.text, offered)?;

        tracing::debug!(
            subject = %session.subject_id,
            reply = %response.text.trim(),
            focus = %focus,
            "Focus suggested"
        );
        Ok(focus)
    }
}

#[async_trait]
impl FocusAdvisor for LlmFocusAdvisor {
    async fn suggest_focus(
        &self,
        session: &Session,
    ) -> std::result::Result<FocusArea, CollaboratorError> {
        self.run(session)
            .await
            .map_err(|e| e.advice(&session.subject_id))
    }

    fn name(&self) -> &str {
        "llm-advisor"
    }
}

/// Map a model reply onto a focus area
///
/// Exact names win, then the first offered area mentioned anywhere in the
/// reply. A short answer naming nothing offered becomes an ad-hoc focus.
pub fn interpret_reply(reply: &str, offered: &[FocusArea]) -> Result<FocusArea> {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '.' | ':'))
        .trim();
    if line.is_empty() {
        return Err(AgentError::UnusableResponse("empty focus suggestion".to_string()));
    }

    let parsed = FocusArea::parse(line);
    if parsed.is_known() || offered.contains(&parsed) {
        return Ok(parsed);
    }

    let lower = reply.to_lowercase();
    if let Some(found) = offered.iter().find(|focus| {
        lower.contains(focus.as_str()) || lower.contains(&focus.title().to_lowercase())
    }) {
        return Ok(found.clone());
    }

    if line.split_whitespace().count() <= MAX_CUSTOM_WORDS && !parsed.as_str().is_empty() {
        return Ok(parsed);
    }

    Err(AgentError::UnusableResponse(format!(
        "no focus area in reply: {}",
        line.chars().take(80).collect::<String>()
    )))
}
