//! LLM-backed investment summary

use crate::config::AgentsConfig;
use crate::error::{AgentError, Result};
use crate::prompts::{PromptLibrary, SUMMARY_SYSTEM};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deepthink_core::{CollaboratorError, Iteration, SubjectId, Summarizer};
use deepthink_llm::{CompletionRequest, LLMProvider};
use std::sync::Arc;

/// Returned when no iteration carries a usable analysis
pub const NO_ANALYSES: &str = "No analyses were provided to summarize.";

/// [`Summarizer`] that asks a language model for a markdown investment memo
pub struct LlmSummarizer {
    provider: Arc<dyn LLMProvider>,
    prompts: Arc<PromptLibrary>,
    config: AgentsConfig,
}

impl LlmSummarizer {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        prompts: Arc<PromptLibrary>,
        config: AgentsConfig,
    ) -> Self {
        Self {
            provider,
            prompts,
            config,
        }
    }

    async fn run(&self, iterations: &[Iteration], subject: &SubjectId) -> Result<String> {
        // degraded iterations carry no analysis
        let usable: Vec<&Iteration> = iterations.iter().filter(|it| !it.is_degraded()).collect();
        if usable.is_empty() {
            return Ok(NO_ANALYSES.to_string());
        }

        let prompt = self.prompts.summary(subject, &usable)?;
        let settings = self.config.summary;
        let request = CompletionRequest::new(&self.config.model, prompt)
            .with_system(SUMMARY_SYSTEM)
            .with_sampling(settings.temperature, settings.max_tokens);

        let response = self.provider.complete(request).await?;
        let body = response.text.trim();
        if body.is_empty() {
            return Err(AgentError::UnusableResponse("empty summary".to_string()));
        }

        tracing::info!(
            subject = %subject,
            analyses = usable.len(),
            tokens = response.usage.total(),
            "Summary generated"
        );
        Ok(with_metadata(subject, &usable, body, Utc::now()))
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        iterations: &[Iteration],
        subject: &SubjectId,
    ) -> std::result::Result<String, CollaboratorError> {
        self.run(iterations, subject)
            .await
            .map_err(|e| e.summarization(subject))
    }

    fn name(&self) -> &str {
        "llm-summarizer"
    }
}

/// Prefix a summary body with its metadata block and title
pub fn with_metadata(
    subject: &SubjectId,
    analyses: &[&Iteration],
    body: &str,
    generated: DateTime<Utc>,
) -> String {
    let types = analyses
        .iter()
        .map(|it| it.focus.title())
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = format!(
        "---\nSymbol: {subject}\nAnalyses Performed: {}\nAnalysis Types: {types}\nGenerated: {}\n---\n\n",
        analyses.len(),
        generated.format("%Y-%m-%d %H:%M:%S"),
    );
    if !body.starts_with("# ") {
        out.push_str(&format!("# Investment Summary for {subject}\n\n"));
    }
    out.push_str(body);
    out
}
