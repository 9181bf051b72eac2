//! LLM-backed analyzer

use crate::config::AgentsConfig;
use crate::error::{AgentError, Result};
use crate::prompts::{ANALYSIS_SYSTEM, PromptLibrary};
use crate::text::{extract_key_points, score_sentiment};
use async_trait::async_trait;
use deepthink_core::{AnalysisRecord, Analyzer, CollaboratorError, DataPayload, FocusArea, SubjectId};
use deepthink_llm::{CompletionRequest, LLMProvider};
use std::sync::Arc;

/// [`Analyzer`] that asks a language model for a focus-specific analysis
///
/// Key points, sentiment and confidence are derived from the answer text with
/// the heuristics in [`crate::text`]; the full answer is kept as narrative.
pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    prompts: Arc<PromptLibrary>,
    config: AgentsConfig,
}

impl LlmAnalyzer {
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

    async fn run(
        &self,
        data: &DataPayload,
        focus: &FocusArea,
        subject: &SubjectId,
    ) -> Result<AnalysisRecord> {
        let prompt = self.prompts.analysis(subject, focus, &data.data)?;

        let settings = self.config.analysis;
        let request = CompletionRequest::new(&self.config.model, prompt)
            .with_system(ANALYSIS_SYSTEM)
            .with_sampling(settings.temperature, settings.max_tokens);

        let response = self.provider.complete(request).await?;
        if response.is_truncated() {
            tracing::warn!(subject = %subject, focus = %focus, "Analysis truncated at token limit");
        }

        let text = response.text.trim();
        if text.is_empty() {
            return Err(AgentError::UnusableResponse("empty analysis".to_string()));
        }

        let (sentiment, level) = score_sentiment(text);
        let record = AnalysisRecord::new(extract_key_points(text), sentiment, level.score())
            .with_narrative(text);

        tracing::debug!(
            subject = %subject,
            focus = %focus,
            key_points = record.insights.len(),
            sentiment = %record.sentiment,
            confidence = record.confidence,
            tokens = response.usage.total(),
            "Analysis complete"
        );
        Ok(record)
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn analyze(
        &self,
        data: &DataPayload,
        focus: &FocusArea,
        subject: &SubjectId,
    ) -> std::result::Result<AnalysisRecord, CollaboratorError> {
        self.run(data, focus, subject)
            .await
            .map_err(|e| e.analysis(subject, focus))
    }

    fn name(&self) -> &str {
        "llm-analyzer"
    }
}
