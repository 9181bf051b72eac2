//! External collaborator interfaces
//!
//! The cycle executor drives the research loop but never talks to data
//! sources or language models directly. Everything outside the orchestration
//! core sits behind one of these traits, so that tests can substitute scripted
//! implementations.

use crate::error::CollaboratorError;
use crate::focus::FocusArea;
use crate::session::{AnalysisRecord, DataRef, Iteration, Session};
use crate::subject::SubjectId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept in a [`DataRef`] preview
pub const DATA_PREVIEW_CHARS: usize = 240;

/// Data obtained from a [`Fetcher`] for one focus area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    /// Where the data came from, e.g. "yahoo_finance"
    pub source: String,
    pub focus: FocusArea,
    pub fetched_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl DataPayload {
    pub fn new(source: impl Into<String>, focus: FocusArea, data: serde_json::Value) -> Self {
        Self {
            source: source.into(),
            focus,
            fetched_at: Utc::now(),
            data,
        }
    }

    /// Compact reference stored on the iteration instead of the payload
    pub fn to_data_ref(&self) -> DataRef {
        let serialized = self.data.to_string();
        DataRef {
            source: self.source.clone(),
            preview: serialized.chars().take(DATA_PREVIEW_CHARS).collect(),
            size_bytes: serialized.len(),
        }
    }
}

/// Retrieves raw data for a subject and focus area
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        subject: &SubjectId,
        focus: &FocusArea,
    ) -> Result<DataPayload, CollaboratorError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "fetcher"
    }
}

/// Turns fetched data into a structured analysis record
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        data: &DataPayload,
        focus: &FocusArea,
        subject: &SubjectId,
    ) -> Result<AnalysisRecord, CollaboratorError>;

    fn name(&self) -> &str {
        "analyzer"
    }
}

/// Produces the final markdown summary from the full iteration history
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        iterations: &[Iteration],
        subject: &SubjectId,
    ) -> Result<String, CollaboratorError>;

    fn name(&self) -> &str {
        "summarizer"
    }
}

/// Suggests the next focus when the decision policy finds open questions
///
/// This is the only place where non-deterministic input may enter the
/// decision process.
#[async_trait]
pub trait FocusAdvisor: Send + Sync {
    async fn suggest_focus(&self, session: &Session) -> Result<FocusArea, CollaboratorError>;

    fn name(&self) -> &str {
        "focus-advisor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Sentiment;

    struct EchoAnalyzer;

    #[async_trait]
    impl Analyzer for EchoAnalyzer {
        async fn analyze(
            &self,
            data: &DataPayload,
            focus: &FocusArea,
            _subject: &SubjectId,
        ) -> Result<AnalysisRecord, CollaboratorError> {
            Ok(AnalysisRecord::new(
                vec![format!("{} from {}", focus.title(), data.source)],
                Sentiment::Neutral,
                0.5,
            ))
        }
    }

    #[test]
    fn test_data_ref_is_bounded() {
        let big = serde_json::json!({ "values": vec![1.5_f64; 500] });
        let payload = DataPayload::new("test", FocusArea::Valuation, big);
        let data_ref = payload.to_data_ref();

        assert_eq!(data_ref.source, "test");
        assert_eq!(data_ref.preview.chars().count(), DATA_PREVIEW_CHARS);
        assert!(data_ref.size_bytes > DATA_PREVIEW_CHARS);
        assert!(!data_ref.is_empty());
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let analyzer: Box<dyn Analyzer> = Box::new(EchoAnalyzer);
        let payload = DataPayload::new("unit", FocusArea::RiskAssessment, serde_json::json!({}));
        let subject = SubjectId::new("TSLA").unwrap();

        let record = analyzer
            .analyze(&payload, &FocusArea::RiskAssessment, &subject)
            .await
            .unwrap();

        assert_eq!(record.insights, vec!["Risk Assessment from unit".to_string()]);
        assert_eq!(analyzer.name(), "analyzer");
    }
}
