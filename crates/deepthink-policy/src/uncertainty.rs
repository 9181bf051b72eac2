//! Open-question detection over analysis output

use deepthink_core::AnalysisRecord;

/// Phrases that indicate the analysis itself asks for more research
pub const DEFAULT_INDICATORS: &[&str] = &[
    "further research",
    "additional analysis",
    "more information",
    "unclear",
    "uncertain",
    "unknown",
    "limited data",
    "insufficient information",
];

/// Decides whether an analysis record leaves open questions
pub trait UncertaintySignal: Send + Sync {
    fn has_open_questions(&self, record: &AnalysisRecord) -> bool;
}

/// Case-insensitive phrase matcher over insights and narrative
#[derive(Debug, Clone)]
pub struct KeywordUncertainty {
    indicators: Vec<String>,
}

impl Default for KeywordUncertainty {
    fn default() -> Self {
        Self::new(DEFAULT_INDICATORS.iter().copied())
    }
}

impl KeywordUncertainty {
    pub fn new<I, S>(indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            indicators: indicators
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// First indicator found in `text`, if any
    pub fn find_indicator(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.indicators
            .iter()
            .find(|indicator| lower.contains(indicator.as_str()))
            .map(String::as_str)
    }
}

impl UncertaintySignal for KeywordUncertainty {
    fn has_open_questions(&self, record: &AnalysisRecord) -> bool {
        record
            .insights
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(record.narrative.as_str()))
            .any(|text| self.find_indicator(text).is_some())
    }
}
