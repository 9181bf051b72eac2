//! Heuristics over free-form analysis text

use deepthink_core::Sentiment;

/// Upper bound on extracted key points
pub const MAX_KEY_POINTS: usize = 10;

const MIN_POINT_CHARS: usize = 10;
const MIN_SENTENCE_CHARS: usize = 20;
const FALLBACK_SENTENCES: usize = 5;

const POSITIVE_WORDS: &[&str] = &[
    "growth",
    "strong",
    "opportunity",
    "upside",
    "outperform",
    "buy",
    "attractive",
    "undervalued",
    "recommend",
    "positive",
    "advantage",
    "moat",
    "leader",
    "innovative",
    "profitable",
];

const NEGATIVE_WORDS: &[&str] = &[
    "risk",
    "challenge",
    "threat",
    "decline",
    "underperform",
    "sell",
    "overvalued",
    "avoid",
    "negative",
    "weak",
    "competition",
    "pressure",
    "concern",
    "debt",
    "uncertain",
];

/// Coarse confidence in a sentiment reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn score(self) -> f64 {
        match self {
            Self::High => 0.9,
            Self::Medium => 0.6,
            Self::Low => 0.3,
        }
    }
}

/// Pull the key points out of an analysis
///
/// Bulleted and numbered lines win; lines starting with "key" count too.
/// Without any, the leading sentences of the text are used instead.
pub fn extract_key_points(text: &str) -> Vec<String> {
    let mut points: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter_map(point_from_line)
        .filter(|point| point.chars().count() > MIN_POINT_CHARS)
        .take(MAX_KEY_POINTS)
        .collect();

    if points.is_empty() {
        points = text
            .split('.')
            .map(str::trim)
            .filter(|sentence| sentence.chars().count() > MIN_SENTENCE_CHARS)
            .take(FALLBACK_SENTENCES)
            .map(|sentence| format!("{sentence}."))
            .collect();
    }

    points
}

fn point_from_line(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix('-').or_else(|| line.strip_prefix('•')) {
        return Some(rest.trim().to_string());
    }

    let numbered = line.starts_with(|c: char| matches!(c, '1'..='9'))
        && line.chars().take(5).collect::<String>().contains(". ");
    if numbered {
        return line
            .split_once('.')
            .map(|(_, rest)| rest.trim().to_string());
    }

    if line.to_lowercase().starts_with("key") {
        return Some(line.to_string());
    }

    None
}

/// Keyword-count sentiment of an analysis
///
/// One side must outweigh the other by half again to tip the balance.
pub fn score_sentiment(text: &str) -> (Sentiment, ConfidenceLevel) {
    let lower = text.to_lowercase();
    let count = |words: &[&str]| -> usize { words.iter().map(|w| lower.matches(w).count()).sum() };

    let (pos_hits, neg_hits) = (count(POSITIVE_WORDS), count(NEGATIVE_WORDS));
    let (positive, negative) = (pos_hits as f64, neg_hits as f64);

    let sentiment = if positive > negative * 1.5 {
        Sentiment::Positive
    } else if negative > positive * 1.5 {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };

    let confidence = if pos_hits + neg_hits == 0 {
        ConfidenceLevel::Low
    } else {
        let spread = (positive - negative).abs() / (positive + negative);
        if spread > 0.5 {
            ConfidenceLevel::High
        } else if spread > 0.2 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    };

    (sentiment, confidence)
}
