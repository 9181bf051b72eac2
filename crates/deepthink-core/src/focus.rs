//! Research focus areas
//!
//! A focus area names one category of investigation. The well-known areas are
//! closed variants so that matches stay exhaustive; anything else (for example
//! a focus suggested by an LLM advisor) is carried by [`FocusArea::Custom`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A named category of investigation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FocusArea {
    /// Financial statements, ratios and trends
    FinancialPerformance,
    /// Market position, competitors and industry dynamics
    CompetitiveAnalysis,
    /// Growth opportunities and future outlook
    GrowthProspects,
    /// Key risks and challenges
    RiskAssessment,
    /// Valuation metrics and fair value
    Valuation,
    /// Ad-hoc focus, built through [`FocusArea::parse`] or [`FocusArea::custom`]
    Custom(CustomFocus),
}

/// Normalized snake_case name of an ad-hoc focus area
///
/// Only [`FocusArea::parse`] creates values, so a custom name reloads
/// exactly as it was written and never shadows a well-known area.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomFocus(String);

impl CustomFocus {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FocusArea {
    /// All well-known focus areas
    pub const KNOWN: [FocusArea; 5] = [
        FocusArea::FinancialPerformance,
        FocusArea::CompetitiveAnalysis,
        FocusArea::GrowthProspects,
        FocusArea::RiskAssessment,
        FocusArea::Valuation,
    ];

    /// Default required focus areas for a fresh session, in priority order
    pub fn default_required() -> Vec<FocusArea> {
        vec![
            FocusArea::FinancialPerformance,
            FocusArea::CompetitiveAnalysis,
            FocusArea::GrowthProspects,
            FocusArea::RiskAssessment,
        ]
    }

    /// Parse a focus name, accepting the short aliases used in prompts
    /// (`financial`, `competitive`, `growth`, `risk`).
    ///
    /// Unknown names become [`FocusArea::Custom`] after normalization.
    pub fn parse(name: &str) -> Self {
        let normalized = normalize(name);
        match normalized.as_str() {
            "financial_performance" | "financial" => Self::FinancialPerformance,
            "competitive_analysis" | "competitive" | "competition" => Self::CompetitiveAnalysis,
            "growth_prospects" | "growth" => Self::GrowthProspects,
            "risk_assessment" | "risk" | "risks" => Self::RiskAssessment,
            "valuation" => Self::Valuation,
            _ => Self::Custom(CustomFocus(normalized)),
        }
    }

    /// Build an ad-hoc focus; well-known names map to their variant
    pub fn custom(name: impl AsRef<str>) -> Self {
        Self::parse(name.as_ref())
    }

    /// Canonical snake_case name
    pub fn as_str(&self) -> &str {
        match self {
            Self::FinancialPerformance => "financial_performance",
            Self::CompetitiveAnalysis => "competitive_analysis",
            Self::GrowthProspects => "growth_prospects",
            Self::RiskAssessment => "risk_assessment",
            Self::Valuation => "valuation",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Human readable title, e.g. "Growth Prospects"
    pub fn title(&self) -> String {
        self.as_str()
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One-line description used when presenting focus choices to an LLM
    pub fn description(&self) -> &str {
        match self {
            Self::FinancialPerformance => {
                "Detailed analysis of financial statements, ratios, and trends"
            }
            Self::CompetitiveAnalysis => {
                "Evaluation of market position, competitors, and industry dynamics"
            }
            Self::GrowthProspects => {
                "Assessment of growth opportunities, expansion potential, and future outlook"
            }
            Self::RiskAssessment => "Identification and evaluation of key risks and challenges",
            Self::Valuation => {
                "Analysis of current valuation, fair value estimates, and valuation metrics"
            }
            Self::Custom(_) => "Ad-hoc research area",
        }
    }

    /// Whether this is one of the closed variants
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

impl fmt::Display for FocusArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FocusArea {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<&str> for FocusArea {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<FocusArea> for String {
    fn from(focus: FocusArea) -> Self {
        match focus {
            FocusArea::Custom(CustomFocus(name)) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl Ord for FocusArea {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for FocusArea {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
