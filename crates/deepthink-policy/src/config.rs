//! Configuration for the decision policy

use deepthink_core::{Error, FocusArea, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the decision policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Iteration cap applied when a run does not specify its own
    pub max_iterations: usize,

    /// Minimum confidence for a focus area to count as covered
    pub confidence_threshold: f64,

    /// Supplementary areas explored when the latest analysis leaves open
    /// questions and no advisor answer is available
    pub exploration_focuses: Vec<FocusArea>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            confidence_threshold: 0.6,
            exploration_focuses: vec![FocusArea::Valuation],
        }
    }
}

impl PolicyConfig {
    /// Create a new configuration builder
    pub fn builder() -> PolicyConfigBuilder {
        PolicyConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidSessionState(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::InvalidSessionState(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }

        Ok(())
    }
}

/// Builder for PolicyConfig
#[derive(Debug, Default)]
pub struct PolicyConfigBuilder {
    max_iterations: Option<usize>,
    confidence_threshold: Option<f64>,
    exploration_focuses: Option<Vec<FocusArea>>,
}

impl PolicyConfigBuilder {
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn exploration_focuses(mut self, focuses: Vec<FocusArea>) -> Self {
        self.exploration_focuses = Some(focuses);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PolicyConfig> {
        let defaults = PolicyConfig::default();

        let config = PolicyConfig {
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            confidence_threshold: self
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            exploration_focuses: self
                .exploration_focuses
                .unwrap_or(defaults.exploration_focuses),
        };

        config.validate()?;
        Ok(config)
    }
}
