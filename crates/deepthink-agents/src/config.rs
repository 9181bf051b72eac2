//! Configuration for the research agents

use crate::error::{AgentError, Result};
use crate::valuation::ValuationAssumptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sampling settings of one kind of LLM call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallSettings {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl CallSettings {
    pub const fn new(temperature: f32, max_tokens: usize) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

/// Configuration for the research agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Chat model used for every call
    pub model: String,

    /// Focus area analysis
    pub analysis: CallSettings,

    /// Final investment summary
    pub summary: CallSettings,

    /// Next-focus suggestion; the answer is a single focus name
    pub advice: CallSettings,

    /// How long fetched price history stays cached
    pub cache_ttl: Duration,

    /// Calendar days of price history requested per symbol
    pub history_days: u32,

    /// Symbol used for relative performance and beta
    pub benchmark: String,

    /// Request quota of the fundamentals provider, per minute
    pub fundamentals_rate_limit: u32,

    /// Inputs of the price target models
    pub valuation: ValuationAssumptions,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            analysis: CallSettings::new(0.2, 4000),
            summary: CallSettings::new(0.3, 4000),
            advice: CallSettings::new(0.3, 100),
            cache_ttl: Duration::from_secs(300), // 5 minutes
            history_days: 365,
            benchmark: "SPY".to_string(),
            fundamentals_rate_limit: 5,
            valuation: ValuationAssumptions::default(),
        }
    }
}

impl AgentsConfig {
    /// Create a new configuration builder
    pub fn builder() -> AgentsConfigBuilder {
        AgentsConfigBuilder::default()
    }

    /// Override model and benchmark from `DEEPTHINK_MODEL` / `DEEPTHINK_BENCHMARK`
    pub fn with_env(mut self) -> Self {
        if let Ok(model) = std::env::var("DEEPTHINK_MODEL") {
            self.model = model;
        }
        if let Ok(benchmark) = std::env::var("DEEPTHINK_BENCHMARK") {
            self.benchmark = benchmark;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AgentError::Config("model must not be empty".to_string()));
        }

        for (name, settings) in [
            ("analysis", self.analysis),
            ("summary", self.summary),
            ("advice", self.advice),
        ] {
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(AgentError::Config(format!(
                    "{name} temperature must be within [0, 2]"
                )));
            }
            if settings.max_tokens == 0 {
                return Err(AgentError::Config(format!(
                    "{name} max_tokens must be greater than 0"
                )));
            }
        }

        // a year of bars is needed for the 52-week and 200-day figures
        if self.history_days < 30 {
            return Err(AgentError::Config(
                "history_days must be at least 30".to_string(),
            ));
        }

        if self.benchmark.trim().is_empty() {
            return Err(AgentError::Config("benchmark must not be empty".to_string()));
        }

        if self.fundamentals_rate_limit == 0 {
            return Err(AgentError::Config(
                "fundamentals_rate_limit must be greater than 0".to_string(),
            ));
        }

        self.valuation.validate()
    }
}

/// Builder for AgentsConfig
#[derive(Debug, Default)]
pub struct AgentsConfigBuilder {
    model: Option<String>,
    analysis: Option<CallSettings>,
    summary: Option<CallSettings>,
    advice: Option<CallSettings>,
    cache_ttl: Option<Duration>,
    history_days: Option<u32>,
    benchmark: Option<String>,
    fundamentals_rate_limit: Option<u32>,
    valuation: Option<ValuationAssumptions>,
}

impl AgentsConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn analysis(mut self, settings: CallSettings) -> Self {
        self.analysis = Some(settings);
        self
    }

    pub fn summary(mut self, settings: CallSettings) -> Self {
        self.summary = Some(settings);
        self
    }

    pub fn advice(mut self, settings: CallSettings) -> Self {
        self.advice = Some(settings);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn history_days(mut self, days: u32) -> Self {
        self.history_days = Some(days);
        self
    }

    pub fn benchmark(mut self, symbol: impl Into<String>) -> Self {
        self.benchmark = Some(symbol.into());
        self
    }

    pub fn fundamentals_rate_limit(mut self, per_minute: u32) -> Self {
        self.fundamentals_rate_limit = Some(per_minute);
        self
    }

    pub fn valuation(mut self, assumptions: ValuationAssumptions) -> Self {
        self.valuation = Some(assumptions);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AgentsConfig> {
        let defaults = AgentsConfig::default();

        let config = AgentsConfig {
            model: self.model.unwrap_or(defaults.model),
            analysis: self.analysis.unwrap_or(defaults.analysis),
            summary: self.summary.unwrap_or(defaults.summary),
            advice: self.advice.unwrap_or(defaults.advice),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            history_days: self.history_days.unwrap_or(defaults.history_days),
            benchmark: self.benchmark.unwrap_or(defaults.benchmark),
            fundamentals_rate_limit: self
                .fundamentals_rate_limit
                .unwrap_or(defaults.fundamentals_rate_limit),
            valuation: self.valuation.unwrap_or(defaults.valuation),
        };

        config.validate()?;
        Ok(config)
    }
}
