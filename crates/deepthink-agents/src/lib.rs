//! Research collaborators for deepthink
//!
//! Concrete implementations of the collaborator traits from `deepthink-core`:
//!
//! - [`MarketDataFetcher`]: daily price history from Yahoo Finance, reduced to
//!   focus-specific metrics and cached for a configurable TTL, optionally
//!   joined with Alpha Vantage fundamentals and P/E, DCF and DDM price targets
//! - [`LlmAnalyzer`]: focus-specific analysis through an [`LLMProvider`]
//! - [`LlmSummarizer`]: final markdown investment memo
//! - [`LlmFocusAdvisor`]: next-focus suggestion for open-ended iterations
//!
//! [`AgentSuite`] wires all four together around one provider.

pub mod advisor;
pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod fundamentals;
pub mod market;
pub mod metrics;
pub mod prompts;
pub mod summarizer;
pub mod text;
pub mod valuation;

#[cfg(test)]
mod testing;

pub use advisor::LlmFocusAdvisor;
pub use analyzer::LlmAnalyzer;
pub use cache::DataCache;
pub use config::{AgentsConfig, AgentsConfigBuilder, CallSettings};
pub use error::{AgentError, Result};
pub use fetcher::MarketDataFetcher;
pub use fundamentals::{AlphaVantageFundamentals, CompanyFundamentals, FundamentalsSource};
pub use market::{MarketDataSource, PriceBar, YahooMarketData};
pub use prompts::PromptLibrary;
pub use summarizer::LlmSummarizer;
pub use valuation::{ValuationAssumptions, ValuationMethod};

use deepthink_core::{Analyzer, Fetcher, FocusAdvisor, Summarizer};
use deepthink_llm::LLMProvider;
use deepthink_llm::providers::OpenAIProvider;
use std::sync::Arc;

/// The full set of collaborators for one executor
#[derive(Clone)]
pub struct AgentSuite {
    pub fetcher: Arc<dyn Fetcher>,
    pub analyzer: Arc<dyn Analyzer>,
    pub summarizer: Arc<dyn Summarizer>,
    pub advisor: Arc<dyn FocusAdvisor>,
}

impl AgentSuite {
    /// Yahoo Finance data with all language work going through `provider`
    pub fn new(provider: Arc<dyn LLMProvider>, config: AgentsConfig) -> Result<Self> {
        let fetcher = MarketDataFetcher::yahoo(config.clone());
        Self::with_fetcher(provider, fetcher, config)
    }

    pub fn with_fetcher(
        provider: Arc<dyn LLMProvider>,
        fetcher: MarketDataFetcher,
        config: AgentsConfig,
    ) -> Result<Self> {
        config.validate()?;
        let prompts = Arc::new(PromptLibrary::new()?);

        Ok(Self {
            fetcher: Arc::new(fetcher),
            analyzer: Arc::new(LlmAnalyzer::new(
                Arc::clone(&provider),
                Arc::clone(&prompts),
                config.clone(),
            )),
            summarizer: Arc::new(LlmSummarizer::new(
                Arc::clone(&provider),
                Arc::clone(&prompts),
                config.clone(),
            )),
            advisor: Arc::new(LlmFocusAdvisor::new(provider, prompts, config)),
        })
    }

    /// Suite backed by the OpenAI provider configured from the environment
    ///
    /// Company fundamentals are added when `ALPHA_VANTAGE_API_KEY` is set.
    pub fn openai_from_env(config: AgentsConfig) -> Result<Self> {
        let provider = OpenAIProvider::from_env()?;

        let mut fetcher = MarketDataFetcher::yahoo(config.clone());
        match AlphaVantageFundamentals::from_env(config.fundamentals_rate_limit) {
            Ok(source) => fetcher = fetcher.with_fundamentals(Arc::new(source)),
            Err(e) => tracing::info!(reason = %e, "Company fundamentals disabled"),
        }

        Self::with_fetcher(Arc::new(provider), fetcher, config)
    }
}

impl std::fmt::Debug for AgentSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSuite")
            .field("fetcher", &self.fetcher.name())
            .field("analyzer", &self.analyzer.name())
            .field("summarizer", &self.summarizer.name())
            .field("advisor", &self.advisor.name())
            .finish()
    }
}
