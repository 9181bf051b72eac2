//! Daily price history sources

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

/// One daily bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjclose: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Adjusted close when the provider supplies one, raw close otherwise
    pub fn price(&self) -> f64 {
        if self.adjclose > 0.0 {
            self.adjclose
        } else {
            self.close
        }
    }
}

/// Provider of daily price history
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily bars covering the last `days` calendar days, oldest first
    async fn daily_history(&self, symbol: &str, days: u32) -> Result<Vec<PriceBar>>;

    fn name(&self) -> &str;
}

/// Yahoo Finance quote history
#[derive(Debug, Clone, Default)]
pub struct YahooMarketData;

impl YahooMarketData {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MarketDataSource for YahooMarketData {
    async fn daily_history(&self, symbol: &str, days: u32) -> Result<Vec<PriceBar>> {
        let provider =
            yahoo::YahooConnector::new().map_err(|e| AgentError::MarketData(e.to_string()))?;

        let end = Utc::now();
        let start = end - Duration::days(i64::from(days));
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| AgentError::MarketData(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| AgentError::MarketData(format!("Invalid end timestamp: {e}")))?;

        let response = provider
            .get_quote_history(symbol, start_odt, end_odt)
            .await
            .map_err(|e| AgentError::MarketData(format!("{symbol}: {e}")))?;

        let quotes = response
            .quotes()
            .map_err(|e| AgentError::MarketData(format!("{symbol}: {e}")))?;

        let mut bars: Vec<PriceBar> = quotes
            .iter()
            .filter(|q| q.close.is_finite() && q.close > 0.0)
            .filter_map(|q| {
                DateTime::from_timestamp(q.timestamp as i64, 0).map(|timestamp| PriceBar {
                    timestamp,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    adjclose: q.adjclose,
                    volume: q.volume,
                })
            })
            .collect();
        bars.sort_by_key(|bar| bar.timestamp);

        tracing::debug!(symbol, days, bars = bars.len(), "Fetched daily history");
        Ok(bars)
    }

    fn name(&self) -> &str {
        "yahoo_finance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_prefers_adjusted_close() {
        let bar = PriceBar {
            timestamp: Utc::now(),
            open: 10.0,
            high: 11.0,
            low: 9.0,
            close: 10.5,
            adjclose: 10.2,
            volume: 1_000,
        };
        assert!((bar.price() - 10.2).abs() < f64::EPSILON);

        let unadjusted = PriceBar {
            adjclose: 0.0,
            ..bar
        };
        assert!((unadjusted.price() - 10.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_yahoo_history() {
        let bars = YahooMarketData::new()
            .daily_history("AAPL", 30)
            .await
            .unwrap();
        assert!(!bars.is_empty());
        assert!(bars.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
