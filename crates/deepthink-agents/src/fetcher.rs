//! Market data fetcher
//!
//! Turns daily price history into a per-focus metric payload. The history of
//! each symbol is cached for [`AgentsConfig::cache_ttl`], so the several focus
//! areas of one run share a single download.
//!
//! With a [`FundamentalsSource`] attached, every payload also carries the
//! company profile; financial performance adds margins and cash flow, growth
//! adds reported growth rates and valuation adds multiples and price targets.
//! Fundamentals are cached the same way and are optional: when the provider
//! fails the price-based payload is still returned.

use crate::cache::DataCache;
use crate::config::AgentsConfig;
use crate::error::{AgentError, Result};
use crate::fundamentals::{
    CompanyFundamentals, FundamentalsSource, format_market_cap, interpret_pe,
};
use crate::market::{MarketDataSource, PriceBar, YahooMarketData};
use crate::metrics::{self, ONE_MONTH, SIX_MONTHS, THREE_MONTHS, TRADING_DAYS_PER_YEAR, round4};
use crate::valuation::{ValuationAssumptions, valuation_data};
use async_trait::async_trait;
use deepthink_core::{CollaboratorError, DataPayload, Fetcher, FocusArea, SubjectId};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Fewest bars that still produce a meaningful payload
const MIN_BARS: usize = 2;

/// [`Fetcher`] backed by a [`MarketDataSource`]
pub struct MarketDataFetcher {
    source: Arc<dyn MarketDataSource>,
    cache: DataCache<String, Vec<PriceBar>>,
    fundamentals: Option<Arc<dyn FundamentalsSource>>,
    fundamentals_cache: DataCache<String, CompanyFundamentals>,
    config: AgentsConfig,
}

impl MarketDataFetcher {
    pub fn new(source: Arc<dyn MarketDataSource>, config: AgentsConfig) -> Self {
        Self {
            source,
            cache: DataCache::new(config.cache_ttl),
            fundamentals: None,
            fundamentals_cache: DataCache::new(config.cache_ttl),
            config,
        }
    }

    /// Fetcher using Yahoo Finance
    pub fn yahoo(config: AgentsConfig) -> Self {
        Self::new(Arc::new(YahooMarketData::new()), config)
    }

    /// Add company fundamentals and price targets to the payloads
    pub fn with_fundamentals(mut self, source: Arc<dyn FundamentalsSource>) -> Self {
        self.fundamentals = Some(source);
        self
    }

    async fn company(&self, symbol: &str) -> Option<CompanyFundamentals> {
        let source = Arc::clone(self.fundamentals.as_ref()?);
        let fetched = self
            .fundamentals_cache
            .get_or_fetch(symbol.to_string(), || async move {
                source.fundamentals(symbol).await
            })
            .await;

        match fetched {
            Ok(company) => Some(company),
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Company fundamentals unavailable");
                None
            }
        }
    }

    async fn history(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        let source = Arc::clone(&self.source);
        let days = self.config.history_days;
        let bars = self
            .cache
            .get_or_fetch(symbol.to_string(), || async move {
                source.daily_history(symbol, days).await
            })
            .await?;

        if bars.len() < MIN_BARS {
            return Err(AgentError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("only {} price bars returned", bars.len()),
            });
        }
        Ok(bars)
    }

    async fn collect(&self, subject: &SubjectId, focus: &FocusArea) -> Result<Value> {
        let bars = self.history(subject.as_str()).await?;

        let benchmark = if needs_benchmark(focus) {
            // relative figures are optional, a missing benchmark only drops them
            match self.history(&self.config.benchmark).await {
                Ok(bench) => Some(bench),
                Err(e) => {
                    tracing::warn!(
                        benchmark = %self.config.benchmark,
                        error = %e,
                        "Benchmark history unavailable"
                    );
                    None
                }
            }
        } else {
            None
        };

        let mut data = focus_data(
            subject.as_str(),
            focus,
            &bars,
            benchmark
                .as_deref()
                .map(|bench| (self.config.benchmark.as_str(), bench)),
        );
        if let Some(company) = self.company(subject.as_str()).await {
            add_fundamentals(&mut data, focus, &company, &self.config.valuation);
        }
        Ok(data)
    }
}

#[async_trait]
impl Fetcher for MarketDataFetcher {
    async fn fetch(
        &self,
        subject: &SubjectId,
        focus: &FocusArea,
    ) -> std::result::Result<DataPayload, CollaboratorError> {
        tracing::debug!(subject = %subject, focus = %focus, "Fetching market data");

        let data = self
            .collect(subject, focus)
            .await
            .map_err(|e| e.fetch(subject, focus))?;

        Ok(DataPayload::new(self.source.name(), focus.clone(), data))
    }

    fn name(&self) -> &str {
        "market-data"
    }
}

fn needs_benchmark(focus: &FocusArea) -> bool {
    matches!(
        focus,
        FocusArea::CompetitiveAnalysis | FocusArea::RiskAssessment
    )
}

/// Metric payload for one focus area
///
/// `benchmark` pairs the benchmark symbol with its history.
pub fn focus_data(
    symbol: &str,
    focus: &FocusArea,
    bars: &[PriceBar],
    benchmark: Option<(&str, &[PriceBar])>,
) -> Value {
    let mut data = Map::new();
    data.insert("symbol".to_string(), json!(symbol));
    data.insert("focus".to_string(), json!(focus.as_str()));
    data.insert("overview".to_string(), overview(bars));

    match focus {
        FocusArea::FinancialPerformance => {
            data.insert("performance".to_string(), performance(bars));
        }
        FocusArea::CompetitiveAnalysis => {
            data.insert("performance".to_string(), performance(bars));
            if let Some((name, bench)) = benchmark {
                data.insert("relative_performance".to_string(), relative(bars, name, bench));
            }
        }
        FocusArea::GrowthProspects => {
            data.insert("momentum".to_string(), momentum(bars));
        }
        FocusArea::RiskAssessment => {
            let mut risk = risk(bars);
            if let (Some((name, bench)), Value::Object(fields)) = (benchmark, &mut risk) {
                let (asset, bench) = metrics::align_by_date(bars, bench);
                let (asset, bench) = (metrics::daily_returns(&asset), metrics::daily_returns(&bench));
                fields.insert("benchmark".to_string(), json!(name));
                fields.insert("beta".to_string(), opt(metrics::beta(&asset, &bench)));
            }
            data.insert("risk".to_string(), risk);
        }
        FocusArea::Valuation => {
            data.insert("price_levels".to_string(), price_levels(bars));
        }
        FocusArea::Custom(_) => {
            data.insert("performance".to_string(), performance(bars));
            data.insert("risk".to_string(), risk(bars));
        }
    }

    Value::Object(data)
}

/// Extend a [`focus_data`] payload with company fundamentals
///
/// Upside figures are relative to the payload's last price.
pub fn add_fundamentals(
    data: &mut Value,
    focus: &FocusArea,
    company: &CompanyFundamentals,
    assumptions: &ValuationAssumptions,
) {
    let Value::Object(fields) = data else {
        return;
    };
    let last_price = fields
        .get("overview")
        .and_then(|overview| overview.get("last_price"))
        .and_then(Value::as_f64);

    fields.insert("profile".to_string(), profile(company));
    match focus {
        FocusArea::FinancialPerformance | FocusArea::Custom(_) => {
            fields.insert("fundamentals".to_string(), financials(company));
        }
        FocusArea::GrowthProspects => {
            fields.insert("growth_rates".to_string(), growth_rates(company, last_price));
        }
        FocusArea::Valuation => {
            fields.insert("multiples".to_string(), multiples(company, last_price));
            fields.insert(
                "valuation".to_string(),
                valuation_data(company, last_price, assumptions),
            );
        }
        FocusArea::CompetitiveAnalysis | FocusArea::RiskAssessment => {}
    }
}

fn profile(company: &CompanyFundamentals) -> Value {
    json!({
        "name": company.name,
        "exchange": company.exchange,
        "sector": company.sector,
        "industry": company.industry,
        "market_cap": company.market_cap,
        "market_cap_formatted": company.market_cap.map(format_market_cap),
    })
}

fn financials(company: &CompanyFundamentals) -> Value {
    json!({
        "revenue_ttm": company.revenue_ttm,
        "revenue_growth_yoy": opt(company.revenue_growth_yoy),
        "earnings_growth_yoy": opt(company.earnings_growth_yoy),
        "profit_margin": opt(company.profit_margin),
        "operating_margin": opt(company.operating_margin),
        "return_on_equity": opt(company.return_on_equity),
        "eps": opt(company.eps),
        "book_value_per_share": opt(company.book_value_per_share),
        "free_cash_flow": company.free_cash_flow,
        "fcf_per_share": opt(company.fcf_per_share()),
    })
}

fn analyst_upside(company: &CompanyFundamentals, last_price: Option<f64>) -> Option<f64> {
    company
        .analyst_target_price
        .zip(last_price)
        .filter(|(_, price)| *price > 0.0)
        .map(|(target, price)| target / price - 1.0)
}

fn growth_rates(company: &CompanyFundamentals, last_price: Option<f64>) -> Value {
    json!({
        "revenue_growth_yoy": opt(company.revenue_growth_yoy),
        "earnings_growth_yoy": opt(company.earnings_growth_yoy),
        "analyst_target_price": opt(company.analyst_target_price),
        "analyst_upside": opt(analyst_upside(company, last_price)),
    })
}

fn multiples(company: &CompanyFundamentals, last_price: Option<f64>) -> Value {
    json!({
        "pe_ratio": opt(company.pe_ratio),
        "pe_interpretation": company.pe_ratio.map(interpret_pe),
        "forward_pe": opt(company.forward_pe),
        "price_to_book": opt(company.price_to_book),
        "dividend_yield": opt(company.dividend_yield),
        "analyst_target_price": opt(company.analyst_target_price),
        "analyst_upside": opt(analyst_upside(company, last_price)),
    })
}

fn opt(value: Option<f64>) -> Value {
    value.map_or(Value::Null, |v| json!(round4(v)))
}

fn overview(bars: &[PriceBar]) -> Value {
    let first = bars.first();
    let last = bars.last();
    json!({
        "first_date": first.map(|bar| bar.timestamp.format("%Y-%m-%d").to_string()),
        "last_date": last.map(|bar| bar.timestamp.format("%Y-%m-%d").to_string()),
        "trading_days": bars.len(),
        "last_price": opt(last.map(PriceBar::price)),
    })
}

fn performance(bars: &[PriceBar]) -> Value {
    let prices = metrics::prices(bars);
    json!({
        "return_1m": opt(metrics::period_return(&prices, ONE_MONTH)),
        "return_3m": opt(metrics::period_return(&prices, THREE_MONTHS)),
        "return_6m": opt(metrics::period_return(&prices, SIX_MONTHS)),
        "return_period": opt(metrics::total_return(&prices)),
        "avg_volume_1m": opt(metrics::average_volume(bars, ONE_MONTH)),
        "avg_volume_period": opt(metrics::average_volume(bars, bars.len())),
    })
}

fn relative(bars: &[PriceBar], name: &str, bench: &[PriceBar]) -> Value {
    let (asset, bench) = metrics::align_by_date(bars, bench);
    let asset_returns = metrics::daily_returns(&asset);
    let bench_returns = metrics::daily_returns(&bench);

    let excess = |periods: usize| {
        metrics::period_return(&asset, periods)
            .zip(metrics::period_return(&bench, periods))
            .map(|(a, b)| a - b)
    };

    json!({
        "benchmark": name,
        "excess_return_3m": opt(excess(THREE_MONTHS)),
        "excess_return_period": opt(
            metrics::total_return(&asset)
                .zip(metrics::total_return(&bench))
                .map(|(a, b)| a - b)
        ),
        "beta": opt(metrics::beta(&asset_returns, &bench_returns)),
        "correlation": opt(metrics::correlation(&asset_returns, &bench_returns)),
    })
}

fn momentum(bars: &[PriceBar]) -> Value {
    let prices = metrics::prices(bars);
    let last = prices.last().copied();
    let sma50 = metrics::sma(&prices, 50);
    let sma200 = metrics::sma(&prices, 200);

    let trend = match (last, sma50, sma200) {
        (Some(p), Some(s50), Some(s200)) if p > s50 && s50 > s200 => "uptrend",
        (Some(p), Some(s50), Some(s200)) if p < s50 && s50 < s200 => "downtrend",
        (_, Some(_), Some(_)) => "sideways",
        _ => "insufficient history",
    };

    let recent_volume = metrics::average_volume(bars, ONE_MONTH);
    let period_volume = metrics::average_volume(bars, bars.len());
    let volume_trend = recent_volume
        .zip(period_volume)
        .filter(|(_, period)| *period > 0.0)
        .map(|(recent, period)| recent / period - 1.0);

    json!({
        "return_1m": opt(metrics::period_return(&prices, ONE_MONTH)),
        "return_6m": opt(metrics::period_return(&prices, SIX_MONTHS)),
        "return_12m": opt(metrics::period_return(&prices, TRADING_DAYS_PER_YEAR)),
        "sma_50": opt(sma50),
        "sma_200": opt(sma200),
        "trend": trend,
        "volume_trend": opt(volume_trend),
    })
}

fn risk(bars: &[PriceBar]) -> Value {
    let prices = metrics::prices(bars);
    let returns = metrics::daily_returns(&prices);
    let worst_day = returns.iter().copied().fold(None, |worst: Option<f64>, r| {
        Some(worst.map_or(r, |w| w.min(r)))
    });

    json!({
        "volatility_annualized": opt(metrics::annualized_volatility(&returns)),
        "downside_deviation": opt(metrics::downside_deviation(&returns)),
        "max_drawdown": round4(metrics::max_drawdown(&prices)),
        "worst_day": opt(worst_day),
    })
}

fn price_levels(bars: &[PriceBar]) -> Value {
    let prices = metrics::prices(bars);
    let last = prices.last().copied();
    let year = &bars[bars.len().saturating_sub(TRADING_DAYS_PER_YEAR)..];
    let (high, low) = metrics::range(year).unzip();
    let sma200 = metrics::sma(&prices, 200);

    let position = match (last, high, low) {
        (Some(p), Some(h), Some(l)) if h > l => Some((p - l) / (h - l)),
        _ => None,
    };
    let ratio = |reference: Option<f64>| {
        last.zip(reference)
            .filter(|(_, r)| *r > 0.0)
            .map(|(p, r)| p / r - 1.0)
    };

    json!({
        "last_price": opt(last),
        "high_52w": opt(high),
        "low_52w": opt(low),
        "position_in_52w_range": opt(position),
        "below_52w_high": opt(ratio(high)),
        "above_52w_low": opt(ratio(low)),
        "vs_sma_200": opt(ratio(sma200)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn series(len: usize, start_price: f64, step: f64) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..len)
            .map(|i| {
                let close = start_price + step * i as f64;
                PriceBar {
                    timestamp: start + Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    adjclose: close,
                    volume: 1_000,
                }
            })
            .collect()
    }

    /// Serves fixed histories and counts calls
    struct StaticSource {
        bars: Vec<PriceBar>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(bars: Vec<PriceBar>) -> Self {
            Self {
                bars,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for StaticSource {
        async fn daily_history(&self, symbol: &str, _days: u32) -> Result<Vec<PriceBar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if symbol == "FAIL" {
                return Err(AgentError::MarketData("connection refused".to_string()));
            }
            Ok(self.bars.clone())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// Serves one company profile and counts calls
    struct StaticFundamentals {
        company: CompanyFundamentals,
        calls: AtomicUsize,
    }

    impl StaticFundamentals {
        fn new() -> Self {
            Self {
                company: CompanyFundamentals {
                    symbol: "MSFT".to_string(),
                    name: Some("Microsoft Corporation".to_string()),
                    sector: Some("TECHNOLOGY".to_string()),
                    market_cap: Some(3_100_000_000_000.0),
                    pe_ratio: Some(35.0),
                    eps: Some(1.2),
                    dividend_per_share: Some(0.5),
                    profit_margin: Some(0.36),
                    revenue_growth_yoy: Some(0.15),
                    analyst_target_price: Some(30.0),
                    free_cash_flow: Some(74_000_000_000.0),
                    shares_outstanding: Some(7_400_000_000.0),
                    ..CompanyFundamentals::default()
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FundamentalsSource for StaticFundamentals {
        async fn fundamentals(&self, symbol: &str) -> Result<CompanyFundamentals> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if symbol == "NOFUND" {
                return Err(AgentError::RateLimited("static".to_string()));
            }
            Ok(self.company.clone())
        }

        fn name(&self) -> &str {
            "static-fundamentals"
        }
    }

    #[test]
    fn test_growth_payload_detects_uptrend() {
        let bars = series(260, 100.0, 0.5);
        let data = focus_data("NVDA", &FocusArea::GrowthProspects, &bars, None);

        assert_eq!(data["symbol"], "NVDA");
        assert_eq!(data["momentum"]["trend"], "uptrend");
        assert!(data["momentum"]["return_12m"].as_f64().unwrap() > 0.0);
        assert!(data.get("risk").is_none());
    }

    #[test]
    fn test_short_history_yields_nulls() {
        let bars = series(10, 50.0, 1.0);
        let data = focus_data("ABC", &FocusArea::Valuation, &bars, None);

        assert!(data["price_levels"]["vs_sma_200"].is_null());
        assert_eq!(data["price_levels"]["last_price"], 59.0);
        assert_eq!(data["overview"]["trading_days"], 10);
    }

    #[test]
    fn test_competitive_payload_includes_benchmark() {
        let bars = series(100, 10.0, 0.2);
        let bench = series(100, 400.0, 0.5);
        let data = focus_data(
            "AMD",
            &FocusArea::CompetitiveAnalysis,
            &bars,
            Some(("SPY", &bench)),
        );

        assert_eq!(data["relative_performance"]["benchmark"], "SPY");
        assert!(data["relative_performance"]["excess_return_period"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_risk_payload() {
        let mut bars = series(30, 100.0, 1.0);
        bars[20].close = 60.0;
        bars[20].adjclose = 60.0;
        let data = focus_data("XYZ", &FocusArea::RiskAssessment, &bars, None);

        assert!(data["risk"]["max_drawdown"].as_f64().unwrap() < -0.4);
        assert!(data["risk"]["worst_day"].as_f64().unwrap() < 0.0);
        assert!(data["risk"].get("beta").is_none());
    }

    #[tokio::test]
    async fn test_fetch_uses_cache_across_focuses() {
        let source = Arc::new(StaticSource::new(series(40, 20.0, 0.1)));
        let fetcher = MarketDataFetcher::new(source.clone(), AgentsConfig::default());
        let subject = SubjectId::new("msft").unwrap();

        let first = fetcher
            .fetch(&subject, &FocusArea::FinancialPerformance)
            .await
            .unwrap();
        let second = fetcher
            .fetch(&subject, &FocusArea::Valuation)
            .await
            .unwrap();

        assert_eq!(first.source, "static");
        assert_eq!(first.focus, FocusArea::FinancialPerformance);
        assert_eq!(second.data["symbol"], "MSFT");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_maps_to_collaborator_error() {
        let fetcher = MarketDataFetcher::new(
            Arc::new(StaticSource::new(Vec::new())),
            AgentsConfig::default(),
        );
        let subject = SubjectId::new("FAIL").unwrap();

        let err = fetcher
            .fetch(&subject, &FocusArea::GrowthProspects)
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Fetch { ref subject, .. } if subject == "FAIL"));

        let empty = SubjectId::new("EMPTY").unwrap();
        let err = fetcher
            .fetch(&empty, &FocusArea::GrowthProspects)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("only 0 price bars"));
    }

    #[tokio::test]
    async fn test_financial_performance_includes_fundamentals() {
        let fundamentals = Arc::new(StaticFundamentals::new());
        let fetcher = MarketDataFetcher::new(
            Arc::new(StaticSource::new(series(40, 20.0, 0.1))),
            AgentsConfig::default(),
        )
        .with_fundamentals(fundamentals.clone());
        let subject = SubjectId::new("msft").unwrap();

        let payload = fetcher
            .fetch(&subject, &FocusArea::FinancialPerformance)
            .await
            .unwrap();

        assert_eq!(payload.data["profile"]["name"], "Microsoft Corporation");
        assert_eq!(payload.data["profile"]["market_cap_formatted"], "$3.10T");
        assert_eq!(payload.data["fundamentals"]["profit_margin"], 0.36);
        assert_eq!(payload.data["fundamentals"]["fcf_per_share"], 10.0);
        assert!(payload.data.get("performance").is_some());
        assert!(payload.data.get("valuation").is_none());

        fetcher
            .fetch(&subject, &FocusArea::GrowthProspects)
            .await
            .unwrap();
        assert_eq!(fundamentals.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valuation_includes_price_targets() {
        let fetcher = MarketDataFetcher::new(
            Arc::new(StaticSource::new(series(10, 20.0, 1.0))),
            AgentsConfig::default(),
        )
        .with_fundamentals(Arc::new(StaticFundamentals::new()));
        let subject = SubjectId::new("MSFT").unwrap();

        let payload = fetcher
            .fetch(&subject, &FocusArea::Valuation)
            .await
            .unwrap();
        let data = &payload.data;

        // last price 29, analyst target 30
        assert_eq!(data["multiples"]["analyst_upside"], 0.0345);
        assert!(
            data["multiples"]["pe_interpretation"]
                .as_str()
                .unwrap()
                .starts_with("high")
        );
        let targets = data["valuation"]["targets"].as_array().unwrap();
        assert_eq!(targets[0]["method"], "PE");
        assert_eq!(targets[0]["target_price"], 18.0);
        assert_eq!(targets[1]["method"], "DCF");
        assert_eq!(targets[1]["target_price"], 166.67);
        assert_eq!(targets[2]["method"], "DDM");
        assert_eq!(targets[2]["target_price"], 10.0);
        assert_eq!(data["valuation"]["last_price"], 29.0);
    }

    #[tokio::test]
    async fn test_fundamentals_failure_is_tolerated() {
        let fetcher = MarketDataFetcher::new(
            Arc::new(StaticSource::new(series(40, 5.0, 0.1))),
            AgentsConfig::default(),
        )
        .with_fundamentals(Arc::new(StaticFundamentals::new()));
        let subject = SubjectId::new("NOFUND").unwrap();

        let payload = fetcher
            .fetch(&subject, &FocusArea::Valuation)
            .await
            .unwrap();

        assert!(payload.data.get("profile").is_none());
        assert!(payload.data.get("valuation").is_none());
        assert!(payload.data.get("price_levels").is_some());
    }

    #[tokio::test]
    async fn test_missing_benchmark_is_tolerated() {
        let config = AgentsConfig::builder().benchmark("FAIL").build().unwrap();
        let fetcher = MarketDataFetcher::new(Arc::new(StaticSource::new(series(40, 5.0, 0.1))), config);
        let subject = SubjectId::new("IBM").unwrap();

        let payload = fetcher
            .fetch(&subject, &FocusArea::CompetitiveAnalysis)
            .await
            .unwrap();
        assert!(payload.data.get("relative_performance").is_none());
        assert!(payload.data.get("performance").is_some());
    }
}
