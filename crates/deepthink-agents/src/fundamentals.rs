//! Company fundamentals
//!
//! Profile, per-share figures, margins and growth rates for a symbol. The
//! Alpha Vantage client combines the `OVERVIEW` endpoint with the latest annual
//! report from `CASH_FLOW`; both answer with numbers encoded as strings, and
//! `"None"` or `"-"` for figures a company does not report.

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;

const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

/// Reported fundamentals of one company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyFundamentals {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub eps: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub dividend_per_share: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub revenue_ttm: Option<f64>,
    pub revenue_growth_yoy: Option<f64>,
    pub earnings_growth_yoy: Option<f64>,
    pub analyst_target_price: Option<f64>,
    pub beta: Option<f64>,
    /// Operating cash flow minus capital expenditures, latest fiscal year
    pub free_cash_flow: Option<f64>,
}

impl CompanyFundamentals {
    pub fn fcf_per_share(&self) -> Option<f64> {
        self.free_cash_flow
            .zip(self.shares_outstanding)
            .filter(|(_, shares)| *shares > 0.0)
            .map(|(fcf, shares)| fcf / shares)
    }
}

/// Market cap in human readable form, e.g. `$1.50T`
pub fn format_market_cap(cap: f64) -> String {
    if cap >= 1_000_000_000_000.0 {
        format!("${:.2}T", cap / 1_000_000_000_000.0)
    } else if cap >= 1_000_000_000.0 {
        format!("${:.2}B", cap / 1_000_000_000.0)
    } else if cap >= 1_000_000.0 {
        format!("${:.2}M", cap / 1_000_000.0)
    } else {
        format!("${cap:.2}")
    }
}

/// Rough reading of a trailing P/E
pub fn interpret_pe(pe: f64) -> &'static str {
    if pe < 0.0 {
        "negative (company is not profitable)"
    } else if pe < 15.0 {
        "low (potentially undervalued or slow growth)"
    } else if pe < 25.0 {
        "moderate"
    } else if pe < 50.0 {
        "high (potentially overvalued or high growth)"
    } else {
        "very high (priced for very high growth expectations)"
    }
}

/// Provider of company fundamentals
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn fundamentals(&self, symbol: &str) -> Result<CompanyFundamentals>;

    fn name(&self) -> &str;
}

/// Alpha Vantage fundamentals client
///
/// Requests share one rate limiter; the free tier allows 5 per minute.
#[derive(Debug, Clone)]
pub struct AlphaVantageFundamentals {
    client: Client,
    api_key: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl AlphaVantageFundamentals {
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Read `ALPHA_VANTAGE_API_KEY` from the environment
    pub fn from_env(requests_per_minute: u32) -> Result<Self> {
        Self::from_lookup(requests_per_minute, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        requests_per_minute: u32,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_key = lookup("ALPHA_VANTAGE_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AgentError::Config("ALPHA_VANTAGE_API_KEY environment variable not set".to_string())
            })?;
        Ok(Self::new(api_key, requests_per_minute))
    }

    async fn query(&self, function: &str, symbol: &str) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(ALPHA_VANTAGE_URL)
            .query(&[
                ("function", function),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AgentError::MarketData(format!(
                "{PROVIDER} {function} for {symbol}: HTTP {}",
                response.status()
            )));
        }

        let data: Value = response.json().await?;
        check_response(symbol, data)
    }
}

#[async_trait]
impl FundamentalsSource for AlphaVantageFundamentals {
    async fn fundamentals(&self, symbol: &str) -> Result<CompanyFundamentals> {
        let overview = self.query("OVERVIEW", symbol).await?;
        let mut fundamentals = parse_overview(symbol, &overview)?;

        // the profile is usable on its own, free cash flow only refines it
        match self.query("CASH_FLOW", symbol).await {
            Ok(cash_flow) => fundamentals.free_cash_flow = latest_free_cash_flow(&cash_flow),
            Err(e) => tracing::warn!(symbol, error = %e, "Cash flow statement unavailable"),
        }

        Ok(fundamentals)
    }

    fn name(&self) -> &str {
        "alpha-vantage"
    }
}

/// Reject error, rate-limit and empty answers
fn check_response(symbol: &str, data: Value) -> Result<Value> {
    if let Some(message) = data.get("Error Message") {
        return Err(AgentError::MarketData(format!("{PROVIDER}: {message}")));
    }
    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(AgentError::RateLimited(PROVIDER.to_string()));
    }
    if data.as_object().is_none_or(serde_json::Map::is_empty) {
        return Err(AgentError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!("{PROVIDER} returned no data"),
        });
    }
    Ok(data)
}

/// Fundamentals from an `OVERVIEW` answer
pub fn parse_overview(symbol: &str, data: &Value) -> Result<CompanyFundamentals> {
    let Some(fields) = data.as_object() else {
        return Err(AgentError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "company overview is not an object".to_string(),
        });
    };
    let text = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !is_missing(value))
            .map(str::to_string)
    };
    let num = |key: &str| number(fields.get(key));

    Ok(CompanyFundamentals {
        symbol: text("Symbol").unwrap_or_else(|| symbol.to_string()),
        name: text("Name"),
        exchange: text("Exchange"),
        sector: text("Sector"),
        industry: text("Industry"),
        market_cap: num("MarketCapitalization"),
        shares_outstanding: num("SharesOutstanding"),
        pe_ratio: num("PERatio"),
        forward_pe: num("ForwardPE"),
        price_to_book: num("PriceToBookRatio"),
        eps: num("EPS"),
        book_value_per_share: num("BookValue"),
        dividend_per_share: num("DividendPerShare"),
        dividend_yield: num("DividendYield"),
        profit_margin: num("ProfitMargin"),
        operating_margin: num("OperatingMarginTTM"),
        return_on_equity: num("ReturnOnEquityTTM"),
        revenue_ttm: num("RevenueTTM"),
        revenue_growth_yoy: num("QuarterlyRevenueGrowthYOY"),
        earnings_growth_yoy: num("QuarterlyEarningsGrowthYOY"),
        analyst_target_price: num("AnalystTargetPrice"),
        beta: num("Beta"),
        free_cash_flow: None,
    })
}

/// Free cash flow of the most recent annual report in a `CASH_FLOW` answer
pub fn latest_free_cash_flow(data: &Value) -> Option<f64> {
    let latest = data.get("annualReports")?.as_array()?.first()?;
    let operating = number(latest.get("operatingCashflow"))?;
    let capex = number(latest.get("capitalExpenditures")).unwrap_or(0.0);
    // reported as a positive outflow
    Some(operating - capex.abs())
}

fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !is_missing(s.trim()) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v: &f64| v.is_finite())
}

fn is_missing(value: &str) -> bool {
    matches!(value, "" | "None" | "-" | "N/A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overview() -> Value {
        json!({
            "Symbol": "KO",
            "Name": "Coca-Cola Company",
            "Exchange": "NYSE",
            "Sector": "CONSUMER STAPLES",
            "Industry": "BEVERAGES",
            "MarketCapitalization": "265000000000",
            "SharesOutstanding": "4310000000",
            "PERatio": "24.5",
            "ForwardPE": "21.3",
            "PriceToBookRatio": "10.1",
            "EPS": "2.47",
            "BookValue": "6.0",
            "DividendPerShare": "1.94",
            "DividendYield": "0.0315",
            "ProfitMargin": "0.234",
            "OperatingMarginTTM": "0.296",
            "ReturnOnEquityTTM": "0.41",
            "RevenueTTM": "46000000000",
            "QuarterlyRevenueGrowthYOY": "0.029",
            "QuarterlyEarningsGrowthYOY": "None",
            "AnalystTargetPrice": "70.5",
            "Beta": "-",
        })
    }

    #[test]
    fn test_parse_overview() {
        let fundamentals = parse_overview("KO", &overview()).unwrap();

        assert_eq!(fundamentals.name.as_deref(), Some("Coca-Cola Company"));
        assert_eq!(fundamentals.eps, Some(2.47));
        assert_eq!(fundamentals.dividend_per_share, Some(1.94));
        assert_eq!(fundamentals.market_cap, Some(265_000_000_000.0));
        assert!(fundamentals.earnings_growth_yoy.is_none());
        assert!(fundamentals.beta.is_none());
        assert!(fundamentals.free_cash_flow.is_none());
    }

    #[test]
    fn test_latest_free_cash_flow() {
        let cash_flow = json!({
            "symbol": "KO",
            "annualReports": [
                {"fiscalDateEnding": "2023-12-31", "operatingCashflow": "11600000000", "capitalExpenditures": "1850000000"},
                {"fiscalDateEnding": "2022-12-31", "operatingCashflow": "11018000000", "capitalExpenditures": "1484000000"},
            ]
        });
        assert_eq!(latest_free_cash_flow(&cash_flow), Some(9_750_000_000.0));
        assert_eq!(latest_free_cash_flow(&json!({"annualReports": []})), None);
    }

    #[test]
    fn test_fcf_per_share() {
        let fundamentals = CompanyFundamentals {
            free_cash_flow: Some(8_000_000_000.0),
            shares_outstanding: Some(4_000_000_000.0),
            ..CompanyFundamentals::default()
        };
        assert_eq!(fundamentals.fcf_per_share(), Some(2.0));

        let no_shares = CompanyFundamentals {
            shares_outstanding: Some(0.0),
            ..fundamentals
        };
        assert!(no_shares.fcf_per_share().is_none());
    }

    #[test]
    fn test_format_market_cap() {
        assert_eq!(format_market_cap(1_500_000_000_000.0), "$1.50T");
        assert_eq!(format_market_cap(265_000_000_000.0), "$265.00B");
        assert_eq!(format_market_cap(250_000_000.0), "$250.00M");
        assert_eq!(format_market_cap(9_500.0), "$9500.00");
    }

    #[test]
    fn test_interpret_pe() {
        assert!(interpret_pe(-5.0).starts_with("negative"));
        assert!(interpret_pe(10.0).starts_with("low"));
        assert_eq!(interpret_pe(20.0), "moderate");
        assert!(interpret_pe(35.0).starts_with("high"));
        assert!(interpret_pe(75.0).starts_with("very high"));
    }

    #[test]
    fn test_check_response() {
        assert!(matches!(
            check_response("XX", json!({"Error Message": "Invalid API call"})),
            Err(AgentError::MarketData(_))
        ));
        assert!(matches!(
            check_response("XX", json!({"Note": "Thank you for using Alpha Vantage!"})),
            Err(AgentError::RateLimited(_))
        ));
        assert!(matches!(
            check_response("XX", json!({})),
            Err(AgentError::DataUnavailable { .. })
        ));
        assert!(check_response("KO", overview()).is_ok());
    }

    #[test]
    fn test_from_lookup_requires_key() {
        assert!(matches!(
            AlphaVantageFundamentals::from_lookup(5, |_| None),
            Err(AgentError::Config(_))
        ));
        let client =
            AlphaVantageFundamentals::from_lookup(5, |_| Some("demo".to_string())).unwrap();
        assert_eq!(client.name(), "alpha-vantage");
    }

    #[tokio::test]
    #[ignore = "requires ALPHA_VANTAGE_API_KEY and network access"]
    async fn test_live_fundamentals() {
        let client = AlphaVantageFundamentals::from_env(5).unwrap();
        let fundamentals = client.fundamentals("IBM").await.unwrap();
        assert_eq!(fundamentals.symbol, "IBM");
        assert!(fundamentals.eps.is_some());
    }
}
