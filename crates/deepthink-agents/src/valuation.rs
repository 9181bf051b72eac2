//! Price targets
//!
//! Three single-stage models:
//!
//! - P/E: expected EPS times a target multiple
//! - DCF: free cash flow per share capitalised at `discount - growth`
//! - DDM: dividend per share capitalised at `required return - dividend growth`
//!
//! Each model needs positive inputs and a capitalisation rate above zero;
//! otherwise it reports why it does not apply instead of a price.

use crate::error::{AgentError, Result};
use crate::fundamentals::CompanyFundamentals;
use crate::metrics::round4;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use thiserror::Error;

/// Market-level inputs the models do not take from the company
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationAssumptions {
    /// Multiple applied to EPS by the P/E model
    pub target_pe: f64,
    pub discount_rate: f64,
    /// Long-run free cash flow growth
    pub growth_rate: f64,
    pub required_return: f64,
    pub dividend_growth_rate: f64,
}

impl Default for ValuationAssumptions {
    fn default() -> Self {
        Self {
            target_pe: 15.0,
            discount_rate: 0.10,
            growth_rate: 0.04,
            required_return: 0.08,
            dividend_growth_rate: 0.03,
        }
    }
}

impl ValuationAssumptions {
    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("target_pe", self.target_pe),
            ("discount_rate", self.discount_rate),
            ("growth_rate", self.growth_rate),
            ("required_return", self.required_return),
            ("dividend_growth_rate", self.dividend_growth_rate),
        ];
        if let Some((name, _)) = rates.iter().find(|(_, value)| !value.is_finite()) {
            return Err(AgentError::Config(format!("{name} must be a finite number")));
        }
        if self.target_pe <= 0.0 {
            return Err(AgentError::Config("target_pe must be positive".to_string()));
        }
        if self.discount_rate <= self.growth_rate {
            return Err(AgentError::Config(
                "discount_rate must be greater than growth_rate".to_string(),
            ));
        }
        if self.required_return <= self.dividend_growth_rate {
            return Err(AgentError::Config(
                "required_return must be greater than dividend_growth_rate".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValuationMethod {
    #[serde(rename = "PE")]
    PriceEarnings,
    #[serde(rename = "DCF")]
    DiscountedCashFlow,
    #[serde(rename = "DDM")]
    DividendDiscount,
}

impl fmt::Display for ValuationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PriceEarnings => "PE",
            Self::DiscountedCashFlow => "DCF",
            Self::DividendDiscount => "DDM",
        })
    }
}

/// Why a model does not produce a price
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    #[error("{0} is not reported")]
    Missing(&'static str),

    #[error("{0} must be positive")]
    NonPositive(&'static str),

    #[error("{rate} must be greater than {growth}")]
    RateNotAboveGrowth {
        rate: &'static str,
        growth: &'static str,
    },
}

pub fn pe_target_price(expected_eps: f64, expected_pe: f64) -> std::result::Result<f64, ValuationError> {
    if expected_eps <= 0.0 {
        return Err(ValuationError::NonPositive("EPS"));
    }
    if expected_pe <= 0.0 {
        return Err(ValuationError::NonPositive("P/E multiple"));
    }
    Ok(expected_eps * expected_pe)
}

pub fn dcf_target_price(
    fcf_per_share: f64,
    discount_rate: f64,
    growth_rate: f64,
) -> std::result::Result<f64, ValuationError> {
    if discount_rate <= growth_rate {
        return Err(ValuationError::RateNotAboveGrowth {
            rate: "discount rate",
            growth: "growth rate",
        });
    }
    if fcf_per_share <= 0.0 {
        return Err(ValuationError::NonPositive("free cash flow per share"));
    }
    Ok(fcf_per_share / (discount_rate - growth_rate))
}

pub fn ddm_target_price(
    dividend_per_share: f64,
    required_return: f64,
    dividend_growth_rate: f64,
) -> std::result::Result<f64, ValuationError> {
    if required_return <= dividend_growth_rate {
        return Err(ValuationError::RateNotAboveGrowth {
            rate: "required return",
            growth: "dividend growth rate",
        });
    }
    if dividend_per_share <= 0.0 {
        return Err(ValuationError::NonPositive("dividend per share"));
    }
    Ok(dividend_per_share / (required_return - dividend_growth_rate))
}

/// One model applied to a company
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTarget {
    pub method: ValuationMethod,
    pub inputs: Vec<(&'static str, f64)>,
    pub outcome: std::result::Result<f64, ValuationError>,
}

impl PriceTarget {
    pub fn price(&self) -> Option<f64> {
        self.outcome.as_ref().ok().copied()
    }
}

/// Apply every model to `company`
pub fn price_targets(
    company: &CompanyFundamentals,
    assumptions: &ValuationAssumptions,
) -> Vec<PriceTarget> {
    let pe = match company.eps {
        Some(eps) => PriceTarget {
            method: ValuationMethod::PriceEarnings,
            inputs: vec![("expected_eps", eps), ("expected_pe_ratio", assumptions.target_pe)],
            outcome: pe_target_price(eps, assumptions.target_pe),
        },
        None => missing(ValuationMethod::PriceEarnings, "EPS"),
    };

    let dcf = match company.fcf_per_share() {
        Some(fcf) => PriceTarget {
            method: ValuationMethod::DiscountedCashFlow,
            inputs: vec![
                ("fcf_per_share", fcf),
                ("discount_rate", assumptions.discount_rate),
                ("growth_rate", assumptions.growth_rate),
            ],
            outcome: dcf_target_price(fcf, assumptions.discount_rate, assumptions.growth_rate),
        },
        None => missing(ValuationMethod::DiscountedCashFlow, "free cash flow per share"),
    };

    let ddm = match company.dividend_per_share {
        Some(dividend) => PriceTarget {
            method: ValuationMethod::DividendDiscount,
            inputs: vec![
                ("dividend_per_share", dividend),
                ("required_return", assumptions.required_return),
                ("dividend_growth_rate", assumptions.dividend_growth_rate),
            ],
            outcome: ddm_target_price(
                dividend,
                assumptions.required_return,
                assumptions.dividend_growth_rate,
            ),
        },
        None => missing(ValuationMethod::DividendDiscount, "dividend per share"),
    };

    vec![pe, dcf, ddm]
}

fn missing(method: ValuationMethod, input: &'static str) -> PriceTarget {
    PriceTarget {
        method,
        inputs: Vec::new(),
        outcome: Err(ValuationError::Missing(input)),
    }
}

/// Valuation section of a fetched payload
///
/// Targets are rounded to cents; upside is relative to `last_price`.
pub fn valuation_data(
    company: &CompanyFundamentals,
    last_price: Option<f64>,
    assumptions: &ValuationAssumptions,
) -> Value {
    let upside = |target: f64| {
        last_price
            .filter(|price| *price > 0.0)
            .map(|price| round4(target / price - 1.0))
    };

    let targets = price_targets(company, assumptions);
    let prices: Vec<f64> = targets.iter().filter_map(PriceTarget::price).collect();

    let entries: Vec<Value> = targets
        .iter()
        .map(|target| {
            let mut entry = Map::new();
            entry.insert("method".to_string(), json!(target.method));
            for (name, value) in &target.inputs {
                entry.insert((*name).to_string(), json!(round4(*value)));
            }
            match &target.outcome {
                Ok(price) => {
                    entry.insert("target_price".to_string(), json!(round2(*price)));
                    entry.insert("upside".to_string(), json!(upside(*price)));
                }
                Err(e) => {
                    entry.insert("not_applicable".to_string(), json!(e.to_string()));
                }
            }
            Value::Object(entry)
        })
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let average = (!prices.is_empty()).then(|| prices.iter().sum::<f64>() / prices.len() as f64);

    json!({
        "last_price": last_price,
        "targets": entries,
        "average_target": average.map(round2),
        "average_upside": average.and_then(upside),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_pe_target() {
        assert!(close(pe_target_price(5.0, 15.0).unwrap(), 75.0));
        assert_eq!(
            pe_target_price(-1.2, 15.0),
            Err(ValuationError::NonPositive("EPS"))
        );
    }

    #[test]
    fn test_dcf_target() {
        // 4.00 / (0.10 - 0.04)
        assert!(close(dcf_target_price(4.0, 0.10, 0.04).unwrap(), 66.666_666_666_666_67));
        assert!(matches!(
            dcf_target_price(4.0, 0.04, 0.04),
            Err(ValuationError::RateNotAboveGrowth { .. })
        ));
        assert!(dcf_target_price(-0.5, 0.10, 0.04).is_err());
    }

    #[test]
    fn test_ddm_target() {
        // 2.50 / (0.08 - 0.03)
        assert!(close(ddm_target_price(2.5, 0.08, 0.03).unwrap(), 50.0));
        assert!(matches!(
            ddm_target_price(2.5, 0.03, 0.05),
            Err(ValuationError::RateNotAboveGrowth { .. })
        ));
        assert_eq!(
            ddm_target_price(0.0, 0.08, 0.03),
            Err(ValuationError::NonPositive("dividend per share"))
        );
    }

    #[test]
    fn test_price_targets_skip_missing_inputs() {
        let company = CompanyFundamentals {
            symbol: "NVDA".to_string(),
            eps: Some(2.0),
            ..CompanyFundamentals::default()
        };

        let targets = price_targets(&company, &ValuationAssumptions::default());

        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].price(), Some(30.0));
        assert_eq!(
            targets[1].outcome,
            Err(ValuationError::Missing("free cash flow per share"))
        );
        assert_eq!(
            targets[2].outcome,
            Err(ValuationError::Missing("dividend per share"))
        );
    }

    #[test]
    fn test_valuation_data() {
        let company = CompanyFundamentals {
            symbol: "KO".to_string(),
            eps: Some(2.0),
            dividend_per_share: Some(2.5),
            free_cash_flow: Some(8_000_000_000.0),
            shares_outstanding: Some(4_000_000_000.0),
            ..CompanyFundamentals::default()
        };

        let data = valuation_data(&company, Some(40.0), &ValuationAssumptions::default());

        let targets = data["targets"].as_array().unwrap();
        assert_eq!(targets[0]["method"], "PE");
        assert_eq!(targets[0]["target_price"], 30.0);
        assert_eq!(targets[0]["upside"], -0.25);
        assert_eq!(targets[1]["method"], "DCF");
        assert_eq!(targets[1]["target_price"], 33.33);
        assert_eq!(targets[2]["target_price"], 50.0);
        // (30 + 33.33.. + 50) / 3
        assert_eq!(data["average_target"], 37.78);
    }

    #[test]
    fn test_valuation_data_without_price() {
        let company = CompanyFundamentals {
            eps: Some(-3.0),
            ..CompanyFundamentals::default()
        };

        let data = valuation_data(&company, None, &ValuationAssumptions::default());

        assert_eq!(data["targets"][0]["not_applicable"], "EPS must be positive");
        assert!(data["average_target"].is_null());
        assert!(data["average_upside"].is_null());
    }

    #[test]
    fn test_assumptions_validation() {
        assert!(ValuationAssumptions::default().validate().is_ok());
        let inverted = ValuationAssumptions {
            discount_rate: 0.03,
            ..ValuationAssumptions::default()
        };
        assert!(inverted.validate().is_err());
        let nan = ValuationAssumptions {
            target_pe: f64::NAN,
            ..ValuationAssumptions::default()
        };
        assert!(nan.validate().is_err());
    }
}
