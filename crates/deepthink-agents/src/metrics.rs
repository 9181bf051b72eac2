//! Price-derived metrics
//!
//! All figures are computed from daily bars. Returns and drawdowns are
//! fractions (0.12 = 12%), volatility is annualized over 252 trading days.

use crate::market::PriceBar;
use chrono::NaiveDate;
use std::collections::HashMap;

pub const TRADING_DAYS_PER_YEAR: usize = 252;
pub const ONE_MONTH: usize = 21;
pub const THREE_MONTHS: usize = 63;
pub const SIX_MONTHS: usize = 126;

/// Prices of the bars, oldest first
pub fn prices(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(PriceBar::price).collect()
}

/// Return over the last `periods` bars, `None` when the history is too short
pub fn period_return(prices: &[f64], periods: usize) -> Option<f64> {
    if periods == 0 || prices.len() <= periods {
        return None;
    }
    let last = *prices.last()?;
    let base = prices[prices.len() - 1 - periods];
    (base > 0.0).then(|| last / base - 1.0)
}

/// Return over the whole series
pub fn total_return(prices: &[f64]) -> Option<f64> {
    period_return(prices, prices.len().checked_sub(1)?)
}

/// Simple daily returns
pub fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    std_dev(returns).map(|sd| sd * (TRADING_DAYS_PER_YEAR as f64).sqrt())
}

/// Annualized deviation of the negative daily returns
pub fn downside_deviation(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let squares: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    Some((squares / returns.len() as f64).sqrt() * (TRADING_DAYS_PER_YEAR as f64).sqrt())
}

/// Largest peak-to-trough decline, as a non-positive fraction
pub fn max_drawdown(prices: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &price in prices {
        peak = peak.max(price);
        if peak > 0.0 {
            worst = worst.min(price / peak - 1.0);
        }
    }
    worst
}

/// Simple moving average of the last `window` prices
pub fn sma(prices: &[f64], window: usize) -> Option<f64> {
    if window == 0 || prices.len() < window {
        return None;
    }
    mean(&prices[prices.len() - window..])
}

/// Covariance of asset and benchmark returns over the benchmark variance
pub fn beta(asset: &[f64], benchmark: &[f64]) -> Option<f64> {
    let (a, b) = trailing_pair(asset, benchmark)?;
    let (ma, mb) = (mean(a)?, mean(b)?);
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let var: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
    (var > 0.0).then(|| cov / var)
}

pub fn correlation(asset: &[f64], benchmark: &[f64]) -> Option<f64> {
    let (a, b) = trailing_pair(asset, benchmark)?;
    let (ma, mb) = (mean(a)?, mean(b)?);
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let va: f64 = a.iter().map(|x| (x - ma).powi(2)).sum();
    let vb: f64 = b.iter().map(|y| (y - mb).powi(2)).sum();
    let denom = (va * vb).sqrt();
    (denom > 0.0).then(|| cov / denom)
}

fn trailing_pair<'a>(a: &'a [f64], b: &'a [f64]) -> Option<(&'a [f64], &'a [f64])> {
    let n = a.len().min(b.len());
    (n >= 2).then(|| (&a[a.len() - n..], &b[b.len() - n..]))
}

/// Prices of both series on the dates they share, oldest first
pub fn align_by_date(asset: &[PriceBar], benchmark: &[PriceBar]) -> (Vec<f64>, Vec<f64>) {
    let bench: HashMap<NaiveDate, f64> = benchmark
        .iter()
        .map(|bar| (bar.timestamp.date_naive(), bar.price()))
        .collect();

    asset
        .iter()
        .filter_map(|bar| {
            bench
                .get(&bar.timestamp.date_naive())
                .map(|b| (bar.price(), *b))
        })
        .unzip()
}

/// Average daily volume over the last `window` bars
pub fn average_volume(bars: &[PriceBar], window: usize) -> Option<f64> {
    let n = window.min(bars.len());
    if n == 0 {
        return None;
    }
    let total: u64 = bars[bars.len() - n..].iter().map(|bar| bar.volume).sum();
    Some(total as f64 / n as f64)
}

/// Highest high and lowest low of the bars
pub fn range(bars: &[PriceBar]) -> Option<(f64, f64)> {
    let high = bars.iter().map(|bar| bar.high).fold(f64::NAN, f64::max);
    let low = bars.iter().map(|bar| bar.low).fold(f64::NAN, f64::min);
    (high.is_finite() && low.is_finite()).then_some((high, low))
}

/// Round to four decimals for presentation
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                adjclose: close,
                volume: 1_000 * (i as u64 + 1),
            })
            .collect()
    }

    #[test]
    fn test_returns() {
        let prices = [100.0, 110.0, 99.0, 121.0];
        assert!((period_return(&prices, 1).unwrap() - (121.0 / 99.0 - 1.0)).abs() < 1e-12);
        assert!((total_return(&prices).unwrap() - 0.21).abs() < 1e-12);
        assert!(period_return(&prices, 4).is_none());
        assert_eq!(daily_returns(&prices).len(), 3);
    }

    #[test]
    fn test_max_drawdown() {
        assert!((max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]) - (-0.25)).abs() < 1e-12);
        assert!(max_drawdown(&[1.0, 2.0, 3.0]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_volatility_of_constant_series() {
        let returns = daily_returns(&[10.0, 10.0, 10.0, 10.0]);
        assert!(annualized_volatility(&returns).unwrap().abs() < 1e-12);
        assert!(annualized_volatility(&[0.01]).is_none());
    }

    #[test]
    fn test_beta_and_correlation() {
        let bench = [0.01, -0.02, 0.015, 0.005, -0.01];
        let asset: Vec<f64> = bench.iter().map(|r| r * 2.0).collect();

        assert!((beta(&asset, &bench).unwrap() - 2.0).abs() < 1e-9);
        assert!((correlation(&asset, &bench).unwrap() - 1.0).abs() < 1e-9);
        assert!(beta(&asset, &[0.0, 0.0]).is_none());
    }

    #[test]
    fn test_align_by_date_skips_missing_days() {
        let asset = bars(&[10.0, 11.0, 12.0, 13.0]);
        let mut bench = bars(&[100.0, 101.0, 102.0, 103.0]);
        bench.remove(2);

        let (a, b) = align_by_date(&asset, &bench);
        assert_eq!(a, vec![10.0, 11.0, 13.0]);
        assert_eq!(b, vec![100.0, 101.0, 103.0]);
    }

    #[test]
    fn test_sma_volume_range() {
        let series = bars(&[1.0, 2.0, 3.0, 4.0]);
        let p = prices(&series);
        assert!((sma(&p, 2).unwrap() - 3.5).abs() < f64::EPSILON);
        assert!(sma(&p, 5).is_none());
        assert!((average_volume(&series, 2).unwrap() - 3_500.0).abs() < f64::EPSILON);

        let (high, low) = range(&series).unwrap();
        assert!((high - 4.04).abs() < 1e-9);
        assert!((low - 0.99).abs() < 1e-9);
        assert!(range(&[]).is_none());
    }

    #[test]
    fn test_round4() {
        assert!((round4(0.123_456) - 0.1235).abs() < f64::EPSILON);
    }
}
