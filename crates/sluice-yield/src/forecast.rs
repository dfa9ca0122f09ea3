//! Short-horizon forecast of pool yield.
//!
//! Realized distributable cash is bucketed into trailing 24-hour days ending
//! at the forecast time and annualized against pool notional. A least-squares
//! trend through those daily yields is extended forward one point per day.
//! Confidence starts at 0.9 and drops by 0.01 per day ahead.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::types::Transaction;

use crate::cash::distributable_cash;
use crate::config::YieldConfig;
use crate::waterfall::YieldPeriod;

const BASE_CONFIDENCE: f64 = 0.9;
const CONFIDENCE_DECAY_PER_DAY: f64 = 0.01;

/// Everything one forecast needs.
#[derive(Debug, Clone, Copy)]
pub struct ForecastInputs<'a> {
    /// Original pool notional.
    pub pool_notional: Decimal,
    /// Transaction history, ordered by timestamp.
    pub transactions: &'a [Transaction],
    /// End of the observed history and start of the forecast.
    pub as_of: DateTime<Utc>,
    /// Days to forecast.
    pub days_ahead: u32,
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Calendar day of the prediction.
    pub date: NaiveDate,
    /// Predicted annualized pool yield, never negative.
    pub predicted_apy: f64,
    /// Confidence in `[0, 0.9]`, falling with distance.
    pub confidence: f64,
}

/// Forecast over the requested horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldForecast {
    /// When the forecast was anchored.
    pub as_of: DateTime<Utc>,
    /// Days of history the trend was fitted on.
    pub lookback_days: u32,
    /// Mean realized yield over the lookback.
    pub trailing_apy: f64,
    /// Fitted change in yield per day.
    pub trend_per_day: f64,
    /// One point per day ahead.
    pub points: Vec<ForecastPoint>,
    /// Mean predicted yield.
    pub average: f64,
    /// Lowest and highest predicted yield.
    pub range: (f64, f64),
}

/// Forecasts annualized pool yield `days_ahead` days past `as_of`.
pub fn forecast_yield(config: &YieldConfig, inputs: &ForecastInputs<'_>) -> AnalyticsResult<YieldForecast> {
    if inputs.pool_notional <= Decimal::ZERO {
        return Err(AnalyticsError::computation(
            "yield.forecast",
            "pool notional must be positive",
        ));
    }
    if inputs.days_ahead == 0 {
        return Err(AnalyticsError::computation(
            "yield.forecast",
            "forecast horizon must be at least one day",
        ));
    }

    let lookback = config.forecast_lookback_days;
    let history = daily_yields(config, inputs, lookback)?;
    let (intercept, slope) = linear_trend(&history)?;

    let n = history.len() as f64;
    let points: Vec<ForecastPoint> = (0..inputs.days_ahead)
        .map(|day| {
            let t = n + f64::from(day);
            ForecastPoint {
                date: (inputs.as_of + Duration::days(i64::from(day))).date_naive(),
                predicted_apy: (intercept + slope * t).max(0.0),
                confidence: (BASE_CONFIDENCE - CONFIDENCE_DECAY_PER_DAY * f64::from(day)).max(0.0),
            }
        })
        .collect();

    let predictions: Vec<f64> = points.iter().map(|p| p.predicted_apy).collect();
    let average = predictions.iter().sum::<f64>() / predictions.len() as f64;
    let range = predictions
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    let trailing_apy = history.iter().sum::<f64>() / n;

    debug!(
        lookback,
        days_ahead = inputs.days_ahead,
        trailing_apy,
        trend_per_day = slope,
        "yield forecast computed"
    );
    Ok(YieldForecast {
        as_of: inputs.as_of,
        lookback_days: lookback,
        trailing_apy,
        trend_per_day: slope,
        points,
        average,
        range,
    })
}

/// Annualized distributable cash per trailing day, oldest first.
fn daily_yields(
    config: &YieldConfig,
    inputs: &ForecastInputs<'_>,
    lookback: u32,
) -> AnalyticsResult<Vec<f64>> {
    let annualizer = Decimal::from(config.days_in_year) / inputs.pool_notional;
    (0..lookback)
        .map(|i| {
            let end = inputs.as_of - Duration::days(i64::from(lookback - 1 - i));
            let day = YieldPeriod::new(end - Duration::days(1), end)?;
            let cash = distributable_cash(
                inputs
                    .transactions
                    .iter()
                    .filter(|t| day.contains(t.timestamp)),
            );
            (cash.distributable * annualizer).to_f64().ok_or_else(|| {
                AnalyticsError::computation("yield.forecast", "daily yield is not representable")
            })
        })
        .collect()
}

/// Ordinary least-squares `(intercept, slope)` of `values` against `0..n`.
fn linear_trend(values: &[f64]) -> AnalyticsResult<(f64, f64)> {
    if values.len() < 2 {
        return Err(AnalyticsError::computation(
            "yield.forecast",
            format!("need at least 2 days of history, got {}", values.len()),
        ));
    }
    let n = values.len() as f64;
    let t_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;
    let (sxy, sxx) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxy, sxx), (t, y)| {
            let dt = t as f64 - t_mean;
            (sxy + dt * (y - y_mean), sxx + dt * dt)
        });
    let slope = sxy / sxx;
    Ok((y_mean - slope * t_mean, slope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;
    use sluice_core::types::{CashFlowKind, Direction};

    fn as_of() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn interest(i: i64, amount: Decimal) -> Transaction {
        Transaction::settled(
            format!("tx{i}"),
            "OBL1",
            as_of() - Duration::days(i) + Duration::hours(1),
            amount,
            Direction::Inflow,
            CashFlowKind::Interest,
        )
    }

    fn inputs(transactions: &[Transaction], days_ahead: u32) -> ForecastInputs<'_> {
        ForecastInputs {
            pool_notional: dec!(365_000),
            transactions,
            as_of: as_of(),
            days_ahead,
        }
    }

    #[test]
    fn test_flat_history_forecasts_flat() {
        // 10 a day on 365k is a 1% annual yield
        let mut txs: Vec<Transaction> = (1..=30).map(|i| interest(i, dec!(10))).collect();
        txs.reverse();
        let config = YieldConfig::default();
        let forecast = forecast_yield(&config, &inputs(&txs, 30)).unwrap();

        assert_eq!(forecast.points.len(), 30);
        assert_relative_eq!(forecast.trailing_apy, 0.01, epsilon = 1e-12);
        assert_relative_eq!(forecast.trend_per_day, 0.0, epsilon = 1e-12);
        assert_relative_eq!(forecast.average, 0.01, epsilon = 1e-12);
        assert_relative_eq!(forecast.range.0, forecast.range.1, epsilon = 1e-12);
        assert_eq!(forecast.points[0].date, as_of().date_naive());
    }

    #[test]
    fn test_confidence_decays() {
        let config = YieldConfig::default();
        let forecast = forecast_yield(&config, &inputs(&[], 100)).unwrap();
        assert_relative_eq!(forecast.points[0].confidence, 0.9);
        assert_relative_eq!(forecast.points[10].confidence, 0.8, epsilon = 1e-12);
        assert_eq!(forecast.points[99].confidence, 0.0);
        assert!(forecast.points.iter().all(|p| p.predicted_apy == 0.0));
    }

    #[test]
    fn test_rising_cash_extends_trend() {
        // day i before as_of pays 40 - i, so yield rises toward as_of
        let mut txs: Vec<Transaction> = (1..=30)
            .map(|i| interest(i, Decimal::from(40 - i)))
            .collect();
        txs.reverse();
        let config = YieldConfig::default();
        let forecast = forecast_yield(&config, &inputs(&txs, 5)).unwrap();

        // one unit of cash a day on 365k annualizes to 0.001
        assert_relative_eq!(forecast.trend_per_day, 0.001, epsilon = 1e-9);
        assert!(forecast.points[4].predicted_apy > forecast.points[0].predicted_apy);
        assert!(forecast.points[0].predicted_apy > forecast.trailing_apy);
        assert_relative_eq!(forecast.range.1, forecast.points[4].predicted_apy);
    }

    #[test]
    fn test_falling_trend_floors_at_zero() {
        let mut txs: Vec<Transaction> = (1..=30)
            .map(|i| interest(i, Decimal::from(i * 10)))
            .collect();
        txs.reverse();
        let config = YieldConfig::default();
        let forecast = forecast_yield(&config, &inputs(&txs, 30)).unwrap();
        assert!(forecast.trend_per_day < 0.0);
        assert_eq!(forecast.range.0, 0.0);
        assert!(forecast.points.iter().all(|p| p.predicted_apy >= 0.0));
    }

    #[test]
    fn test_invalid_inputs() {
        let config = YieldConfig::default();
        assert!(forecast_yield(&config, &inputs(&[], 0)).is_err());
        let mut bad = inputs(&[], 5);
        bad.pool_notional = Decimal::ZERO;
        assert!(forecast_yield(&config, &bad).is_err());
    }
}
