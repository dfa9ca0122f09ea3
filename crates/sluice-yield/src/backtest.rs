//! Historical replay of pool performance.
//!
//! The pool is marked at its notional at the start of the window. Each
//! trailing day it earns that day's distributable cash and loses that day's
//! write-offs, both relative to the previous day's value. Volatility and the
//! Sharpe ratio are annualized over 252 trading days. The total return is
//! scaled to a year by `days_in_year / period_days`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::types::Transaction;

use crate::cash::{cumulative_write_offs, distributable_cash};
use crate::config::YieldConfig;
use crate::waterfall::YieldPeriod;

const TRADING_DAYS: f64 = 252.0;

/// Everything one backtest needs.
#[derive(Debug, Clone, Copy)]
pub struct BacktestInputs<'a> {
    /// Original pool notional, the starting value.
    pub pool_notional: Decimal,
    /// Transaction history, ordered by timestamp.
    pub transactions: &'a [Transaction],
    /// End of the replay window.
    pub end: DateTime<Utc>,
    /// Days replayed.
    pub period_days: u32,
}

/// One replayed day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestPoint {
    /// Calendar day the 24-hour bucket ends on.
    pub date: NaiveDate,
    /// Pool value at the end of the day.
    pub value: f64,
    /// Return over the day.
    pub daily_return: f64,
    /// Return since the start of the window.
    pub cumulative_return: f64,
}

/// Performance summary of a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Days replayed.
    pub period_days: u32,
    /// Value at the end over value at the start, minus one.
    pub total_return: f64,
    /// Total return scaled to one year.
    pub annualized_return: f64,
    /// Annualized standard deviation of daily returns.
    pub volatility: f64,
    /// Annualized mean return over volatility; zero when volatility is zero.
    pub sharpe_ratio: f64,
    /// Worst peak-to-trough decline, zero or negative.
    pub max_drawdown: f64,
    /// Daily path, oldest first.
    pub points: Vec<BacktestPoint>,
}

/// Replays the last `period_days` days of pool cash flows.
pub fn backtest_portfolio(config: &YieldConfig, inputs: &BacktestInputs<'_>) -> AnalyticsResult<BacktestReport> {
    if inputs.pool_notional <= Decimal::ZERO {
        return Err(AnalyticsError::computation(
            "backtest",
            "pool notional must be positive",
        ));
    }
    if inputs.period_days < 2 {
        return Err(AnalyticsError::computation(
            "backtest",
            format!("need at least 2 days, got {}", inputs.period_days),
        ));
    }
    let initial = inputs
        .pool_notional
        .to_f64()
        .ok_or_else(|| AnalyticsError::computation("backtest", "notional is not representable"))?;

    let mut value = initial;
    let mut peak = initial;
    let mut max_drawdown = 0.0_f64;
    let mut points = Vec::with_capacity(inputs.period_days as usize);
    for i in 0..inputs.period_days {
        let end = inputs.end - Duration::days(i64::from(inputs.period_days - 1 - i));
        let day = YieldPeriod::new(end - Duration::days(1), end)?;
        let flows = inputs.transactions.iter().filter(|t| day.contains(t.timestamp));
        let net = distributable_cash(flows.clone()).distributable - cumulative_write_offs(flows);
        let net = net
            .to_f64()
            .ok_or_else(|| AnalyticsError::computation("backtest", "daily cash is not representable"))?;

        let daily_return = if value > 0.0 { (net / value).max(-1.0) } else { 0.0 };
        value *= 1.0 + daily_return;
        peak = peak.max(value);
        if peak > 0.0 {
            max_drawdown = max_drawdown.min(value / peak - 1.0);
        }
        points.push(BacktestPoint {
            date: end.date_naive(),
            value,
            daily_return,
            cumulative_return: value / initial - 1.0,
        });
    }

    let returns: Vec<f64> = points.iter().map(|p| p.daily_return).collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let volatility = variance.sqrt() * TRADING_DAYS.sqrt();
    let sharpe_ratio = if volatility > 0.0 {
        mean * TRADING_DAYS / volatility
    } else {
        0.0
    };
    let total_return = value / initial - 1.0;
    let annualized_return =
        total_return * f64::from(config.days_in_year) / f64::from(inputs.period_days);

    debug!(
        period_days = inputs.period_days,
        total_return,
        volatility,
        max_drawdown,
        "backtest computed"
    );
    Ok(BacktestReport {
        period_days: inputs.period_days,
        total_return,
        annualized_return,
        volatility,
        sharpe_ratio,
        max_drawdown,
        points,
    })
}
