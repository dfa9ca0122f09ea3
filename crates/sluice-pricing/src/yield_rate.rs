//! Pool yield-rate input for the accrual term.

use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::types::{CashFlowKind, Direction, Transaction};

/// Annualized yield of the pool over a trailing window.
///
/// Sums settled interest and fee inflows in `transactions` (already limited
/// to the window by the caller), divides by pool notional and scales to a
/// 365-day year.
pub fn trailing_yield_rate<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    notional: Decimal,
    window: Duration,
) -> AnalyticsResult<f64> {
    if notional <= Decimal::ZERO {
        return Err(AnalyticsError::computation(
            "yield_rate",
            "pool notional must be positive",
        ));
    }
    let days = window.num_seconds() as f64 / 86_400.0;
    if days <= 0.0 {
        return Err(AnalyticsError::computation(
            "yield_rate",
            "yield window must be positive",
        ));
    }

    let income: Decimal = transactions
        .into_iter()
        .filter(|t| {
            t.is_settled()
                && t.direction == Direction::Inflow
                && matches!(t.kind, CashFlowKind::Interest | CashFlowKind::Fee)
        })
        .map(|t| t.amount)
        .sum();

    let period_rate = (income / notional)
        .to_f64()
        .ok_or_else(|| AnalyticsError::computation("yield_rate", "rate overflow"))?;
    Ok(period_rate * 365.0 / days)
}
