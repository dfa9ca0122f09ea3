//! Senior-first distribution of pool cash across tranches.
//!
//! Each period the engine
//! 1. derives distributable cash from settled flows inside the period,
//! 2. writes realized losses down from the most subordinate tranche upward,
//! 3. pays each tranche its coupon entitlement on the remaining notional,
//!    most senior first, until cash runs out,
//! 4. sends whatever is left to the protocol reserve.
//!
//! Amounts are [`Decimal`] throughout so that `Σ allocated + reserve` equals
//! the distributable cash exactly.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::ids::TrancheId;
use sluice_core::types::{TrancheSet, Transaction};
use sluice_core::validation::Validate;

use crate::cash::{cumulative_write_offs, distributable_cash};
use crate::config::YieldConfig;

const SECONDS_PER_DAY: i64 = 86_400;

/// Half-open distribution period `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldPeriod {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end.
    pub end: DateTime<Utc>,
}

impl YieldPeriod {
    /// Creates a period; `end` must be after `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AnalyticsResult<Self> {
        if end <= start {
            return Err(AnalyticsError::computation(
                "yield.period",
                format!("period end {end} is not after start {start}"),
            ));
        }
        Ok(Self { start, end })
    }

    /// Period length in (fractional) days.
    #[must_use]
    pub fn days(&self) -> Decimal {
        Decimal::from((self.end - self.start).num_seconds()) / Decimal::from(SECONDS_PER_DAY)
    }

    /// Actual days over `days_in_year`.
    #[must_use]
    pub fn year_fraction(&self, days_in_year: u32) -> Decimal {
        self.days() / Decimal::from(days_in_year)
    }

    /// Whether `at` falls inside the period.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// One tranche's line in the waterfall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheAllocation {
    /// Tranche identifier.
    pub tranche_id: TrancheId,
    /// Cash paid to the tranche this period.
    pub allocated: Decimal,
    /// Coupon owed for the period.
    pub entitlement: Decimal,
    /// Current notional after realized losses.
    pub notional: Decimal,
    /// Annualized `allocated / notional`.
    pub realized_apy: f64,
    /// Expected credit loss landing on this tranche, in cash.
    pub expected_loss: f64,
    /// `realized_apy` minus the expected-loss rate.
    pub risk_adjusted_apy: f64,
    /// Realized loss written off this tranche so far, in cash.
    pub absorbed_loss: Decimal,
}

impl TrancheAllocation {
    /// Whether the full entitlement was paid.
    #[must_use]
    pub fn is_paid_in_full(&self) -> bool {
        self.allocated == self.entitlement
    }

    /// Entitlement left unpaid.
    #[must_use]
    pub fn shortfall(&self) -> Decimal {
        self.entitlement - self.allocated
    }
}

/// Result of one distribution period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldWaterfall {
    /// Distribution period.
    pub period: YieldPeriod,
    /// Cash available for distribution.
    pub distributable: Decimal,
    /// Residual sent to the protocol reserve, never negative.
    pub reserve: Decimal,
    /// Cumulative realized loss as a fraction of pool notional.
    pub realized_loss: Decimal,
    /// Allocations, most senior first.
    pub entries: Vec<TrancheAllocation>,
}

impl YieldWaterfall {
    /// Allocation for one tranche.
    #[must_use]
    pub fn entry(&self, id: &TrancheId) -> Option<&TrancheAllocation> {
        self.entries.iter().find(|e| &e.tranche_id == id)
    }

    /// Cash paid to tranches.
    #[must_use]
    pub fn total_allocated(&self) -> Decimal {
        self.entries.iter().map(|e| e.allocated).sum()
    }

    /// `Σ allocated + reserve == distributable`.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.total_allocated() + self.reserve == self.distributable
    }
}

/// Everything one distribution needs.
#[derive(Debug, Clone, Copy)]
pub struct YieldInputs<'a> {
    /// Validated tranche stack.
    pub tranches: &'a TrancheSet,
    /// Original pool notional.
    pub pool_notional: Decimal,
    /// Transaction history, ordered by timestamp.
    pub transactions: &'a [Transaction],
    /// Distribution period.
    pub period: YieldPeriod,
    /// Pool expected loss from the latest risk report, in cash.
    pub expected_loss: Option<f64>,
}

/// Computes waterfalls.
#[derive(Debug, Clone, Default)]
pub struct YieldEngine {
    config: YieldConfig,
}

impl YieldEngine {
    /// Creates an engine.
    pub fn new(config: YieldConfig) -> AnalyticsResult<Self> {
        config.ensure_valid()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &YieldConfig {
        &self.config
    }

    /// Runs the waterfall for one period.
    pub fn distribute(&self, inputs: &YieldInputs<'_>) -> AnalyticsResult<YieldWaterfall> {
        if inputs.pool_notional <= Decimal::ZERO {
            return Err(AnalyticsError::computation(
                "yield",
                "pool notional must be positive",
            ));
        }
        let period = inputs.period;
        let cash = distributable_cash(
            inputs
                .transactions
                .iter()
                .filter(|t| period.contains(t.timestamp)),
        );
        let write_offs =
            cumulative_write_offs(inputs.transactions.iter().filter(|t| t.timestamp < period.end));
        let realized_loss = (write_offs / inputs.pool_notional).min(Decimal::ONE);

        let year_fraction = period.year_fraction(self.config.days_in_year);
        let yf = year_fraction.to_f64().unwrap_or(0.0);
        let el_fraction = match inputs.expected_loss {
            Some(el) if el.is_finite() && el > 0.0 => Decimal::from_f64(el)
                .map(|el| (el / inputs.pool_notional).round_dp(12))
                .ok_or_else(|| {
                    AnalyticsError::computation("yield.expected_loss", format!("{el} is not representable"))
                })?,
            _ => Decimal::ZERO,
        };
        let stressed_loss = (realized_loss + el_fraction).min(Decimal::ONE);

        let mut remaining = cash.distributable;
        let mut entries = Vec::with_capacity(inputs.tranches.len());
        for tranche in inputs.tranches.by_seniority() {
            let absorbed = tranche.absorbed_loss(realized_loss);
            let notional = (tranche.width() - absorbed) * inputs.pool_notional;
            let entitlement = (notional * tranche.coupon_rate * year_fraction)
                .round_dp(self.config.cash_scale)
                .max(Decimal::ZERO);
            let allocated = entitlement.min(remaining);
            remaining -= allocated;

            let (realized_apy, expected_loss, el_rate) = if notional > Decimal::ZERO {
                let period_return = (allocated / notional).to_f64().unwrap_or(0.0);
                let el = (tranche.absorbed_loss(stressed_loss) - absorbed) * inputs.pool_notional;
                (
                    self.config.apy_convention.annualize(period_return, yf),
                    el.to_f64().unwrap_or(0.0),
                    (el / notional).to_f64().unwrap_or(0.0),
                )
            } else {
                (0.0, 0.0, 0.0)
            };

            entries.push(TrancheAllocation {
                tranche_id: tranche.id.clone(),
                allocated,
                entitlement,
                notional,
                realized_apy,
                expected_loss,
                risk_adjusted_apy: realized_apy - el_rate,
                absorbed_loss: absorbed * inputs.pool_notional,
            });
        }

        let waterfall = YieldWaterfall {
            period,
            distributable: cash.distributable,
            reserve: remaining,
            realized_loss,
            entries,
        };
        if !waterfall.is_balanced() || waterfall.reserve < Decimal::ZERO {
            return Err(AnalyticsError::computation(
                "yield.reconciliation",
                format!(
                    "allocated {} + reserve {} != distributable {}",
                    waterfall.total_allocated(),
                    waterfall.reserve,
                    waterfall.distributable
                ),
            ));
        }
        debug!(
            distributable = %waterfall.distributable,
            reserve = %waterfall.reserve,
            realized_loss = %realized_loss,
            "waterfall computed"
        );
        Ok(waterfall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use sluice_core::types::{CashFlowKind, Direction, Tranche, TransactionStatus};

    use crate::config::ApyConvention;

    fn tranches() -> TrancheSet {
        TrancheSet::new(vec![
            Tranche::new("senior", 1, dec!(0.3), dec!(1.0)).with_coupon(dec!(0.05)),
            Tranche::new("mezzanine", 2, dec!(0.1), dec!(0.3)).with_coupon(dec!(0.08)),
            Tranche::new("equity", 3, dec!(0.0), dec!(0.1)).with_coupon(dec!(0.15)),
        ])
        .unwrap()
    }

    fn period() -> YieldPeriod {
        let start = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        YieldPeriod::new(start, start + Duration::days(73)).unwrap()
    }

    fn interest(id: &str, at: DateTime<Utc>, amount: Decimal) -> Transaction {
        Transaction::settled(id, "OBL1", at, amount, Direction::Inflow, CashFlowKind::Interest)
    }

    fn run(transactions: &[Transaction], expected_loss: Option<f64>) -> YieldWaterfall {
        let tranches = tranches();
        let engine = YieldEngine::new(YieldConfig::default()).unwrap();
        engine
            .distribute(&YieldInputs {
                tranches: &tranches,
                pool_notional: dec!(1_000_000),
                transactions,
                period: period(),
                expected_loss,
            })
            .unwrap()
    }

    #[test]
    fn test_period() {
        assert_eq!(period().year_fraction(365), dec!(0.2));
        let start = period().start;
        assert!(YieldPeriod::new(start, start).is_err());
    }

    #[test]
    fn test_senior_first() {
        // entitlements: senior 7000, mezzanine 3200, equity 3000
        let txs = vec![interest("1", period().start, dec!(12000))];
        let w = run(&txs, None);
        assert_eq!(w.entries[0].tranche_id, TrancheId::new("senior"));
        assert_eq!(w.entries[0].allocated, dec!(7000));
        assert_eq!(w.entries[1].allocated, dec!(3200));
        assert_eq!(w.entries[2].allocated, dec!(1800));
        assert_eq!(w.entries[2].shortfall(), dec!(1200));
        assert_eq!(w.reserve, Decimal::ZERO);
        assert!(w.is_balanced());
    }

    #[test]
    fn test_residual_to_reserve() {
        let txs = vec![interest("1", period().start, dec!(15000))];
        let w = run(&txs, None);
        assert!(w.entries.iter().all(TrancheAllocation::is_paid_in_full));
        assert_eq!(w.reserve, dec!(1800));
        // 1% over a fifth of a year, compounded
        assert_relative_eq!(w.entries[0].realized_apy, 1.01f64.powi(5) - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cash_outside_period_ignored() {
        let p = period();
        let txs = vec![
            interest("1", p.start - Duration::days(1), dec!(5000)),
            interest("2", p.end, dec!(5000)),
        ];
        let w = run(&txs, None);
        assert_eq!(w.distributable, Decimal::ZERO);
        assert_eq!(w.total_allocated(), Decimal::ZERO);
    }

    #[test]
    fn test_loss_cascade_reduces_notional() {
        let p = period();
        let txs = vec![
            Transaction::settled(
                "d1",
                "OBL2",
                p.start - Duration::days(10),
                dec!(60000),
                Direction::Outflow,
                CashFlowKind::Principal,
            )
            .with_status(TransactionStatus::Defaulted),
            Transaction::settled(
                "r1",
                "OBL2",
                p.start - Duration::days(5),
                dec!(10000),
                Direction::Inflow,
                CashFlowKind::Recovery,
            ),
            interest("1", p.start, dec!(20000)),
        ];
        let w = run(&txs, None);
        assert_eq!(w.realized_loss, dec!(0.06));
        let equity = w.entry(&TrancheId::new("equity")).unwrap();
        assert_eq!(equity.notional, dec!(40000));
        assert_eq!(equity.absorbed_loss, dec!(60000));
        assert_eq!(equity.entitlement, dec!(1200));
        assert_eq!(w.entry(&TrancheId::new("mezzanine")).unwrap().absorbed_loss, Decimal::ZERO);
    }

    #[test]
    fn test_recovery_distributed_not_netted() {
        let p = period();
        let txs = vec![
            Transaction::settled(
                "d1",
                "OBL2",
                p.start - Duration::days(10),
                dec!(60000),
                Direction::Outflow,
                CashFlowKind::Principal,
            )
            .with_status(TransactionStatus::Defaulted),
            interest("1", p.start, dec!(9000)),
            Transaction::settled(
                "r1",
                "OBL2",
                p.start + Duration::days(5),
                dec!(6000),
                Direction::Inflow,
                CashFlowKind::Recovery,
            ),
        ];
        let w = run(&txs, None);
        // the recovery is cash this period and leaves the loss cascade untouched
        assert_eq!(w.distributable, dec!(15000));
        assert_eq!(w.realized_loss, dec!(0.06));
        // entitlements: senior 7000, mezzanine 3200, equity 1200 on 40000
        assert_eq!(w.entries[0].allocated, dec!(7000));
        assert_eq!(w.entries[1].allocated, dec!(3200));
        assert_eq!(w.entries[2].allocated, dec!(1200));
        assert_eq!(w.reserve, dec!(3600));
        assert_eq!(w.total_allocated() + w.reserve, w.distributable);
        assert!(w.is_balanced());
    }

    #[test]
    fn test_risk_adjusted_apy() {
        let txs = vec![interest("1", period().start, dec!(15000))];
        let w = run(&txs, Some(27_000.0));
        let equity = w.entry(&TrancheId::new("equity")).unwrap();
        assert_relative_eq!(equity.expected_loss, 27_000.0, epsilon = 1e-6);
        assert_relative_eq!(equity.risk_adjusted_apy, equity.realized_apy - 0.27, epsilon = 1e-9);
        let senior = w.entry(&TrancheId::new("senior")).unwrap();
        assert_eq!(senior.expected_loss, 0.0);
        assert_relative_eq!(senior.risk_adjusted_apy, senior.realized_apy);
    }

    #[test]
    fn test_simple_convention() {
        let tranches = tranches();
        let engine = YieldEngine::new(
            YieldConfig::default().with_apy_convention(ApyConvention::Simple),
        )
        .unwrap();
        let txs = vec![interest("1", period().start, dec!(15000))];
        let w = engine
            .distribute(&YieldInputs {
                tranches: &tranches,
                pool_notional: dec!(1_000_000),
                transactions: &txs,
                period: period(),
                expected_loss: None,
            })
            .unwrap();
        assert_relative_eq!(w.entries[0].realized_apy, 0.05, epsilon = 1e-12);
        assert_relative_eq!(w.entries[2].realized_apy, 0.15, epsilon = 1e-12);
    }
}
