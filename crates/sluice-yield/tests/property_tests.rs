//! Property-based tests for the yield waterfall.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use sluice_core::types::{
    CashFlowKind, Direction, Tranche, TrancheSet, Transaction, TransactionStatus,
};
use sluice_yield::prelude::*;

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Contiguous stacks of 1-4 tranches from integer-percent cut points.
fn tranche_set() -> impl Strategy<Value = TrancheSet> {
    (
        prop::collection::btree_set(1u32..100, 0..3),
        prop::collection::vec(0u32..2000, 4),
    )
        .prop_map(|(cuts, coupons_bp)| {
            let mut points: Vec<Decimal> = vec![Decimal::ZERO];
            points.extend(cuts.into_iter().map(|c| Decimal::new(i64::from(c), 2)));
            points.push(Decimal::ONE);
            let n = points.len() - 1;
            let tranches = (0..n)
                .map(|i| {
                    Tranche::new(format!("T{i}"), (n - i) as u32, points[i], points[i + 1])
                        .with_coupon(Decimal::new(i64::from(coupons_bp[i]), 4))
                })
                .collect();
            TrancheSet::new(tranches).unwrap()
        })
}

fn transactions() -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec((1i64..5_000_000, 0u8..6, 0i64..60), 0..30).prop_map(|rows| {
        let mut txs: Vec<Transaction> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (cents, kind, day))| {
                let amount = Decimal::new(cents, 2);
                let at = start() + Duration::days(day);
                let (direction, kind, status) = match kind {
                    0 => (Direction::Inflow, CashFlowKind::Interest, TransactionStatus::Settled),
                    1 => (Direction::Inflow, CashFlowKind::Fee, TransactionStatus::Settled),
                    2 => (Direction::Inflow, CashFlowKind::Recovery, TransactionStatus::Settled),
                    3 => (Direction::Outflow, CashFlowKind::Fee, TransactionStatus::Settled),
                    4 => (Direction::Outflow, CashFlowKind::Principal, TransactionStatus::Defaulted),
                    _ => (Direction::Inflow, CashFlowKind::Interest, TransactionStatus::Pending),
                };
                Transaction::settled(format!("tx{i}"), "OBL1", at, amount, direction, kind)
                    .with_status(status)
            })
            .collect();
        txs.sort_by_key(|t| t.timestamp);
        txs
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_waterfall_conserves_cash(
        tranches in tranche_set(),
        txs in transactions(),
        days in 1i64..120,
        el in prop::option::of(0.0f64..500_000.0),
    ) {
        let period = YieldPeriod::new(start(), start() + Duration::days(days)).unwrap();
        let w = YieldEngine::default()
            .distribute(&YieldInputs {
                tranches: &tranches,
                pool_notional: dec!(1_000_000),
                transactions: &txs,
                period,
                expected_loss: el,
            })
            .unwrap();

        prop_assert_eq!(w.total_allocated() + w.reserve, w.distributable);
        prop_assert!(w.reserve >= Decimal::ZERO);
        for e in &w.entries {
            prop_assert!(e.allocated >= Decimal::ZERO);
            prop_assert!(e.allocated <= e.entitlement);
        }
        // a subordinate tranche is paid only once every senior one is whole
        for (i, e) in w.entries.iter().enumerate() {
            if e.allocated > Decimal::ZERO {
                prop_assert!(w.entries[..i].iter().all(|s| s.is_paid_in_full()));
            }
        }
        if w.reserve > Decimal::ZERO {
            prop_assert!(w.entries.iter().all(|e| e.is_paid_in_full()));
        }
    }

    #[test]
    fn prop_losses_hit_junior_first(
        tranches in tranche_set(),
        txs in transactions(),
    ) {
        let period = YieldPeriod::new(start(), start() + Duration::days(90)).unwrap();
        let w = YieldEngine::default()
            .distribute(&YieldInputs {
                tranches: &tranches,
                pool_notional: dec!(1_000_000),
                transactions: &txs,
                period,
                expected_loss: None,
            })
            .unwrap();
        let total: Decimal = w.entries.iter().map(|e| e.absorbed_loss).sum();
        prop_assert_eq!(total, w.realized_loss * dec!(1_000_000));
        // entries run senior to junior; a senior loss implies juniors are wiped out
        for (i, e) in w.entries.iter().enumerate() {
            if e.absorbed_loss > Decimal::ZERO {
                prop_assert!(w.entries[i + 1..].iter().all(|j| j.notional == Decimal::ZERO));
            }
        }
    }
}
