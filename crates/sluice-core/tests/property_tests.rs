//! Property-based tests for tranche and correlation invariants.
//!
//! - Absorbed losses sum to the pool loss (capped at the top of the stack)
//! - A tranche only absorbs once every subordinate tranche is exhausted
//! - Correlation matrices are symmetric with unit diagonal and bounded entries

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sluice_core::prelude::*;

fn three_tranche() -> TrancheSet {
    TrancheSet::new(vec![
        Tranche::new("senior", 1, dec!(0.30), dec!(1.00)),
        Tranche::new("mezzanine", 2, dec!(0.10), dec!(0.30)),
        Tranche::new("equity", 3, dec!(0.00), dec!(0.10)),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn prop_loss_allocation_conserves(bps in 0u32..=12_000) {
        let set = three_tranche();
        let loss = Decimal::from(bps) / dec!(10000);
        let total: Decimal = set.allocate_loss(loss).iter().map(|a| a.absorbed).sum();
        prop_assert_eq!(total, loss.min(set.top()));
    }

    #[test]
    fn prop_subordinate_first(bps in 0u32..=10_000) {
        let set = three_tranche();
        let loss = Decimal::from(bps) / dec!(10000);
        let allocations = set.allocate_loss(loss);
        let tranches: Vec<_> = set.iter().collect();
        for (i, a) in allocations.iter().enumerate().skip(1) {
            if a.absorbed > Decimal::ZERO {
                // every lower tranche is fully written down
                for lower in &allocations[..i] {
                    prop_assert_eq!(lower.writedown, Decimal::ONE);
                }
            }
            prop_assert!(a.absorbed <= tranches[i].width());
        }
    }

    #[test]
    fn prop_correlation_invariants(raw in proptest::collection::vec(-2.0f64..2.0, 16)) {
        let ids: Vec<ObligorId> = (0..4).map(|i| ObligorId::new(format!("O{i}"))).collect();
        let m = CorrelationMatrix::from_row_major(ids, raw).unwrap();
        for i in 0..4 {
            prop_assert_eq!(m.get(i, i), 1.0);
            for j in 0..4 {
                prop_assert_eq!(m.get(i, j), m.get(j, i));
                prop_assert!((-1.0..=1.0).contains(&m.get(i, j)));
            }
        }
    }
}
