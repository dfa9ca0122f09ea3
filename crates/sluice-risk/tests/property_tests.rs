//! Property-based tests for pool risk metrics.

use proptest::prelude::*;

use sluice_core::ids::ObligorId;
use sluice_core::types::{CorrelationMatrix, Sector};
use sluice_risk::prelude::*;

fn positions() -> impl Strategy<Value = Vec<PoolPosition>> {
    prop::collection::vec((1.0f64..1_000_000.0, 0.0f64..0.5, 0..Sector::ALL.len()), 1..25)
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (exposure, pd, s))| {
                    PoolPosition::new(format!("OBL{i:03}"), Sector::ALL[s], exposure, pd)
                })
                .collect()
        })
}

fn scenario() -> impl Strategy<Value = StressScenario> {
    prop_oneof![
        Just(standard::largest_obligor_default()),
        (0.0f64..=1.0).prop_map(|f| StressScenario::new(
            "shock",
            StressKind::SystemicDefaultShock { fraction: f }
        )),
        (0.0f64..5.0, prop::option::of(0.0f64..=1.0)).prop_map(|(m, r)| StressScenario::new(
            "multiplier",
            StressKind::PdMultiplier {
                multiplier: m,
                recovery_rate: r,
                sectors: Vec::new(),
            }
        )),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_hhi_bounds(positions in positions()) {
        let report = concentration(&positions).unwrap();
        let n = positions.len() as f64;
        prop_assert!(report.hhi >= 1.0 / n - 1e-12);
        prop_assert!(report.hhi <= 1.0 + 1e-12);
        prop_assert!((0.0..=1.0).contains(&report.normalized_hhi));
        prop_assert!(report.top5_share <= 1.0 + 1e-9);
        let sector_total: f64 = report.sector_shares.values().sum();
        prop_assert!((sector_total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prop_historical_var_monotone(
        returns in prop::collection::vec(-0.2f64..0.2, 2..200),
        value in 1.0f64..1e7,
    ) {
        let out = historical_var(&returns, value, &[0.9, 0.95, 0.99], 1).unwrap();
        for pair in out.windows(2) {
            prop_assert!(pair[1].var >= pair[0].var);
            prop_assert!(pair[1].expected_shortfall >= pair[0].expected_shortfall);
        }
        for v in &out {
            prop_assert!(v.expected_shortfall >= v.var - 1e-9);
        }
    }

    #[test]
    fn prop_parametric_var_monotone(
        vols in prop::collection::vec(0.0f64..0.1, 3),
        rho in -0.4f64..0.9,
    ) {
        let ids: Vec<ObligorId> = (0..3).map(|i| ObligorId::new(format!("O{i}"))).collect();
        let corr = CorrelationMatrix::from_row_major(
            ids,
            vec![1.0, rho, rho, rho, 1.0, rho, rho, rho, 1.0],
        ).unwrap();
        let w = [0.5, 0.3, 0.2];
        if let Ok(out) = parametric_var(&w, &vols, &corr, 1e6, &[0.95, 0.99], 1) {
            prop_assert!(out[1].var >= out[0].var);
        }
    }

    #[test]
    fn prop_adverse_stress_never_below_baseline(
        positions in positions(),
        scenario in scenario(),
    ) {
        let outcome = scenario.apply(&positions, 0.4).unwrap();
        prop_assert!(outcome.stressed_loss >= outcome.baseline_expected_loss - 1e-9);
        for (stressed, base) in outcome.positions.iter().zip(&positions) {
            prop_assert!(stressed.pd >= base.pd);
            prop_assert!((0.0..=1.0).contains(&stressed.pd));
        }
    }
}
