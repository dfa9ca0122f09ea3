//! Property-based tests for the credit and tail models.

use proptest::prelude::*;

use sluice_core::ids::ObligorId;
use sluice_core::types::{CorrelationMatrix, FeatureVector, Sector};
use sluice_models::prelude::*;

fn sector() -> impl Strategy<Value = Sector> {
    (0..Sector::ALL.len()).prop_map(|i| Sector::ALL[i])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_gbdt_monotone_in_leverage(
        lo in 0.0f64..5.0,
        delta in 0.0f64..5.0,
        payment in 0.0f64..=1.0,
        sector in sector(),
        size in 3.0f64..8.0,
    ) {
        let model = GradientBoostedTrees::reference_model().unwrap();
        let base = FeatureVector::new(lo, payment, sector, size);
        let p_lo = model.score(&base).unwrap();
        let p_hi = model.score(&base.with_leverage(lo + delta)).unwrap();
        prop_assert!(p_hi >= p_lo);
    }

    #[test]
    fn prop_gbdt_antitone_in_payment_history(
        leverage in 0.0f64..5.0,
        lo in 0.0f64..=1.0,
        hi in 0.0f64..=1.0,
        sector in sector(),
    ) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let model = GradientBoostedTrees::reference_model().unwrap();
        let base = FeatureVector::new(leverage, lo, sector, 6.0);
        let worse = model.score(&base).unwrap();
        let better = model.score(&base.with_payment_history(hi)).unwrap();
        prop_assert!(better <= worse);
    }

    #[test]
    fn prop_scores_are_probabilities(
        leverage in 0.0f64..50.0,
        payment in 0.0f64..=1.0,
        sector in sector(),
        size in 0.0f64..10.0,
    ) {
        let features = FeatureVector::new(leverage, payment, sector, size);
        for scorer in [
            ScoringConfig::default().build().unwrap(),
            ScoringConfig::default().with_model(ScorerKind::Factor).build().unwrap(),
        ] {
            let p = scorer.score(&features).unwrap();
            prop_assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn prop_factor_monotone_in_leverage(
        lo in 0.0f64..10.0,
        delta in 0.0f64..10.0,
        payment in 0.0f64..=1.0,
        sector in sector(),
    ) {
        let scorer = FactorScorer::default();
        let base = FeatureVector::new(lo, payment, sector, 6.0);
        prop_assert!(
            scorer.score(&base.with_leverage(lo + delta)).unwrap() >= scorer.score(&base).unwrap()
        );
    }

    #[test]
    fn prop_student_t_tail_in_unit_interval(rho in -0.99f64..0.99, dof in 2.5f64..30.0) {
        let ids = vec![ObligorId::new("A"), ObligorId::new("B")];
        let corr = CorrelationMatrix::from_row_major(ids.clone(), vec![1.0, rho, rho, 1.0]).unwrap();
        let copula = StudentTCopula::new(dof, 16, 1).unwrap();
        let input = TailInput {
            obligors: &ids,
            default_probabilities: &[0.05, 0.05],
            exposures: &[1.0, 1.0],
            lgd: 0.6,
            correlation: &corr,
            loss_series: &[],
            confidence: 0.9,
        };
        let report = copula.tail_dependence(&input).unwrap();
        prop_assert!((0.0..=1.0).contains(&report.coefficient));
    }
}
