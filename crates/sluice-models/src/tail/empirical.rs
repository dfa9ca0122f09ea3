//! Non-parametric tail dependence from historical series.
//!
//! For a tail fraction `q` over `n` aligned observations, `k = ⌊q·n⌋` and
//! the upper-tail coefficient of a pair is the share of the `k` largest
//! observations of one series that coincide with the `k` largest of the
//! other. Ranks come from pseudo-observations, so the estimate is invariant
//! to monotone transforms of either series.

use tracing::{debug, warn};

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_math::error::MathError;
use sluice_math::statistics::{pearson, pseudo_observations};

use super::{
    JointLossEstimate, LossDistribution, PairDependence, TailDependenceModel, TailDependenceReport,
    TailInput,
};
use crate::math_error;

/// Empirical upper-tail dependence estimator.
#[derive(Debug, Clone)]
pub struct EmpiricalTailDependence {
    tail_fraction: f64,
}

impl EmpiricalTailDependence {
    /// Creates an estimator with `tail_fraction` in `(0, 1)`.
    pub fn new(tail_fraction: f64) -> AnalyticsResult<Self> {
        if !(tail_fraction > 0.0 && tail_fraction < 1.0) {
            return Err(AnalyticsError::configuration(
                "tail.tail_fraction",
                format!("must lie in (0, 1), got {tail_fraction}"),
            ));
        }
        Ok(Self { tail_fraction })
    }

    /// Validated series length and tail size.
    fn dimensions(&self, input: &TailInput<'_>) -> AnalyticsResult<(usize, usize)> {
        if input.loss_series.len() != input.obligors.len() {
            return Err(AnalyticsError::computation(
                "tail_dependence",
                format!(
                    "{} series for {} obligors",
                    input.loss_series.len(),
                    input.obligors.len()
                ),
            ));
        }
        let m = input.loss_series.first().map_or(0, Vec::len);
        if input.loss_series.iter().any(|s| s.len() != m) {
            return Err(AnalyticsError::computation(
                "tail_dependence",
                "series are not aligned",
            ));
        }
        let k = (self.tail_fraction * m as f64).floor() as usize;
        if k < 1 {
            return Err(AnalyticsError::computation(
                "tail_dependence",
                format!(
                    "{m} observations leave no tail at fraction {}",
                    self.tail_fraction
                ),
            ));
        }
        Ok((m, k))
    }
}

/// Marks the `k` largest observations of a series.
fn upper_tail(series: &[f64], k: usize) -> Vec<bool> {
    let m = series.len();
    let cutoff = (m - k) as f64 / (m + 1) as f64;
    pseudo_observations(series)
        .into_iter()
        .map(|u| u > cutoff)
        .collect()
}

impl TailDependenceModel for EmpiricalTailDependence {
    fn name(&self) -> &str {
        "empirical"
    }

    fn tail_dependence(&self, input: &TailInput<'_>) -> AnalyticsResult<TailDependenceReport> {
        input.check()?;
        let (_, k) = self.dimensions(input)?;
        let tails: Vec<Vec<bool>> = input
            .loss_series
            .iter()
            .map(|s| upper_tail(s, k))
            .collect();

        let n = input.obligors.len();
        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                let joint = tails[i]
                    .iter()
                    .zip(&tails[j])
                    .filter(|(a, b)| **a && **b)
                    .count();
                let linear = match pearson(&input.loss_series[i], &input.loss_series[j]) {
                    Ok(r) => r,
                    Err(MathError::DivisionByZero { .. }) => 0.0,
                    Err(e) => return Err(math_error("pearson")(e)),
                };
                pairs.push(PairDependence {
                    a: input.obligors[i].clone(),
                    b: input.obligors[j].clone(),
                    pearson: linear,
                    tail: joint as f64 / k as f64,
                });
            }
        }

        let joint_loss = match self
            .loss_distribution(input)
            .and_then(|d| JointLossEstimate::from_distribution(&d, input.confidence))
        {
            Ok(estimate) => Some(estimate),
            Err(e) => {
                warn!(error = %e, "empirical joint loss unavailable");
                None
            }
        };

        debug!(pairs = pairs.len(), k, "empirical tail dependence estimated");
        Ok(TailDependenceReport::new(self.name(), pairs, joint_loss))
    }

    fn loss_distribution(&self, input: &TailInput<'_>) -> AnalyticsResult<LossDistribution> {
        input.check()?;
        let (m, _) = self.dimensions(input)?;
        let ranks: Vec<Vec<f64>> = input
            .loss_series
            .iter()
            .map(|s| pseudo_observations(s))
            .collect();

        // observation t defaults obligor i when its rank is in the top PD_i share
        let losses = (0..m)
            .map(|t| {
                ranks
                    .iter()
                    .zip(input.default_probabilities)
                    .zip(input.exposures)
                    .filter(|((u, pd), _)| u[t] > 1.0 - **pd)
                    .map(|(_, exposure)| exposure * input.lgd)
                    .sum::<f64>()
            })
            .collect();
        LossDistribution::from_samples(losses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sluice_core::ids::ObligorId;
    use sluice_core::types::CorrelationMatrix;

    /// A grid with no tail co-movement plus three joint extremes and two
    /// one-sided extremes per series.
    fn dataset() -> (Vec<f64>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for a in -5..=5 {
            for b in -5..=5 {
                x.push(f64::from(a));
                y.push(f64::from(b));
            }
        }
        for v in [6.0, 7.0, 8.0] {
            x.push(v);
            y.push(v);
        }
        for (a, b) in [(9.0, 0.0), (10.0, 0.0), (0.0, 9.0), (0.0, 10.0)] {
            x.push(a);
            y.push(b);
        }
        (x, y)
    }

    #[test]
    fn test_known_dataset() {
        let (x, y) = dataset();
        assert_eq!(x.len(), 128);
        let obligors = vec![ObligorId::new("X"), ObligorId::new("Y")];
        let corr = CorrelationMatrix::identity(obligors.clone());
        let series = vec![x, y];
        let input = TailInput {
            obligors: &obligors,
            default_probabilities: &[0.05, 0.05],
            exposures: &[100.0, 100.0],
            lgd: 1.0,
            correlation: &corr,
            loss_series: &series,
            confidence: 0.95,
        };

        // k = floor(0.04 * 128) = 5, three of the top five coincide
        let model = EmpiricalTailDependence::new(0.04).unwrap();
        let report = model.tail_dependence(&input).unwrap();
        let pair = &report.pairs[0];
        assert_relative_eq!(pair.tail, 0.6, epsilon = 1e-12);
        assert_relative_eq!(pair.pearson, 136.5 / 1527.5, epsilon = 1e-3);
        assert!((pair.tail - pair.pearson).abs() > 0.1);
        assert_relative_eq!(report.coefficient, 0.6, epsilon = 1e-12);
        assert!(report.joint_loss.is_some());
    }

    #[test]
    fn test_too_few_observations() {
        let obligors = vec![ObligorId::new("X"), ObligorId::new("Y")];
        let corr = CorrelationMatrix::identity(obligors.clone());
        let series = vec![vec![1.0, 2.0, 3.0], vec![3.0, 1.0, 2.0]];
        let input = TailInput {
            obligors: &obligors,
            default_probabilities: &[0.1, 0.1],
            exposures: &[1.0, 1.0],
            lgd: 1.0,
            correlation: &corr,
            loss_series: &series,
            confidence: 0.9,
        };
        let err = EmpiricalTailDependence::new(0.05)
            .unwrap()
            .tail_dependence(&input)
            .unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_constant_series_has_zero_pearson() {
        let obligors = vec![ObligorId::new("X"), ObligorId::new("Y")];
        let corr = CorrelationMatrix::identity(obligors.clone());
        let series = vec![(0..40).map(f64::from).collect(), vec![1.0; 40]];
        let input = TailInput {
            obligors: &obligors,
            default_probabilities: &[0.1, 0.1],
            exposures: &[1.0, 1.0],
            lgd: 1.0,
            correlation: &corr,
            loss_series: &series,
            confidence: 0.9,
        };
        let report = EmpiricalTailDependence::new(0.1)
            .unwrap()
            .tail_dependence(&input)
            .unwrap();
        assert_eq!(report.pairs[0].pearson, 0.0);
    }

    #[test]
    fn test_joint_loss_counts_tail_ranks() {
        let obligors = vec![ObligorId::new("X")];
        let corr = CorrelationMatrix::identity(obligors.clone());
        let series = vec![(0..100).map(f64::from).collect()];
        let input = TailInput {
            obligors: &obligors,
            default_probabilities: &[0.1],
            exposures: &[50.0],
            lgd: 0.5,
            correlation: &corr,
            loss_series: &series,
            confidence: 0.95,
        };
        let dist = EmpiricalTailDependence::new(0.1)
            .unwrap()
            .loss_distribution(&input)
            .unwrap();
        // ranks 91..100 of 100 have u > 0.9
        let defaults = dist.samples().iter().filter(|l| **l > 0.0).count();
        assert_eq!(defaults, 10);
    }
}
