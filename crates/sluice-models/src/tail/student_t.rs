//! Student-t copula.
//!
//! Pairwise upper-tail dependence is closed form in the correlation and the
//! degrees of freedom. The joint-loss tail is simulated: each path draws a
//! correlated normal vector, divides it by a shared `√(W/ν)` with
//! `W ~ χ²_ν`, and defaults obligor `i` when its coordinate falls below
//! `t_ν⁻¹(PD_i)`.

use nalgebra::{DMatrix, DVector};
use rand::distributions::Distribution;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use statrs::distribution::{ChiSquared, Normal};
use tracing::{debug, warn};

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::types::CorrelationMatrix;
use sluice_math::distributions::{student_t_inv_cdf, student_t_tail_dependence};
use sluice_math::linear_algebra::{cholesky, min_eigenvalue, shrink_to_identity, shrinkage_intensity};

use super::{
    JointLossEstimate, LossDistribution, PairDependence, TailDependenceModel, TailDependenceReport,
    TailInput,
};
use crate::math_error;

const PATHS_PER_STREAM: usize = 1_000;
const FACTOR_EIGEN_FLOOR: f64 = 1e-6;

/// Student-t copula tail model.
#[derive(Debug, Clone)]
pub struct StudentTCopula {
    degrees_of_freedom: f64,
    paths: usize,
    seed: u64,
}

impl StudentTCopula {
    /// Creates a copula with `degrees_of_freedom > 0` and at least one path.
    pub fn new(degrees_of_freedom: f64, paths: usize, seed: u64) -> AnalyticsResult<Self> {
        if !(degrees_of_freedom > 0.0) || !degrees_of_freedom.is_finite() {
            return Err(AnalyticsError::configuration(
                "tail.degrees_of_freedom",
                format!("must be positive, got {degrees_of_freedom}"),
            ));
        }
        if paths == 0 {
            return Err(AnalyticsError::configuration("tail.paths", "must be at least 1"));
        }
        Ok(Self {
            degrees_of_freedom,
            paths,
            seed,
        })
    }

    /// Degrees of freedom.
    #[must_use]
    pub fn degrees_of_freedom(&self) -> f64 {
        self.degrees_of_freedom
    }

    fn factor(correlation: &CorrelationMatrix) -> AnalyticsResult<DMatrix<f64>> {
        let n = correlation.dim();
        let matrix = DMatrix::from_row_slice(n, n, correlation.values());
        match cholesky(&matrix) {
            Ok(l) => Ok(l),
            Err(_) => {
                let e_min = min_eigenvalue(&matrix).map_err(math_error("copula_factor"))?;
                let lambda = shrinkage_intensity(e_min, FACTOR_EIGEN_FLOOR, 0.0);
                warn!(e_min, lambda, "correlation not positive definite, shrinking for simulation");
                cholesky(&shrink_to_identity(&matrix, lambda)).map_err(math_error("copula_factor"))
            }
        }
    }

    fn thresholds(&self, probabilities: &[f64]) -> AnalyticsResult<Vec<f64>> {
        probabilities
            .iter()
            .map(|&p| {
                if !p.is_finite() {
                    Err(AnalyticsError::computation(
                        "copula_threshold",
                        format!("non-finite default probability {p}"),
                    ))
                } else if p <= 0.0 {
                    Ok(f64::NEG_INFINITY)
                } else if p >= 1.0 {
                    Ok(f64::INFINITY)
                } else {
                    student_t_inv_cdf(p, self.degrees_of_freedom)
                        .map_err(math_error("copula_threshold"))
                }
            })
            .collect()
    }
}

impl TailDependenceModel for StudentTCopula {
    fn name(&self) -> &str {
        "student_t_copula"
    }

    fn tail_dependence(&self, input: &TailInput<'_>) -> AnalyticsResult<TailDependenceReport> {
        input.check()?;
        let n = input.obligors.len();
        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                let rho = input.correlation.get(i, j);
                let tail = student_t_tail_dependence(rho, self.degrees_of_freedom)
                    .map_err(math_error("tail_dependence"))?;
                pairs.push(PairDependence {
                    a: input.obligors[i].clone(),
                    b: input.obligors[j].clone(),
                    pearson: rho,
                    tail,
                });
            }
        }

        let joint_loss = match self
            .loss_distribution(input)
            .and_then(|d| JointLossEstimate::from_distribution(&d, input.confidence))
        {
            Ok(estimate) => Some(estimate),
            Err(e) => {
                warn!(error = %e, "joint loss simulation failed");
                None
            }
        };

        Ok(TailDependenceReport::new(self.name(), pairs, joint_loss))
    }

    fn loss_distribution(&self, input: &TailInput<'_>) -> AnalyticsResult<LossDistribution> {
        input.check()?;
        let n = input.obligors.len();
        if n == 0 {
            return Err(AnalyticsError::computation("joint_loss", "no obligors"));
        }

        let l = Self::factor(input.correlation)?;
        let thresholds = self.thresholds(input.default_probabilities)?;
        let losses: Vec<f64> = input.exposures.iter().map(|e| e * input.lgd).collect();
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| AnalyticsError::computation("joint_loss", e.to_string()))?;
        let chi = ChiSquared::new(self.degrees_of_freedom)
            .map_err(|e| AnalyticsError::computation("joint_loss", e.to_string()))?;
        let (nu, seed, paths) = (self.degrees_of_freedom, self.seed, self.paths);

        let streams = paths.div_ceil(PATHS_PER_STREAM);
        let samples: Vec<f64> = (0..streams)
            .into_par_iter()
            .flat_map_iter(|stream| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(stream as u64);
                let count = PATHS_PER_STREAM.min(paths - stream * PATHS_PER_STREAM);
                let (l, thresholds, losses, normal, chi) = (&l, &thresholds, &losses, &normal, &chi);
                (0..count).map(move |_| {
                    let z = DVector::from_fn(n, |_, _| normal.sample(&mut rng));
                    let x = l * z;
                    let scale = (nu / chi.sample(&mut rng)).sqrt();
                    x.iter()
                        .zip(thresholds)
                        .zip(losses)
                        .filter(|((xi, threshold), _)| *xi * scale < **threshold)
                        .map(|(_, loss)| *loss)
                        .sum::<f64>()
                })
            })
            .collect();

        debug!(paths = samples.len(), obligors = n, "joint loss simulated");
        LossDistribution::from_samples(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sluice_core::ids::ObligorId;

    fn ids(n: usize) -> Vec<ObligorId> {
        (0..n).map(|i| ObligorId::new(format!("OBL{i}"))).collect()
    }

    fn uniform(n: usize, rho: f64) -> CorrelationMatrix {
        let mut values = vec![rho; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
        }
        CorrelationMatrix::from_row_major(ids(n), values).unwrap()
    }

    #[test]
    fn test_pairwise_matches_closed_form() {
        let copula = StudentTCopula::new(4.0, 200, 1).unwrap();
        let corr = uniform(3, 0.5);
        let obligors = ids(3);
        let input = TailInput {
            obligors: &obligors,
            default_probabilities: &[0.02, 0.03, 0.05],
            exposures: &[100.0, 200.0, 300.0],
            lgd: 0.6,
            correlation: &corr,
            loss_series: &[],
            confidence: 0.99,
        };
        let report = copula.tail_dependence(&input).unwrap();
        assert_eq!(report.pairs.len(), 3);
        let expected = student_t_tail_dependence(0.5, 4.0).unwrap();
        for pair in &report.pairs {
            assert_relative_eq!(pair.tail, expected, epsilon = 1e-12);
            assert_relative_eq!(pair.pearson, 0.5);
            assert!(pair.tail != pair.pearson);
        }
        assert_relative_eq!(report.coefficient, expected, epsilon = 1e-12);
        assert_eq!(report.joint_loss.unwrap().paths, 200);
    }

    #[test]
    fn test_simulation_is_seeded() {
        let copula = StudentTCopula::new(4.0, 2_500, 99).unwrap();
        let corr = uniform(4, 0.3);
        let obligors = ids(4);
        let input = TailInput {
            obligors: &obligors,
            default_probabilities: &[0.1; 4],
            exposures: &[1.0; 4],
            lgd: 1.0,
            correlation: &corr,
            loss_series: &[],
            confidence: 0.95,
        };
        let a = copula.loss_distribution(&input).unwrap();
        let b = copula.loss_distribution(&input).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2_500);
        // marginal default rate stays near 10%
        assert_relative_eq!(a.mean().unwrap(), 0.4, epsilon = 0.06);
    }

    #[test]
    fn test_certain_and_impossible_defaults() {
        let copula = StudentTCopula::new(4.0, 100, 3).unwrap();
        let corr = uniform(2, 0.0);
        let obligors = ids(2);
        let input = TailInput {
            obligors: &obligors,
            default_probabilities: &[1.0, 0.0],
            exposures: &[10.0, 50.0],
            lgd: 0.5,
            correlation: &corr,
            loss_series: &[],
            confidence: 0.9,
        };
        let dist = copula.loss_distribution(&input).unwrap();
        assert!(dist.samples().iter().all(|l| (*l - 5.0).abs() < 1e-12));
    }

    #[test]
    fn test_length_mismatch() {
        let copula = StudentTCopula::new(4.0, 10, 3).unwrap();
        let corr = uniform(2, 0.2);
        let obligors = ids(2);
        let input = TailInput {
            obligors: &obligors,
            default_probabilities: &[0.1],
            exposures: &[1.0, 1.0],
            lgd: 0.5,
            correlation: &corr,
            loss_series: &[],
            confidence: 0.9,
        };
        assert!(copula.tail_dependence(&input).is_err());
    }
}
