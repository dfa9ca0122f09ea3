//! Credit scoring: obligor features to default probability.
//!
//! Scorers are injected behind the [`CreditScorer`] trait so the engine can
//! swap the ensemble model for the factor model (or anything else) without
//! touching callers.

mod factor;
mod gbdt;

pub use factor::{FactorScorer, FactorScorerConfig};
pub use gbdt::{
    GradientBoostedTrees, MonotoneConstraint, MonotoneDirection, PlattCalibration, RegressionTree,
    TreeNode,
};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::ids::ObligorId;
use sluice_core::types::FeatureVector;
use sluice_core::validation::{Validate, ValidationError};

/// A default-probability model.
pub trait CreditScorer: Send + Sync {
    /// Model name for logging and reports.
    fn name(&self) -> &str;

    /// Default probability in `[0, 1]` for one obligor.
    fn score(&self, features: &FeatureVector) -> AnalyticsResult<f64>;
}

/// Rejects a non-finite or out-of-range model output.
pub(crate) fn check_probability(model: &str, p: f64) -> AnalyticsResult<f64> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(AnalyticsError::computation(
            format!("score.{model}"),
            format!("model produced invalid probability {p}"),
        ))
    }
}

/// Scores a batch, in parallel once it reaches `parallel_threshold`.
///
/// Failures are contained per obligor.
pub fn score_batch(
    scorer: &dyn CreditScorer,
    inputs: &[(ObligorId, FeatureVector)],
    parallel_threshold: usize,
) -> Vec<(ObligorId, AnalyticsResult<f64>)> {
    let score_one = |(id, features): &(ObligorId, FeatureVector)| {
        let result = scorer.score(features).map_err(|e| match e {
            AnalyticsError::Computation { reason, .. } => {
                AnalyticsError::computation(format!("score.{id}"), reason)
            }
            other => other,
        });
        (id.clone(), result)
    };

    if inputs.len() >= parallel_threshold {
        inputs.par_iter().map(score_one).collect()
    } else {
        inputs.iter().map(score_one).collect()
    }
}

/// Which scorer to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Gradient-boosted trees, from `model_path` or the built-in reference model.
    #[default]
    Gbdt,
    /// Multiplicative factor model.
    Factor,
}

/// Scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Model family.
    #[serde(default)]
    pub model: ScorerKind,

    /// JSON model file for [`ScorerKind::Gbdt`]. `None` uses the reference model.
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Factor model parameters.
    #[serde(default)]
    pub factor: FactorScorerConfig,

    /// Batch size at which scoring switches to rayon.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_parallel_threshold() -> usize {
    64
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            model: ScorerKind::default(),
            model_path: None,
            factor: FactorScorerConfig::default(),
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

impl ScoringConfig {
    /// Selects the model family.
    #[must_use]
    pub fn with_model(mut self, model: ScorerKind) -> Self {
        self.model = model;
        self
    }

    /// Builds the configured scorer.
    pub fn build(&self) -> AnalyticsResult<Arc<dyn CreditScorer>> {
        self.ensure_valid()?;
        Ok(match self.model {
            ScorerKind::Factor => Arc::new(FactorScorer::new(self.factor.clone())),
            ScorerKind::Gbdt => match &self.model_path {
                Some(path) => Arc::new(GradientBoostedTrees::from_file(path)?),
                None => Arc::new(GradientBoostedTrees::reference_model()?),
            },
        })
    }
}

impl Validate for ScoringConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors: Vec<ValidationError> = self
            .factor
            .validate()
            .into_iter()
            .map(|e| e.in_section("factor"))
            .collect();
        if self.parallel_threshold == 0 {
            errors.push(ValidationError::new(
                "parallel_threshold",
                "must be at least 1",
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::types::Sector;

    struct Broken;

    impl CreditScorer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn score(&self, features: &FeatureVector) -> AnalyticsResult<f64> {
            check_probability("broken", features.leverage * f64::NAN)
        }
    }

    fn inputs(n: usize) -> Vec<(ObligorId, FeatureVector)> {
        (0..n)
            .map(|i| {
                (
                    ObligorId::new(format!("OBL{i:03}")),
                    FeatureVector::new(0.5 + i as f64 * 0.1, 0.9, Sector::Retail, 6.0),
                )
            })
            .collect()
    }

    #[test]
    fn test_batch_sequential_matches_parallel() {
        let scorer = FactorScorer::default();
        let data = inputs(20);
        let seq = score_batch(&scorer, &data, usize::MAX);
        let par = score_batch(&scorer, &data, 1);
        assert_eq!(seq.len(), 20);
        for ((a, ra), (b, rb)) in seq.iter().zip(&par) {
            assert_eq!(a, b);
            assert_eq!(ra.as_ref().unwrap(), rb.as_ref().unwrap());
        }
    }

    #[test]
    fn test_failures_are_contained() {
        let results = score_batch(&Broken, &inputs(3), 64);
        assert_eq!(results.len(), 3);
        for (id, r) in results {
            let err = r.unwrap_err();
            assert!(err.subject().contains(id.as_str()));
            assert!(!err.is_fatal());
        }
    }

    #[test]
    fn test_build_from_config() {
        let gbdt = ScoringConfig::default().build().unwrap();
        assert_eq!(gbdt.name(), "reference-gbdt-v1");
        let factor = ScoringConfig::default()
            .with_model(ScorerKind::Factor)
            .build()
            .unwrap();
        assert_eq!(factor.name(), "factor");
    }
}
