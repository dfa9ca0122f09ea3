//! Tail-dependence models.
//!
//! Pearson correlation measures average co-movement; tail dependence
//! measures the chance that obligors default *together* in the extremes.
//! Every report carries both numbers side by side.

mod empirical;
mod student_t;

pub use empirical::EmpiricalTailDependence;
pub use student_t::StudentTCopula;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::ids::ObligorId;
use sluice_core::types::CorrelationMatrix;
use sluice_core::validation::{Validate, ValidationError};
use sluice_math::statistics::{mean, quantile_sorted, tail_mean_sorted};

use crate::math_error;

/// Everything a tail model may need for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct TailInput<'a> {
    /// Obligors, in matrix order.
    pub obligors: &'a [ObligorId],
    /// Default probability per obligor.
    pub default_probabilities: &'a [f64],
    /// Exposure at default per obligor.
    pub exposures: &'a [f64],
    /// Loss given default.
    pub lgd: f64,
    /// Obligor correlation matrix.
    pub correlation: &'a CorrelationMatrix,
    /// Historical loss or return observations per obligor (aligned).
    pub loss_series: &'a [Vec<f64>],
    /// Confidence level for the joint-loss estimate.
    pub confidence: f64,
}

impl TailInput<'_> {
    /// Checks that all per-obligor inputs have matching lengths.
    pub fn check(&self) -> AnalyticsResult<()> {
        let n = self.obligors.len();
        if self.default_probabilities.len() != n
            || self.exposures.len() != n
            || self.correlation.dim() != n
        {
            return Err(AnalyticsError::computation(
                "tail_dependence",
                format!(
                    "input length mismatch: {} obligors, {} probabilities, {} exposures, matrix dim {}",
                    n,
                    self.default_probabilities.len(),
                    self.exposures.len(),
                    self.correlation.dim()
                ),
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(AnalyticsError::computation(
                "tail_dependence",
                format!("confidence must lie in (0, 1), got {}", self.confidence),
            ));
        }
        Ok(())
    }
}

/// Simulated or empirical distribution of portfolio loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossDistribution {
    sorted_losses: Vec<f64>,
}

impl LossDistribution {
    /// Builds a distribution from loss samples.
    pub fn from_samples(mut losses: Vec<f64>) -> AnalyticsResult<Self> {
        if losses.is_empty() {
            return Err(AnalyticsError::computation("loss_distribution", "no samples"));
        }
        if losses.iter().any(|l| !l.is_finite()) {
            return Err(AnalyticsError::computation(
                "loss_distribution",
                "non-finite loss sample",
            ));
        }
        losses.sort_by(f64::total_cmp);
        Ok(Self {
            sorted_losses: losses,
        })
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sorted_losses.len()
    }

    /// Always false; construction rejects empty samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sorted_losses.is_empty()
    }

    /// Loss quantile at `confidence`.
    pub fn quantile(&self, confidence: f64) -> AnalyticsResult<f64> {
        quantile_sorted(&self.sorted_losses, confidence).map_err(math_error("loss_quantile"))
    }

    /// Mean loss beyond the `confidence` quantile.
    pub fn expected_shortfall(&self, confidence: f64) -> AnalyticsResult<f64> {
        tail_mean_sorted(&self.sorted_losses, confidence)
            .map_err(math_error("loss_expected_shortfall"))
    }

    /// Mean loss.
    pub fn mean(&self) -> AnalyticsResult<f64> {
        mean(&self.sorted_losses).map_err(math_error("loss_mean"))
    }

    /// Sorted samples.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.sorted_losses
    }
}

/// Dependence between one pair of obligors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDependence {
    /// First obligor.
    pub a: ObligorId,
    /// Second obligor.
    pub b: ObligorId,
    /// Linear correlation.
    pub pearson: f64,
    /// Upper-tail dependence coefficient.
    pub tail: f64,
}

/// Tail quantiles of the joint-loss distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLossEstimate {
    /// Confidence level.
    pub confidence: f64,
    /// Loss quantile at that level.
    pub quantile: f64,
    /// Mean loss beyond the quantile.
    pub expected_shortfall: f64,
    /// Mean loss.
    pub expected_loss: f64,
    /// Number of paths or observations behind the estimate.
    pub paths: usize,
}

impl JointLossEstimate {
    /// Summarizes a loss distribution.
    pub fn from_distribution(dist: &LossDistribution, confidence: f64) -> AnalyticsResult<Self> {
        Ok(Self {
            confidence,
            quantile: dist.quantile(confidence)?,
            expected_shortfall: dist.expected_shortfall(confidence)?,
            expected_loss: dist.mean()?,
            paths: dist.len(),
        })
    }
}

/// Output of a tail-dependence model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailDependenceReport {
    /// Model that produced the report.
    pub model: String,
    /// Pairwise estimates (upper triangle).
    pub pairs: Vec<PairDependence>,
    /// Pool-level coefficient: the largest pairwise tail dependence.
    pub coefficient: f64,
    /// Joint-loss tail estimate, when it could be computed.
    pub joint_loss: Option<JointLossEstimate>,
}

impl TailDependenceReport {
    /// Builds a report; the coefficient is the maximum over pairs, 0 if none.
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        pairs: Vec<PairDependence>,
        joint_loss: Option<JointLossEstimate>,
    ) -> Self {
        let coefficient = pairs.iter().map(|p| p.tail).fold(0.0, f64::max);
        Self {
            model: model.into(),
            pairs,
            coefficient,
            joint_loss,
        }
    }

    /// Estimate for a specific pair, in either order.
    #[must_use]
    pub fn pair(&self, a: &ObligorId, b: &ObligorId) -> Option<&PairDependence> {
        self.pairs
            .iter()
            .find(|p| (&p.a == a && &p.b == b) || (&p.a == b && &p.b == a))
    }
}

/// A model of joint extreme defaults.
pub trait TailDependenceModel: Send + Sync {
    /// Model name.
    fn name(&self) -> &str;

    /// Pairwise tail dependence and the joint-loss tail.
    fn tail_dependence(&self, input: &TailInput<'_>) -> AnalyticsResult<TailDependenceReport>;

    /// Distribution of pool loss under the model.
    fn loss_distribution(&self, input: &TailInput<'_>) -> AnalyticsResult<LossDistribution>;
}

/// Which tail model to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailModelKind {
    /// Student-t copula with Monte Carlo joint loss.
    #[default]
    StudentT,
    /// Non-parametric estimate from historical series.
    Empirical,
}

/// Tail-dependence configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailConfig {
    /// Model family.
    #[serde(default)]
    pub model: TailModelKind,
    /// Student-t degrees of freedom.
    #[serde(default = "default_degrees_of_freedom")]
    pub degrees_of_freedom: f64,
    /// Monte Carlo paths.
    #[serde(default = "default_paths")]
    pub paths: usize,
    /// Monte Carlo seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fraction of observations treated as the tail by the empirical model.
    #[serde(default = "default_tail_fraction")]
    pub tail_fraction: f64,
    /// Confidence level for joint-loss estimates.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_degrees_of_freedom() -> f64 {
    4.0
}

fn default_paths() -> usize {
    10_000
}

fn default_seed() -> u64 {
    7
}

fn default_tail_fraction() -> f64 {
    0.05
}

fn default_confidence() -> f64 {
    0.99
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            model: TailModelKind::default(),
            degrees_of_freedom: default_degrees_of_freedom(),
            paths: default_paths(),
            seed: default_seed(),
            tail_fraction: default_tail_fraction(),
            confidence: default_confidence(),
        }
    }
}

impl TailConfig {
    /// Selects the model family.
    #[must_use]
    pub fn with_model(mut self, model: TailModelKind) -> Self {
        self.model = model;
        self
    }

    /// Sets the number of Monte Carlo paths.
    #[must_use]
    pub fn with_paths(mut self, paths: usize) -> Self {
        self.paths = paths;
        self
    }

    /// Builds the configured model.
    pub fn build(&self) -> AnalyticsResult<Arc<dyn TailDependenceModel>> {
        self.ensure_valid()?;
        Ok(match self.model {
            TailModelKind::StudentT => Arc::new(StudentTCopula::new(
                self.degrees_of_freedom,
                self.paths,
                self.seed,
            )?),
            TailModelKind::Empirical => Arc::new(EmpiricalTailDependence::new(self.tail_fraction)?),
        })
    }
}

impl Validate for TailConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !(self.degrees_of_freedom > 2.0) || !self.degrees_of_freedom.is_finite() {
            errors.push(ValidationError::new(
                "degrees_of_freedom",
                format!("must be finite and > 2, got {}", self.degrees_of_freedom),
            ));
        }
        if self.paths == 0 {
            errors.push(ValidationError::new("paths", "must be at least 1"));
        }
        if !(self.tail_fraction > 0.0 && self.tail_fraction < 0.5) {
            errors.push(ValidationError::new(
                "tail_fraction",
                format!("must lie in (0, 0.5), got {}", self.tail_fraction),
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            errors.push(ValidationError::new(
                "confidence",
                format!("must lie in (0, 1), got {}", self.confidence),
            ));
        }
        errors
    }
}
