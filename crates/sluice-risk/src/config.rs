//! Risk and correlation configuration.

use serde::{Deserialize, Serialize};

use sluice_core::validation::{Validate, ValidationError};

use crate::var::VarMethod;

/// Risk metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// VaR estimator.
    #[serde(default)]
    pub var_method: VarMethod,

    /// Confidence levels to report VaR at.
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,

    /// VaR horizon in periods of the return series.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    /// Recovery rate used for baseline expected loss.
    #[serde(default = "default_base_recovery")]
    pub base_recovery: f64,
}

fn default_confidence_levels() -> Vec<f64> {
    vec![0.95, 0.99]
}

fn default_horizon_days() -> u32 {
    1
}

fn default_base_recovery() -> f64 {
    0.4
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            var_method: VarMethod::default(),
            confidence_levels: default_confidence_levels(),
            horizon_days: default_horizon_days(),
            base_recovery: default_base_recovery(),
        }
    }
}

impl RiskConfig {
    /// Selects the VaR method.
    #[must_use]
    pub fn with_var_method(mut self, method: VarMethod) -> Self {
        self.var_method = method;
        self
    }

    /// Sets the confidence levels.
    #[must_use]
    pub fn with_confidence_levels(mut self, levels: Vec<f64>) -> Self {
        self.confidence_levels = levels;
        self
    }

    /// Loss given default for the baseline.
    #[must_use]
    pub fn base_lgd(&self) -> f64 {
        1.0 - self.base_recovery
    }
}

impl Validate for RiskConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.confidence_levels.is_empty() {
            errors.push(ValidationError::new(
                "confidence_levels",
                "at least one level required",
            ));
        }
        for c in &self.confidence_levels {
            if !(*c > 0.0 && *c < 1.0) {
                errors.push(ValidationError::new(
                    "confidence_levels",
                    format!("{c} is not in (0, 1)"),
                ));
            }
        }
        if self.horizon_days == 0 {
            errors.push(ValidationError::new("horizon_days", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.base_recovery) {
            errors.push(ValidationError::new(
                "base_recovery",
                format!("must lie in [0, 1], got {}", self.base_recovery),
            ));
        }
        errors
    }
}

/// Correlation estimation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Trailing number of returns used.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Smallest acceptable eigenvalue before shrinking.
    #[serde(default = "default_eigen_floor")]
    pub eigen_floor: f64,

    /// Minimum shrinkage intensity once shrinking is triggered.
    #[serde(default)]
    pub min_shrinkage: f64,
}

fn default_window() -> usize {
    60
}

fn default_eigen_floor() -> f64 {
    1e-4
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            eigen_floor: default_eigen_floor(),
            min_shrinkage: 0.0,
        }
    }
}

impl CorrelationConfig {
    /// Sets the eigenvalue floor.
    #[must_use]
    pub fn with_eigen_floor(mut self, floor: f64) -> Self {
        self.eigen_floor = floor;
        self
    }

    /// Sets the minimum shrinkage.
    #[must_use]
    pub fn with_min_shrinkage(mut self, min_shrinkage: f64) -> Self {
        self.min_shrinkage = min_shrinkage;
        self
    }
}

impl Validate for CorrelationConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.window < 2 {
            errors.push(ValidationError::new("window", "need at least 2 returns"));
        }
        if !(self.eigen_floor > 0.0 && self.eigen_floor < 1.0) {
            errors.push(ValidationError::new(
                "eigen_floor",
                format!("must lie in (0, 1), got {}", self.eigen_floor),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_shrinkage) {
            errors.push(ValidationError::new(
                "min_shrinkage",
                format!("must lie in [0, 1], got {}", self.min_shrinkage),
            ));
        }
        errors
    }
}
