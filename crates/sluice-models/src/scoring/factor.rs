//! Multiplicative factor model.
//!
//! `PD = base · sector · size · leverage · payment`, clamped to
//! `[min_pd, max_pd]`. Each factor is non-decreasing in risk, so the model
//! satisfies the same monotone constraints as the tree ensemble.

use serde::{Deserialize, Serialize};

use sluice_core::error::AnalyticsResult;
use sluice_core::types::FeatureVector;
use sluice_core::validation::{Validate, ValidationError};

use super::{check_probability, CreditScorer};

/// Factor model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScorerConfig {
    /// Baseline default probability.
    #[serde(default = "default_base_pd")]
    pub base_pd: f64,
    /// Lower bound on the output.
    #[serde(default = "default_min_pd")]
    pub min_pd: f64,
    /// Upper bound on the output.
    #[serde(default = "default_max_pd")]
    pub max_pd: f64,
    /// Added risk per unit of leverage.
    #[serde(default = "default_leverage_weight")]
    pub leverage_weight: f64,
    /// Added risk per unit of missed payments.
    #[serde(default = "default_payment_weight")]
    pub payment_weight: f64,
}

fn default_base_pd() -> f64 {
    0.06
}

fn default_min_pd() -> f64 {
    0.01
}

fn default_max_pd() -> f64 {
    0.25
}

fn default_leverage_weight() -> f64 {
    0.15
}

fn default_payment_weight() -> f64 {
    1.5
}

impl Default for FactorScorerConfig {
    fn default() -> Self {
        Self {
            base_pd: default_base_pd(),
            min_pd: default_min_pd(),
            max_pd: default_max_pd(),
            leverage_weight: default_leverage_weight(),
            payment_weight: default_payment_weight(),
        }
    }
}

impl Validate for FactorScorerConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !(self.base_pd > 0.0 && self.base_pd < 1.0) {
            errors.push(ValidationError::new("base_pd", "must lie in (0, 1)"));
        }
        if !(0.0 <= self.min_pd && self.min_pd < self.max_pd && self.max_pd <= 1.0) {
            errors.push(ValidationError::new(
                "min_pd",
                format!("need 0 <= min_pd < max_pd <= 1, got {} and {}", self.min_pd, self.max_pd),
            ));
        }
        if !(self.leverage_weight >= 0.0) || !(self.payment_weight >= 0.0) {
            errors.push(ValidationError::new("leverage_weight", "weights must be non-negative"));
        }
        errors
    }
}

/// Factor-based default probability model.
#[derive(Debug, Clone, Default)]
pub struct FactorScorer {
    config: FactorScorerConfig,
}

impl FactorScorer {
    /// Creates a scorer with the given parameters.
    #[must_use]
    pub fn new(config: FactorScorerConfig) -> Self {
        Self { config }
    }

    /// Larger businesses are safer. `exposure_size` is log10 of annual volume.
    fn size_multiplier(exposure_size: f64) -> f64 {
        if exposure_size >= 6.699 {
            0.8
        } else if exposure_size >= 6.301 {
            0.9
        } else if exposure_size >= 5.699 {
            1.0
        } else {
            1.2
        }
    }
}

impl CreditScorer for FactorScorer {
    fn name(&self) -> &str {
        "factor"
    }

    fn score(&self, features: &FeatureVector) -> AnalyticsResult<f64> {
        features.validate("features")?;
        let c = &self.config;
        let pd = c.base_pd
            * features.sector.risk_multiplier()
            * Self::size_multiplier(features.exposure_size)
            * (1.0 + c.leverage_weight * features.leverage)
            * (1.0 + c.payment_weight * (1.0 - features.payment_history));
        check_probability("factor", pd.clamp(c.min_pd, c.max_pd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sluice_core::types::Sector;

    #[test]
    fn test_neutral_obligor() {
        let scorer = FactorScorer::default();
        let f = FeatureVector::new(0.0, 1.0, Sector::Retail, 6.0);
        assert_relative_eq!(scorer.score(&f).unwrap(), 0.06, epsilon = 1e-12);
    }

    #[test]
    fn test_bounds() {
        let scorer = FactorScorer::default();
        let risky = FeatureVector::new(10.0, 0.0, Sector::RealEstate, 3.0);
        assert_relative_eq!(scorer.score(&risky).unwrap(), 0.25);
        let safe = FeatureVector::new(0.0, 1.0, Sector::Healthcare, 8.0);
        // 0.06 * 0.8 * 0.8 = 0.0384
        assert_relative_eq!(scorer.score(&safe).unwrap(), 0.0384, epsilon = 1e-12);
    }

    #[test]
    fn test_size_thresholds() {
        assert_eq!(FactorScorer::size_multiplier(7.0), 0.8);
        assert_eq!(FactorScorer::size_multiplier(6.5), 0.9);
        assert_eq!(FactorScorer::size_multiplier(6.0), 1.0);
        assert_eq!(FactorScorer::size_multiplier(5.0), 1.2);
    }

    #[test]
    fn test_invalid_config() {
        let config = FactorScorerConfig {
            min_pd: 0.5,
            max_pd: 0.1,
            ..Default::default()
        };
        assert_eq!(config.validate().len(), 1);
    }
}
