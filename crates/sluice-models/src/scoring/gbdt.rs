//! Pre-fit gradient-boosted tree ensemble.
//!
//! Inference only. The margin is `base_score + learning_rate · Σ leaf`, the
//! probability is the Platt-calibrated logistic of the margin, clamped to
//! `[pd_floor, pd_cap]`.
//!
//! Monotone constraints are checked when a model is loaded: at every split
//! on a constrained feature, each leaf reachable on the low side must be
//! `<=` (increasing) or `>=` (decreasing) each leaf on the high side. Since
//! two inputs differing only in that feature first diverge at such a split,
//! this makes every tree, and therefore the sum, monotone.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::types::{Feature, FeatureVector};

use super::{check_probability, CreditScorer};

const REFERENCE_MODEL: &str = include_str!("../../models/reference_gbdt.json");

/// A node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal split: `value < threshold` goes left.
    Split {
        /// Feature tested.
        feature: Feature,
        /// Split threshold.
        threshold: f64,
        /// Index of the low-side child.
        left: usize,
        /// Index of the high-side child.
        right: usize,
    },
    /// Terminal node.
    Leaf {
        /// Margin contribution.
        value: f64,
    },
}

/// A single regression tree stored as a flat node array rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    /// Nodes; children always have larger indices than their parent.
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features.value(*feature) < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    fn check_structure(&self, tree: usize) -> AnalyticsResult<()> {
        if self.nodes.is_empty() {
            return Err(AnalyticsError::configuration(
                format!("model.trees[{tree}]"),
                "tree has no nodes",
            ));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(AnalyticsError::configuration(
                        format!("model.trees[{tree}].nodes[{i}]"),
                        "non-finite leaf value",
                    ));
                }
                TreeNode::Split {
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if !threshold.is_finite() {
                        return Err(AnalyticsError::configuration(
                            format!("model.trees[{tree}].nodes[{i}]"),
                            "non-finite threshold",
                        ));
                    }
                    for child in [left, right] {
                        if *child <= i || *child >= self.nodes.len() {
                            return Err(AnalyticsError::configuration(
                                format!("model.trees[{tree}].nodes[{i}]"),
                                format!("child index {child} out of order or range"),
                            ));
                        }
                    }
                }
                TreeNode::Leaf { .. } => {}
            }
        }
        Ok(())
    }

    /// `(min, max)` leaf value reachable from each node.
    fn leaf_ranges(&self) -> Vec<(f64, f64)> {
        let mut ranges = vec![(0.0, 0.0); self.nodes.len()];
        for i in (0..self.nodes.len()).rev() {
            ranges[i] = match &self.nodes[i] {
                TreeNode::Leaf { value } => (*value, *value),
                TreeNode::Split { left, right, .. } => {
                    let (l, r) = (ranges[*left], ranges[*right]);
                    (l.0.min(r.0), l.1.max(r.1))
                }
            };
        }
        ranges
    }
}

/// Direction of a monotone constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonotoneDirection {
    /// Output never decreases as the feature grows.
    Increasing,
    /// Output never increases as the feature grows.
    Decreasing,
}

/// A monotone constraint on one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonotoneConstraint {
    /// Constrained feature.
    pub feature: Feature,
    /// Required direction.
    pub direction: MonotoneDirection,
}

/// Platt scaling parameters: `σ(a · margin + b)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattCalibration {
    /// Slope, must be positive.
    pub a: f64,
    /// Intercept.
    pub b: f64,
}

impl Default for PlattCalibration {
    fn default() -> Self {
        Self { a: 1.0, b: 0.0 }
    }
}

/// Gradient-boosted tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    /// Model name.
    pub name: String,
    /// Initial margin.
    pub base_score: f64,
    /// Shrinkage applied to every tree.
    pub learning_rate: f64,
    /// Probability calibration.
    #[serde(default)]
    pub calibration: PlattCalibration,
    /// Lower probability bound.
    pub pd_floor: f64,
    /// Upper probability bound.
    pub pd_cap: f64,
    /// Constraints verified at load time.
    #[serde(default)]
    pub monotone_constraints: Vec<MonotoneConstraint>,
    /// The ensemble.
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// Parses and verifies a JSON model.
    pub fn from_json(json: &str) -> AnalyticsResult<Self> {
        let model: Self = serde_json::from_str(json)
            .map_err(|e| AnalyticsError::configuration("model", e.to_string()))?;
        model.verify()?;
        info!(
            model = %model.name,
            trees = model.trees.len(),
            constraints = model.monotone_constraints.len(),
            "credit model loaded"
        );
        Ok(model)
    }

    /// Loads a JSON model file.
    pub fn from_file(path: impl AsRef<Path>) -> AnalyticsResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AnalyticsError::configuration(
                "scoring.model_path",
                format!("{}: {e}", path.display()),
            )
        })?;
        Self::from_json(&json)
    }

    /// The model bundled with the crate.
    pub fn reference_model() -> AnalyticsResult<Self> {
        Self::from_json(REFERENCE_MODEL)
    }

    /// Checks parameters, tree structure and monotone constraints.
    pub fn verify(&self) -> AnalyticsResult<()> {
        if !(self.calibration.a > 0.0) || !self.calibration.b.is_finite() {
            return Err(AnalyticsError::configuration(
                "model.calibration",
                format!("slope must be positive, got {}", self.calibration.a),
            ));
        }
        if !(self.learning_rate > 0.0) || !self.base_score.is_finite() {
            return Err(AnalyticsError::configuration(
                "model.learning_rate",
                "learning rate must be positive and base score finite",
            ));
        }
        if !(0.0 <= self.pd_floor && self.pd_floor < self.pd_cap && self.pd_cap <= 1.0) {
            return Err(AnalyticsError::configuration(
                "model.pd_floor",
                format!(
                    "need 0 <= floor < cap <= 1, got {} and {}",
                    self.pd_floor, self.pd_cap
                ),
            ));
        }
        if self.trees.is_empty() {
            return Err(AnalyticsError::configuration("model.trees", "empty ensemble"));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            tree.check_structure(t)?;
            let ranges = tree.leaf_ranges();
            for (i, node) in tree.nodes.iter().enumerate() {
                let TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } = node
                else {
                    continue;
                };
                for constraint in self.monotone_constraints.iter().filter(|c| c.feature == *feature) {
                    let (low, high) = (ranges[*left], ranges[*right]);
                    let ok = match constraint.direction {
                        MonotoneDirection::Increasing => low.1 <= high.0,
                        MonotoneDirection::Decreasing => low.0 >= high.1,
                    };
                    if !ok {
                        return Err(AnalyticsError::configuration(
                            format!("model.trees[{t}].nodes[{i}]"),
                            format!(
                                "split on {feature:?} violates {:?} constraint",
                                constraint.direction
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Raw ensemble margin.
    #[must_use]
    pub fn margin(&self, features: &FeatureVector) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        self.base_score + self.learning_rate * sum
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl CreditScorer for GradientBoostedTrees {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &FeatureVector) -> AnalyticsResult<f64> {
        features.validate("features")?;
        // logit(σ(m)) = m, so calibration applies directly to the margin
        let calibrated = sigmoid(self.calibration.a * self.margin(features) + self.calibration.b);
        check_probability(&self.name, calibrated).map(|p| p.clamp(self.pd_floor, self.pd_cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sluice_core::types::Sector;

    fn features(leverage: f64, payment_history: f64) -> FeatureVector {
        FeatureVector::new(leverage, payment_history, Sector::Manufacturing, 6.5)
    }

    #[test]
    fn test_reference_model_loads() {
        let model = GradientBoostedTrees::reference_model().unwrap();
        assert_eq!(model.trees.len(), 3);
        assert_eq!(model.monotone_constraints.len(), 2);
    }

    #[test]
    fn test_reference_margin() {
        let model = GradientBoostedTrees::reference_model().unwrap();
        // leverage 0.3 -> -0.6, payment 0.95 -> -0.4, sector 1.1 / size 6.5 -> -0.2
        let m = model.margin(&features(0.3, 0.95));
        assert_relative_eq!(m, -4.2, epsilon = 1e-12);
        let p = model.score(&features(0.3, 0.95)).unwrap();
        assert_relative_eq!(p, 1.0 / (1.0 + 4.2_f64.exp()), epsilon = 1e-12);
    }

    #[test]
    fn test_score_in_unit_interval_and_monotone() {
        let model = GradientBoostedTrees::reference_model().unwrap();
        let mut last = 0.0;
        for i in 0..50 {
            let p = model.score(&features(i as f64 * 0.1, 0.85)).unwrap();
            assert!((0.0..=1.0).contains(&p));
            assert!(p >= last);
            last = p;
        }
    }

    #[test]
    fn test_violating_model_rejected() {
        let mut model = GradientBoostedTrees::reference_model().unwrap();
        // make high leverage safer than low leverage
        model.trees[0].nodes[6] = TreeNode::Leaf { value: -2.0 };
        let err = model.verify().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Increasing"));
    }

    #[test]
    fn test_bad_structure_rejected() {
        let json = r#"{
            "name": "loop", "base_score": 0.0, "learning_rate": 1.0,
            "pd_floor": 0.0, "pd_cap": 1.0,
            "trees": [{"nodes": [{"split": {"feature": "leverage", "threshold": 1.0, "left": 0, "right": 1}}, {"leaf": {"value": 0.1}}]}]
        }"#;
        assert!(GradientBoostedTrees::from_json(json).is_err());

        let json = r#"{"name": "x", "base_score": 0.0, "learning_rate": 1.0,
            "calibration": {"a": -1.0, "b": 0.0},
            "pd_floor": 0.0, "pd_cap": 1.0, "trees": [{"nodes": [{"leaf": {"value": 0.1}}]}]}"#;
        assert!(GradientBoostedTrees::from_json(json).is_err());
    }

    #[test]
    fn test_invalid_features_rejected() {
        let model = GradientBoostedTrees::reference_model().unwrap();
        assert!(model.score(&features(f64::NAN, 0.9)).is_err());
    }
}
