//! Value at Risk and expected shortfall.
//!
//! Every method evaluates all confidence levels against one loss sample, and
//! the returned estimates are made non-decreasing in confidence.

use serde::{Deserialize, Serialize};
use std::fmt;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::types::CorrelationMatrix;
use sluice_math::distributions::normal_inv_cdf;
use sluice_math::statistics::{quantile_sorted, tail_mean_sorted};
use sluice_models::tail::LossDistribution;

/// VaR estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarMethod {
    /// Empirical quantile of historical portfolio losses.
    #[default]
    Historical,
    /// Variance-covariance.
    Parametric,
    /// Quantile of simulated credit losses.
    MonteCarlo,
}

impl fmt::Display for VarMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Historical => write!(f, "historical"),
            Self::Parametric => write!(f, "parametric"),
            Self::MonteCarlo => write!(f, "monte_carlo"),
        }
    }
}

/// VaR at one confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarEstimate {
    /// Confidence level, e.g. 0.99.
    pub confidence: f64,
    /// Loss not exceeded with probability `confidence`.
    pub var: f64,
    /// Mean loss beyond the VaR.
    pub expected_shortfall: f64,
    /// Estimation method.
    pub method: VarMethod,
    /// Horizon in periods.
    pub horizon_days: u32,
}

impl fmt::Display for VarEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VaR({:.0}%, {}d, {}): {:.2} (ES {:.2})",
            self.confidence * 100.0,
            self.horizon_days,
            self.method,
            self.var,
            self.expected_shortfall
        )
    }
}

fn check_levels(confidences: &[f64]) -> AnalyticsResult<Vec<f64>> {
    if confidences.is_empty() {
        return Err(AnalyticsError::computation("var", "no confidence levels"));
    }
    if let Some(c) = confidences.iter().find(|c| !(**c > 0.0 && **c < 1.0)) {
        return Err(AnalyticsError::computation(
            "var",
            format!("confidence level {c} is not in (0, 1)"),
        ));
    }
    let mut sorted = confidences.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    Ok(sorted)
}

/// Sorts by confidence and forces VaR and ES to be non-decreasing.
pub fn enforce_monotone(estimates: &mut [VarEstimate]) {
    estimates.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));
    let mut var = f64::NEG_INFINITY;
    let mut es = f64::NEG_INFINITY;
    for e in estimates.iter_mut() {
        var = var.max(e.var);
        es = es.max(e.expected_shortfall).max(var);
        e.var = var;
        e.expected_shortfall = es;
    }
}

fn from_sorted_losses(
    sorted: &[f64],
    confidences: &[f64],
    scale: f64,
    method: VarMethod,
    horizon_days: u32,
) -> AnalyticsResult<Vec<VarEstimate>> {
    let to_err = |e: sluice_math::MathError| AnalyticsError::computation("var", e.to_string());
    let mut out = check_levels(confidences)?
        .into_iter()
        .map(|c| {
            Ok(VarEstimate {
                confidence: c,
                var: quantile_sorted(sorted, c).map_err(to_err)? * scale,
                expected_shortfall: tail_mean_sorted(sorted, c).map_err(to_err)? * scale,
                method,
                horizon_days,
            })
        })
        .collect::<AnalyticsResult<Vec<_>>>()?;
    enforce_monotone(&mut out);
    Ok(out)
}

/// Historical VaR from per-period portfolio returns.
///
/// Losses are `−r × value`; the interpolated loss quantile is scaled by
/// `√horizon`.
pub fn historical_var(
    returns: &[f64],
    portfolio_value: f64,
    confidences: &[f64],
    horizon_days: u32,
) -> AnalyticsResult<Vec<VarEstimate>> {
    if returns.len() < 2 {
        return Err(AnalyticsError::computation(
            "var.historical",
            format!("need at least 2 returns, have {}", returns.len()),
        ));
    }
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(AnalyticsError::computation(
            "var.historical",
            "non-finite return",
        ));
    }
    let mut losses: Vec<f64> = returns.iter().map(|r| -r * portfolio_value).collect();
    losses.sort_by(f64::total_cmp);
    from_sorted_losses(
        &losses,
        confidences,
        f64::from(horizon_days).sqrt(),
        VarMethod::Historical,
        horizon_days,
    )
}

/// Parametric VaR: `z_c · √(wᵀΣw) · value · √horizon` with
/// `Σᵢⱼ = ρᵢⱼ σᵢ σⱼ`.
///
/// Expected shortfall uses the normal tail mean `σ_p · φ(z_c) / (1 − c)`.
pub fn parametric_var(
    weights: &[f64],
    volatilities: &[f64],
    correlation: &CorrelationMatrix,
    portfolio_value: f64,
    confidences: &[f64],
    horizon_days: u32,
) -> AnalyticsResult<Vec<VarEstimate>> {
    let n = correlation.dim();
    if weights.len() != n || volatilities.len() != n {
        return Err(AnalyticsError::computation(
            "var.parametric",
            format!(
                "{} weights and {} volatilities for a {n}x{n} matrix",
                weights.len(),
                volatilities.len()
            ),
        ));
    }
    let mut variance = 0.0;
    for i in 0..n {
        for j in 0..n {
            variance +=
                weights[i] * weights[j] * correlation.get(i, j) * volatilities[i] * volatilities[j];
        }
    }
    if !variance.is_finite() || variance < -1e-12 {
        return Err(AnalyticsError::computation(
            "var.parametric",
            format!("invalid portfolio variance {variance}"),
        ));
    }
    let sigma = variance.max(0.0).sqrt() * portfolio_value * f64::from(horizon_days).sqrt();

    let mut out = check_levels(confidences)?
        .into_iter()
        .map(|c| {
            let z = normal_inv_cdf(c)
                .map_err(|e| AnalyticsError::computation("var.parametric", e.to_string()))?;
            let density = (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt();
            Ok(VarEstimate {
                confidence: c,
                var: z * sigma,
                expected_shortfall: sigma * density / (1.0 - c),
                method: VarMethod::Parametric,
                horizon_days,
            })
        })
        .collect::<AnalyticsResult<Vec<_>>>()?;
    enforce_monotone(&mut out);
    Ok(out)
}

/// Credit-loss VaR from a simulated loss distribution.
///
/// The simulated losses already cover one model period, so no horizon
/// scaling is applied.
pub fn monte_carlo_var(
    distribution: &LossDistribution,
    confidences: &[f64],
) -> AnalyticsResult<Vec<VarEstimate>> {
    from_sorted_losses(
        distribution.samples(),
        confidences,
        1.0,
        VarMethod::MonteCarlo,
        1,
    )
}
