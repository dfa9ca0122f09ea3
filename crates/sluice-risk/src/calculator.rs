//! Integrated pool risk calculator.
//!
//! [`RiskCalculator`] evaluates every risk metric for one set of inputs and
//! collects them into a [`RiskReport`]. A metric that cannot be computed is
//! left out of the report and listed in [`RiskReport::omitted`]; the other
//! metrics are still published.
//!
//! # Example
//!
//! ```ignore
//! use sluice_risk::calculator::{RiskCalculator, RiskInputs};
//!
//! let calc = RiskCalculator::new(RiskConfig::default(), tail_config.build()?)?;
//! let report = calc.compute(&inputs, &standard::all(), Utc::now());
//!
//! for v in &report.var {
//!     println!("{v}");
//! }
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use sluice_core::error::{AnalyticsError, AnalyticsResult, ErrorKind};
use sluice_core::ids::{ObligorId, ScenarioId};
use sluice_core::types::{CorrelationMatrix, TrancheSet};
use sluice_core::validation::Validate;
use sluice_models::tail::{TailDependenceModel, TailDependenceReport, TailInput};

use crate::concentration::{concentration, ConcentrationReport};
use crate::config::RiskConfig;
use crate::correlation::{align_correlation, ReturnPanel};
use crate::position::{total_exposure, weighted_pd, PoolPosition};
use crate::stress::{StressResult, StressScenario};
use crate::var::{historical_var, monte_carlo_var, parametric_var, VarEstimate, VarMethod};

/// Inputs for one risk evaluation.
#[derive(Debug, Clone)]
pub struct RiskInputs<'a> {
    /// Pool positions with their current default probabilities.
    pub positions: &'a [PoolPosition],
    /// Obligor correlation matrix.
    pub correlation: Arc<CorrelationMatrix>,
    /// Historical returns, when enough history exists.
    pub returns: Option<&'a ReturnPanel>,
    /// Tranche stack used for stressed loss allocation.
    pub tranches: &'a TrancheSet,
    /// Pool notional that tranche attachment points refer to.
    pub pool_notional: f64,
}

/// A metric left out of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmittedMetric {
    /// Metric name, e.g. `var` or `stress.severe_recession`.
    pub metric: String,
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable reason.
    pub reason: String,
}

impl OmittedMetric {
    fn new(metric: impl Into<String>, error: &AnalyticsError) -> Self {
        Self {
            metric: metric.into(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Pool risk metrics at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Scenario the report was computed under, for on-demand stress runs.
    pub scenario: Option<ScenarioId>,
    /// Number of obligors evaluated.
    pub obligor_count: usize,
    /// Total exposure.
    pub total_exposure: f64,
    /// Expected loss `Σ PDᵢ · LGDᵢ · EADᵢ`.
    pub expected_loss: f64,
    /// Exposure-weighted default probability.
    pub weighted_pd: f64,
    /// VaR per configured confidence level, ascending.
    pub var: Vec<VarEstimate>,
    /// Stress scenario results.
    pub stress: Vec<StressResult>,
    /// Concentration metrics.
    pub concentration: Option<ConcentrationReport>,
    /// Correlation matrix the metrics were computed with.
    pub correlation: Arc<CorrelationMatrix>,
    /// Largest pairwise tail-dependence coefficient.
    pub tail_dependence_coefficient: Option<f64>,
    /// Full tail-dependence output.
    pub tail: Option<TailDependenceReport>,
    /// Metrics that could not be computed.
    pub omitted: Vec<OmittedMetric>,
}

impl RiskReport {
    /// Returns true if every metric was computed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.omitted.is_empty()
    }

    /// VaR at the given confidence level.
    #[must_use]
    pub fn var_at(&self, confidence: f64) -> Option<&VarEstimate> {
        self.var
            .iter()
            .find(|v| (v.confidence - confidence).abs() < 1e-9)
    }

    /// Result for one stress scenario.
    #[must_use]
    pub fn stress_result(&self, id: &ScenarioId) -> Option<&StressResult> {
        self.stress.iter().find(|s| &s.scenario_id == id)
    }

    /// Expected loss as a fraction of total exposure.
    #[must_use]
    pub fn expected_loss_rate(&self) -> f64 {
        if self.total_exposure > 0.0 {
            self.expected_loss / self.total_exposure
        } else {
            0.0
        }
    }
}

/// Pool-level inputs after alignment to position order.
struct Prepared {
    ids: Vec<ObligorId>,
    correlation: Arc<CorrelationMatrix>,
    panel: Option<ReturnPanel>,
    losses: Vec<Vec<f64>>,
}

/// Calculator for pool risk metrics.
///
/// Holds no mutable state: the same inputs always give the same report.
pub struct RiskCalculator {
    config: RiskConfig,
    tail: Arc<dyn TailDependenceModel>,
    tail_confidence: f64,
}

impl std::fmt::Debug for RiskCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskCalculator")
            .field("config", &self.config)
            .field("tail", &self.tail.name())
            .field("tail_confidence", &self.tail_confidence)
            .finish()
    }
}

impl RiskCalculator {
    /// Creates a calculator.
    pub fn new(config: RiskConfig, tail: Arc<dyn TailDependenceModel>) -> AnalyticsResult<Self> {
        config.ensure_valid()?;
        let tail_confidence = config
            .confidence_levels
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(Self {
            config,
            tail,
            tail_confidence,
        })
    }

    /// Sets the confidence level of the joint-loss estimate.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Configuration`] unless `confidence` lies in `(0, 1)`.
    pub fn with_tail_confidence(mut self, confidence: f64) -> AnalyticsResult<Self> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(AnalyticsError::configuration(
                "tail_confidence",
                format!("{confidence} is not in (0, 1)"),
            ));
        }
        self.tail_confidence = confidence;
        Ok(self)
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Computes all metrics plus one result per scenario.
    pub fn compute(
        &self,
        inputs: &RiskInputs<'_>,
        scenarios: &[StressScenario],
        generated_at: DateTime<Utc>,
    ) -> RiskReport {
        let lgds = vec![self.config.base_lgd(); inputs.positions.len()];
        let mut report = match self.prepare(inputs) {
            Ok(prepared) => self.evaluate(inputs, &prepared, &lgds, generated_at),
            Err(e) => self.empty_report(inputs, generated_at, &e),
        };

        for scenario in scenarios {
            match self.stress_result(inputs, scenario) {
                Ok((result, var_error)) => {
                    if let Some(e) = var_error {
                        report
                            .omitted
                            .push(OmittedMetric::new(format!("stress.{}.var", scenario.id), &e));
                    }
                    report.stress.push(result);
                }
                Err(e) => {
                    warn!(scenario = %scenario.id, error = %e, "stress scenario failed");
                    report
                        .omitted
                        .push(OmittedMetric::new(format!("stress.{}", scenario.id), &e));
                }
            }
        }
        debug!(
            obligors = report.obligor_count,
            expected_loss = report.expected_loss,
            omitted = report.omitted.len(),
            "risk report computed"
        );
        report
    }

    /// Recomputes the report under a single scenario.
    ///
    /// The stressed PDs, recoveries and correlation replace the baseline for
    /// every metric. Inputs are only read, so concurrent runs are safe.
    pub fn run_stress(
        &self,
        inputs: &RiskInputs<'_>,
        scenario: &StressScenario,
        generated_at: DateTime<Utc>,
    ) -> AnalyticsResult<RiskReport> {
        scenario.ensure_valid()?;
        let outcome = scenario.apply(inputs.positions, self.config.base_recovery)?;
        let stressed = RiskInputs {
            positions: &outcome.positions,
            correlation: Arc::new(scenario.stressed_correlation(&inputs.correlation)),
            returns: inputs.returns,
            tranches: inputs.tranches,
            pool_notional: inputs.pool_notional,
        };
        let prepared = self.prepare(&stressed)?;
        let mut report = self.evaluate(&stressed, &prepared, &outcome.lgds, generated_at);
        report.expected_loss = outcome.stressed_loss;
        report.scenario = Some(scenario.id.clone());

        let (result, var_error) = self.stress_result(inputs, scenario)?;
        if let Some(e) = var_error {
            report
                .omitted
                .push(OmittedMetric::new(format!("stress.{}.var", scenario.id), &e));
        }
        report.stress.push(result);
        Ok(report)
    }

    fn prepare(&self, inputs: &RiskInputs<'_>) -> AnalyticsResult<Prepared> {
        if inputs.positions.is_empty() {
            return Err(AnalyticsError::computation("risk", "pool has no obligors"));
        }
        let ids: Vec<ObligorId> = inputs.positions.iter().map(|p| p.id.clone()).collect();
        let correlation = if inputs.correlation.obligors() == ids.as_slice() {
            Arc::clone(&inputs.correlation)
        } else {
            Arc::new(align_correlation(&inputs.correlation, &ids)?)
        };
        let panel = inputs.returns.map(|p| p.aligned(&ids));
        let losses = panel.as_ref().map_or_else(Vec::new, |p| {
            p.returns()
                .iter()
                .map(|r| r.iter().map(|x| -x).collect())
                .collect()
        });
        Ok(Prepared {
            ids,
            correlation,
            panel,
            losses,
        })
    }

    fn empty_report(
        &self,
        inputs: &RiskInputs<'_>,
        generated_at: DateTime<Utc>,
        error: &AnalyticsError,
    ) -> RiskReport {
        RiskReport {
            generated_at,
            scenario: None,
            obligor_count: inputs.positions.len(),
            total_exposure: total_exposure(inputs.positions),
            expected_loss: 0.0,
            weighted_pd: weighted_pd(inputs.positions),
            var: Vec::new(),
            stress: Vec::new(),
            concentration: None,
            correlation: Arc::clone(&inputs.correlation),
            tail_dependence_coefficient: None,
            tail: None,
            omitted: vec![OmittedMetric::new("risk", error)],
        }
    }

    fn evaluate(
        &self,
        inputs: &RiskInputs<'_>,
        prepared: &Prepared,
        lgds: &[f64],
        generated_at: DateTime<Utc>,
    ) -> RiskReport {
        let positions = inputs.positions;
        let total = total_exposure(positions);
        let expected_loss = positions
            .iter()
            .zip(lgds)
            .map(|(p, lgd)| p.pd * lgd * p.exposure)
            .sum();
        let mut omitted = Vec::new();

        let concentration = match concentration(positions) {
            Ok(c) => Some(c),
            Err(e) => {
                omitted.push(OmittedMetric::new("concentration", &e));
                None
            }
        };

        let pds: Vec<f64> = positions.iter().map(|p| p.pd).collect();
        let loss_exposures: Vec<f64> = positions
            .iter()
            .zip(lgds)
            .map(|(p, lgd)| p.exposure * lgd)
            .collect();
        let tail_input = TailInput {
            obligors: &prepared.ids,
            default_probabilities: &pds,
            exposures: &loss_exposures,
            lgd: 1.0,
            correlation: &prepared.correlation,
            loss_series: &prepared.losses,
            confidence: self.tail_confidence,
        };

        let tail = match self.tail.tail_dependence(&tail_input) {
            Ok(t) => Some(t),
            Err(e) => {
                omitted.push(OmittedMetric::new("tail_dependence", &e));
                None
            }
        };

        let var = match self.var(positions, total, prepared, &tail_input) {
            Ok(v) => v,
            Err(e) => {
                warn!(method = %self.config.var_method, error = %e, "var omitted");
                omitted.push(OmittedMetric::new("var", &e));
                Vec::new()
            }
        };

        RiskReport {
            generated_at,
            scenario: None,
            obligor_count: positions.len(),
            total_exposure: total,
            expected_loss,
            weighted_pd: weighted_pd(positions),
            var,
            stress: Vec::new(),
            concentration,
            correlation: Arc::clone(&prepared.correlation),
            tail_dependence_coefficient: tail.as_ref().map(|t| t.coefficient),
            tail,
            omitted,
        }
    }

    fn var(
        &self,
        positions: &[PoolPosition],
        total: f64,
        prepared: &Prepared,
        tail_input: &TailInput<'_>,
    ) -> AnalyticsResult<Vec<VarEstimate>> {
        let levels = &self.config.confidence_levels;
        let horizon = self.config.horizon_days;
        match self.config.var_method {
            VarMethod::Historical | VarMethod::Parametric => {
                let panel = prepared.panel.as_ref().ok_or_else(|| {
                    AnalyticsError::computation("var", "no return history available")
                })?;
                if total <= 0.0 {
                    return Err(AnalyticsError::computation("var", "pool has no exposure"));
                }
                let weights: Vec<f64> = positions.iter().map(|p| p.exposure / total).collect();
                if self.config.var_method == VarMethod::Historical {
                    let returns = panel.portfolio_returns(&weights)?;
                    historical_var(&returns, total, levels, horizon)
                } else {
                    parametric_var(
                        &weights,
                        &panel.volatilities(),
                        &prepared.correlation,
                        total,
                        levels,
                        horizon,
                    )
                }
            }
            VarMethod::MonteCarlo => {
                let dist = self.tail.loss_distribution(tail_input)?;
                monte_carlo_var(&dist, levels)
            }
        }
    }

    /// Scenario result plus the error that kept its stressed VaR out, if any.
    ///
    /// Stressed VaR always comes from simulated credit losses: scenarios move
    /// PDs, recoveries and correlation, which return-based methods ignore.
    fn stress_result(
        &self,
        inputs: &RiskInputs<'_>,
        scenario: &StressScenario,
    ) -> AnalyticsResult<(StressResult, Option<AnalyticsError>)> {
        scenario.ensure_valid()?;
        let outcome = scenario.apply(inputs.positions, self.config.base_recovery)?;
        let total = total_exposure(inputs.positions);

        let ids: Vec<ObligorId> = outcome.positions.iter().map(|p| p.id.clone()).collect();
        let aligned = align_correlation(&inputs.correlation, &ids)?;
        let stressed_correlation = scenario.stressed_correlation(&aligned);
        let pds: Vec<f64> = outcome.positions.iter().map(|p| p.pd).collect();
        let loss_exposures: Vec<f64> = outcome
            .positions
            .iter()
            .zip(&outcome.lgds)
            .map(|(p, lgd)| p.exposure * lgd)
            .collect();
        let input = TailInput {
            obligors: &ids,
            default_probabilities: &pds,
            exposures: &loss_exposures,
            lgd: 1.0,
            correlation: &stressed_correlation,
            loss_series: &[],
            confidence: self.tail_confidence,
        };
        let (var, var_error) = match self
            .tail
            .loss_distribution(&input)
            .and_then(|d| monte_carlo_var(&d, &self.config.confidence_levels))
        {
            Ok(v) => (v, None),
            Err(e) => (Vec::new(), Some(e)),
        };

        let loss_rate = if inputs.pool_notional > 0.0 {
            outcome.stressed_loss / inputs.pool_notional
        } else {
            0.0
        };
        let tranche_losses = inputs
            .tranches
            .allocate_loss(to_decimal(loss_rate, "stress.loss_rate")?);

        let result = StressResult {
            scenario_id: scenario.id.clone(),
            kind: scenario.kind.label().to_string(),
            baseline_expected_loss: outcome.baseline_expected_loss,
            stressed_loss: outcome.stressed_loss,
            loss_increase: outcome.stressed_loss - outcome.baseline_expected_loss,
            loss_rate: if total > 0.0 {
                outcome.stressed_loss / total
            } else {
                0.0
            },
            stressed_weighted_pd: weighted_pd(&outcome.positions),
            affected_obligors: outcome.affected_obligors,
            var,
            tranche_losses,
        };
        Ok((result, var_error))
    }
}

fn to_decimal(value: f64, metric: &str) -> AnalyticsResult<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(12))
        .ok_or_else(|| AnalyticsError::computation(metric, format!("{value} is not representable")))
}
