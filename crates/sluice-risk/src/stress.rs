//! Stress scenario definitions and their loss impact.
//!
//! A scenario transforms the pool's default probabilities (and optionally
//! recovery and correlation); the stressed expected loss is compared against
//! the baseline `Σ PD · LGD · EAD`.

use serde::{Deserialize, Serialize};

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::ids::ScenarioId;
use sluice_core::types::{CorrelationMatrix, LossAllocation, Sector};
use sluice_core::validation::{Validate, ValidationError};

use crate::position::PoolPosition;
use crate::var::VarEstimate;

/// How a scenario shocks the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StressKind {
    /// The largest exposure defaults outright.
    LargestObligorDefault,

    /// Every obligor's PD moves a fraction of the way to certain default:
    /// `PD′ = PD + f·(1 − PD)`.
    SystemicDefaultShock {
        /// Fraction `f` in `[0, 1]`.
        fraction: f64,
    },

    /// PDs in the affected sectors are multiplied, capped at 1.
    PdMultiplier {
        /// PD multiplier (>= 1 for a downturn).
        multiplier: f64,
        /// Recovery rate for affected obligors; baseline recovery if absent.
        #[serde(default)]
        recovery_rate: Option<f64>,
        /// Affected sectors; empty means all.
        #[serde(default)]
        sectors: Vec<Sector>,
    },
}

impl StressKind {
    /// Short label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::LargestObligorDefault => "largest_obligor_default",
            Self::SystemicDefaultShock { .. } => "systemic_default_shock",
            Self::PdMultiplier { .. } => "pd_multiplier",
        }
    }
}

/// A named, configurable stress scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    /// Scenario identifier used by queries.
    pub id: ScenarioId,

    /// Description.
    #[serde(default)]
    pub description: Option<String>,

    /// The shock.
    #[serde(flatten)]
    pub kind: StressKind,

    /// Shift applied to every off-diagonal correlation: `ρ + s·(1 − ρ)`.
    #[serde(default)]
    pub correlation_shift: Option<f64>,

    /// Floors each obligor's stressed loss at its baseline loss.
    #[serde(default = "default_adverse")]
    pub adverse: bool,
}

fn default_adverse() -> bool {
    true
}

impl StressScenario {
    /// Creates an adverse scenario.
    #[must_use]
    pub fn new(id: impl Into<ScenarioId>, kind: StressKind) -> Self {
        Self {
            id: id.into(),
            description: None,
            kind,
            correlation_shift: None,
            adverse: true,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Sets the correlation shift.
    #[must_use]
    pub fn with_correlation_shift(mut self, shift: f64) -> Self {
        self.correlation_shift = Some(shift);
        self
    }

    /// Marks the scenario as adverse or not.
    #[must_use]
    pub fn with_adverse(mut self, adverse: bool) -> Self {
        self.adverse = adverse;
        self
    }

    /// Stressed default probability and recovery per position.
    pub fn stressed_parameters(
        &self,
        positions: &[PoolPosition],
        base_recovery: f64,
    ) -> Vec<(f64, f64)> {
        match &self.kind {
            StressKind::LargestObligorDefault => {
                let largest = positions
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.exposure.total_cmp(&b.exposure))
                    .map(|(i, _)| i);
                positions
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        if Some(i) == largest {
                            (1.0, base_recovery)
                        } else {
                            (p.pd, base_recovery)
                        }
                    })
                    .collect()
            }
            StressKind::SystemicDefaultShock { fraction } => positions
                .iter()
                .map(|p| (p.pd + fraction * (1.0 - p.pd), base_recovery))
                .collect(),
            StressKind::PdMultiplier {
                multiplier,
                recovery_rate,
                sectors,
            } => positions
                .iter()
                .map(|p| {
                    if sectors.is_empty() || sectors.contains(&p.sector) {
                        (
                            (p.pd * multiplier).min(1.0),
                            recovery_rate.unwrap_or(base_recovery),
                        )
                    } else {
                        (p.pd, base_recovery)
                    }
                })
                .collect(),
        }
    }

    /// Applies the scenario's correlation shift, if any.
    #[must_use]
    pub fn stressed_correlation(&self, correlation: &CorrelationMatrix) -> CorrelationMatrix {
        match self.correlation_shift {
            Some(shift) => correlation.shifted(shift),
            None => correlation.clone(),
        }
    }

    /// Stressed expected loss and per-position stressed PDs.
    pub fn apply(
        &self,
        positions: &[PoolPosition],
        base_recovery: f64,
    ) -> AnalyticsResult<StressOutcome> {
        let params = self.stressed_parameters(positions, base_recovery);
        let mut baseline = 0.0;
        let mut stressed = 0.0;
        let mut affected = 0;
        let mut stressed_positions = Vec::with_capacity(positions.len());
        let mut lgds = Vec::with_capacity(positions.len());

        for (p, (pd, recovery)) in positions.iter().zip(params) {
            let base = p.expected_loss(base_recovery);
            let pd = if self.adverse { pd.max(p.pd) } else { pd };
            let mut loss = pd * (1.0 - recovery) * p.exposure;
            if self.adverse {
                loss = loss.max(base);
            }
            if !loss.is_finite() {
                return Err(AnalyticsError::computation(
                    format!("stress.{}", self.id),
                    format!("non-finite stressed loss for {}", p.id),
                ));
            }
            if (pd - p.pd).abs() > f64::EPSILON || (recovery - base_recovery).abs() > f64::EPSILON {
                affected += 1;
            }
            baseline += base;
            stressed += loss;
            stressed_positions.push(PoolPosition {
                pd,
                ..p.clone()
            });
            lgds.push(1.0 - recovery);
        }

        Ok(StressOutcome {
            baseline_expected_loss: baseline,
            stressed_loss: stressed,
            affected_obligors: affected,
            positions: stressed_positions,
            lgds,
        })
    }
}

impl Validate for StressScenario {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.id.as_str().trim().is_empty() {
            errors.push(ValidationError::new("id", "scenario id is empty"));
        }
        match &self.kind {
            StressKind::LargestObligorDefault => {}
            StressKind::SystemicDefaultShock { fraction } => {
                if !(0.0..=1.0).contains(fraction) {
                    errors.push(ValidationError::new(
                        "fraction",
                        format!("must lie in [0, 1], got {fraction}"),
                    ));
                }
            }
            StressKind::PdMultiplier {
                multiplier,
                recovery_rate,
                ..
            } => {
                if !(*multiplier >= 0.0) || !multiplier.is_finite() {
                    errors.push(ValidationError::new(
                        "multiplier",
                        format!("must be finite and non-negative, got {multiplier}"),
                    ));
                }
                if let Some(r) = recovery_rate {
                    if !(0.0..=1.0).contains(r) {
                        errors.push(ValidationError::new(
                            "recovery_rate",
                            format!("must lie in [0, 1], got {r}"),
                        ));
                    }
                }
            }
        }
        if let Some(s) = self.correlation_shift {
            if !(0.0..=1.0).contains(&s) {
                errors.push(ValidationError::new(
                    "correlation_shift",
                    format!("must lie in [0, 1], got {s}"),
                ));
            }
        }
        errors
            .into_iter()
            .map(|e| e.in_section(self.id.as_str()))
            .collect()
    }
}

/// Intermediate result of applying a scenario.
#[derive(Debug, Clone)]
pub struct StressOutcome {
    /// Baseline expected loss.
    pub baseline_expected_loss: f64,
    /// Stressed expected loss.
    pub stressed_loss: f64,
    /// Obligors whose PD or recovery changed.
    pub affected_obligors: usize,
    /// Positions carrying stressed PDs.
    pub positions: Vec<PoolPosition>,
    /// Stressed loss given default per position.
    pub lgds: Vec<f64>,
}

/// Outcome of one stress scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressResult {
    /// Scenario identifier.
    pub scenario_id: ScenarioId,
    /// Scenario kind label.
    pub kind: String,
    /// Baseline expected loss.
    pub baseline_expected_loss: f64,
    /// Stressed expected loss.
    pub stressed_loss: f64,
    /// `stressed_loss − baseline_expected_loss`.
    pub loss_increase: f64,
    /// Stressed loss over pool notional.
    pub loss_rate: f64,
    /// Exposure-weighted stressed PD.
    pub stressed_weighted_pd: f64,
    /// Obligors whose parameters changed.
    pub affected_obligors: usize,
    /// Stressed VaR; empty when it could not be computed.
    pub var: Vec<VarEstimate>,
    /// Stressed loss run through the tranche stack.
    pub tranche_losses: Vec<LossAllocation>,
}

/// Scenarios used when none are configured.
pub mod standard {
    use super::{Sector, StressKind, StressScenario};

    /// The largest single exposure defaults.
    #[must_use]
    pub fn largest_obligor_default() -> StressScenario {
        StressScenario::new("largest_obligor_default", StressKind::LargestObligorDefault)
            .with_description("Largest single exposure defaults")
    }

    /// Ten percent systemic default shock.
    #[must_use]
    pub fn systemic_shock() -> StressScenario {
        StressScenario::new(
            "systemic_shock",
            StressKind::SystemicDefaultShock { fraction: 0.1 },
        )
        .with_description("Every PD moves 10% of the way to default")
    }

    /// Broad recession: PDs triple, recovery 30%.
    #[must_use]
    pub fn severe_recession() -> StressScenario {
        StressScenario::new(
            "severe_recession",
            StressKind::PdMultiplier {
                multiplier: 3.0,
                recovery_rate: Some(0.3),
                sectors: Vec::new(),
            },
        )
        .with_description("Broad recession: PD x3, recovery 30%")
        .with_correlation_shift(0.2)
    }

    /// Automotive sector crisis.
    #[must_use]
    pub fn industry_crisis() -> StressScenario {
        StressScenario::new(
            "industry_crisis",
            StressKind::PdMultiplier {
                multiplier: 2.5,
                recovery_rate: Some(0.4),
                sectors: vec![Sector::Automotive],
            },
        )
        .with_description("Automotive crisis: PD x2.5, recovery 40%")
    }

    /// Sovereign crisis with sharply higher correlation.
    #[must_use]
    pub fn sovereign_crisis() -> StressScenario {
        StressScenario::new(
            "sovereign_crisis",
            StressKind::PdMultiplier {
                multiplier: 2.0,
                recovery_rate: Some(0.5),
                sectors: Vec::new(),
            },
        )
        .with_description("Sovereign crisis: PD x2, recovery 50%")
        .with_correlation_shift(0.3)
    }

    /// Liquidity crisis: modest PD shock, very low recovery.
    #[must_use]
    pub fn liquidity_crisis() -> StressScenario {
        StressScenario::new(
            "liquidity_crisis",
            StressKind::PdMultiplier {
                multiplier: 1.5,
                recovery_rate: Some(0.25),
                sectors: Vec::new(),
            },
        )
        .with_description("Liquidity crisis: PD x1.5, recovery 25%")
        .with_correlation_shift(0.1)
    }

    /// All standard scenarios.
    #[must_use]
    pub fn all() -> Vec<StressScenario> {
        vec![
            largest_obligor_default(),
            systemic_shock(),
            severe_recession(),
            industry_crisis(),
            sovereign_crisis(),
            liquidity_crisis(),
        ]
    }
}
