//! Top-level engine configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::types::TrancheSet;
use sluice_core::validation::{Validate, ValidationError};
use sluice_models::{ScoringConfig, TailConfig};
use sluice_pricing::PriceConfig;
use sluice_risk::stress::standard;
use sluice_risk::{CorrelationConfig, RiskConfig, StressScenario};
use sluice_yield::YieldConfig;

use crate::sections::{DataQualityConfig, PoolConfig, TierSchedule};

/// Everything the engine needs, loaded once at startup.
///
/// Every section falls back to its defaults, so an empty document is a
/// valid configuration.
///
/// ```rust
/// use sluice_config::EngineConfig;
///
/// let config = EngineConfig::from_toml_str(r#"
///     [tiers]
///     fast_secs = 2
///
///     [risk]
///     var_method = "parametric"
/// "#).unwrap();
/// assert_eq!(config.tiers.fast_secs, 2);
/// assert_eq!(config.tiers.slow_secs, 600);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tier cadences.
    #[serde(default)]
    pub tiers: TierSchedule,

    /// Pool notional, distribution period and tranches.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Price simulation.
    #[serde(default)]
    pub price: PriceConfig,

    /// Risk metrics.
    #[serde(default)]
    pub risk: RiskConfig,

    /// Correlation estimation.
    #[serde(default)]
    pub correlation: CorrelationConfig,

    /// Credit scoring model.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Tail-dependence model.
    #[serde(default)]
    pub tail: TailConfig,

    /// Yield waterfall.
    #[serde(default, rename = "yield")]
    pub yields: YieldConfig,

    /// Data-quality thresholds.
    #[serde(default)]
    pub data_quality: DataQualityConfig,

    /// Stress scenarios evaluated every slow cycle and on demand.
    #[serde(default = "standard::all")]
    pub scenarios: Vec<StressScenario>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tiers: TierSchedule::default(),
            pool: PoolConfig::default(),
            price: PriceConfig::default(),
            risk: RiskConfig::default(),
            correlation: CorrelationConfig::default(),
            scoring: ScoringConfig::default(),
            tail: TailConfig::default(),
            yields: YieldConfig::default(),
            data_quality: DataQualityConfig::default(),
            scenarios: standard::all(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> AnalyticsResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AnalyticsError::configuration("config", e.to_string()))?;
        config.validated()
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AnalyticsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalyticsError::configuration("config", format!("{}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), scenarios = config.scenarios.len(), "configuration loaded");
        Ok(config)
    }

    /// Returns `self` if valid, otherwise one configuration error listing
    /// every failure.
    pub fn validated(self) -> AnalyticsResult<Self> {
        let errors = self.validate();
        match errors.len() {
            0 => Ok(self),
            1 => Err(errors.into_iter().next().map_or_else(
                || AnalyticsError::configuration("config", "invalid"),
                AnalyticsError::from,
            )),
            n => {
                let field = errors[0].field.clone();
                let all: Vec<String> = errors.iter().map(ToString::to_string).collect();
                Err(AnalyticsError::configuration(
                    field,
                    format!("{n} errors: {}", all.join("; ")),
                ))
            }
        }
    }

    /// The validated tranche stack.
    pub fn tranche_set(&self) -> AnalyticsResult<TrancheSet> {
        TrancheSet::new(self.pool.tranches.clone())
    }

    /// Looks up a configured scenario.
    #[must_use]
    pub fn scenario(&self, id: &str) -> Option<&StressScenario> {
        self.scenarios.iter().find(|s| s.id.as_str() == id)
    }

    /// Replaces the tier schedule.
    #[must_use]
    pub fn with_tiers(mut self, tiers: TierSchedule) -> Self {
        self.tiers = tiers;
        self
    }

    /// Replaces the pool section.
    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Replaces the price section.
    #[must_use]
    pub fn with_price(mut self, price: PriceConfig) -> Self {
        self.price = price;
        self
    }

    /// Replaces the risk section.
    #[must_use]
    pub fn with_risk(mut self, risk: RiskConfig) -> Self {
        self.risk = risk;
        self
    }

    /// Replaces the scoring section.
    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Replaces the tail section.
    #[must_use]
    pub fn with_tail(mut self, tail: TailConfig) -> Self {
        self.tail = tail;
        self
    }

    /// Replaces the data-quality section.
    #[must_use]
    pub fn with_data_quality(mut self, data_quality: DataQualityConfig) -> Self {
        self.data_quality = data_quality;
        self
    }

    /// Replaces the scenario list.
    #[must_use]
    pub fn with_scenarios(mut self, scenarios: Vec<StressScenario>) -> Self {
        self.scenarios = scenarios;
        self
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut section = |name: &str, found: Vec<ValidationError>| {
            errors.extend(found.into_iter().map(|e| e.in_section(name)));
        };
        section("tiers", self.tiers.validate());
        section("pool", self.pool.validate());
        section("price", self.price.validate());
        section("risk", self.risk.validate());
        section("correlation", self.correlation.validate());
        section("scoring", self.scoring.validate());
        section("tail", self.tail.validate());
        section("yield", self.yields.validate());
        section("data_quality", self.data_quality.validate());

        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            errors.extend(
                scenario
                    .validate()
                    .into_iter()
                    .map(|e| e.in_section("scenarios")),
            );
            if !seen.insert(scenario.id.clone()) {
                errors.push(ValidationError::new(
                    format!("scenarios.{}", scenario.id),
                    "duplicate scenario id",
                ));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sluice_core::error::ErrorKind;
    use sluice_risk::{StressKind, VarMethod};

    #[test]
    fn test_defaults_valid() {
        let config = EngineConfig::default();
        assert!(config.is_valid(), "{:?}", config.validate());
        assert_eq!(config.scenarios.len(), 6);
        assert_eq!(config.tranche_set().unwrap().len(), 3);
    }

    #[test]
    fn test_empty_document() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [pool]
            notional = 5000000

            [[pool.tranches]]
            id = "senior"
            seniority_rank = 1
            attachment = 0.25
            detachment = 1.0
            coupon_rate = 0.04

            [[pool.tranches]]
            id = "equity"
            seniority_rank = 2
            attachment = 0.0
            detachment = 0.25
            coupon_rate = 0.2

            [risk]
            var_method = "monte_carlo"
            confidence_levels = [0.9, 0.99]

            [yield]
            apy_convention = "simple"

            [[scenarios]]
            id = "energy_shock"
            type = "pd_multiplier"
            multiplier = 4.0
            sectors = ["energy"]
            "#,
        )
        .unwrap();
        assert_eq!(config.pool.notional, dec!(5000000));
        assert_eq!(config.tranche_set().unwrap().len(), 2);
        assert_eq!(config.risk.var_method, VarMethod::MonteCarlo);
        assert_eq!(config.scenarios.len(), 1);
        let scenario = config.scenario("energy_shock").unwrap();
        assert!(scenario.adverse);
        assert!(matches!(
            scenario.kind,
            StressKind::PdMultiplier { multiplier, .. } if (multiplier - 4.0).abs() < 1e-12
        ));
    }

    #[test]
    fn test_errors_collected_with_sections() {
        let config = EngineConfig::default()
            .with_tiers(TierSchedule::default().with_cadences(0, 45, 600))
            .with_risk(RiskConfig::default().with_confidence_levels(vec![1.5]));
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "tiers.fast_secs"));
        assert!(errors.iter().any(|e| e.field == "risk.confidence_levels"));

        let err = config.validated().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_duplicate_scenarios() {
        let config = EngineConfig::default()
            .with_scenarios(vec![standard::systemic_shock(), standard::systemic_shock()]);
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "scenarios.systemic_shock");
    }

    #[test]
    fn test_bad_toml() {
        let err = EngineConfig::from_toml_str("[tiers\nfast_secs = ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = EngineConfig::from_toml_str("[tiers]\nfast_secs = \"soon\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
