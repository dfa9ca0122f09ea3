//! Engine-level configuration sections.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use sluice_core::types::{Tier, Tranche};
use sluice_core::validation::{Validate, ValidationError};

// =============================================================================
// TIER SCHEDULE
// =============================================================================

/// Cadence of each recomputation tier, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSchedule {
    /// Fast tier (price volatility).
    #[serde(default = "default_fast_secs")]
    pub fast_secs: u64,

    /// Medium tier (yield inputs).
    #[serde(default = "default_medium_secs")]
    pub medium_secs: u64,

    /// Slow tier (full recomputation).
    #[serde(default = "default_slow_secs")]
    pub slow_secs: u64,
}

fn default_fast_secs() -> u64 {
    5
}

fn default_medium_secs() -> u64 {
    45
}

fn default_slow_secs() -> u64 {
    600
}

impl Default for TierSchedule {
    fn default() -> Self {
        Self {
            fast_secs: default_fast_secs(),
            medium_secs: default_medium_secs(),
            slow_secs: default_slow_secs(),
        }
    }
}

impl TierSchedule {
    /// Interval between ticks of `tier`.
    #[must_use]
    pub fn cadence(&self, tier: Tier) -> Duration {
        Duration::from_secs(match tier {
            Tier::Fast => self.fast_secs,
            Tier::Medium => self.medium_secs,
            Tier::Slow => self.slow_secs,
        })
    }

    /// Sets all three cadences.
    #[must_use]
    pub fn with_cadences(mut self, fast: u64, medium: u64, slow: u64) -> Self {
        self.fast_secs = fast;
        self.medium_secs = medium;
        self.slow_secs = slow;
        self
    }
}

impl Validate for TierSchedule {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for tier in Tier::ALL {
            if self.cadence(tier).is_zero() {
                errors.push(ValidationError::new(
                    format!("{tier}_secs"),
                    "cadence must be at least one second",
                ));
            }
        }
        if self.fast_secs > self.medium_secs || self.medium_secs > self.slow_secs {
            errors.push(ValidationError::new(
                "slow_secs",
                format!(
                    "cadences must not decrease from fast to slow ({} / {} / {})",
                    self.fast_secs, self.medium_secs, self.slow_secs
                ),
            ));
        }
        errors
    }
}

// =============================================================================
// POOL
// =============================================================================

/// Pool-wide parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Original pool notional that tranche points refer to.
    #[serde(default = "default_notional")]
    pub notional: Decimal,

    /// Length of a distribution period in days.
    #[serde(default = "default_distribution_days")]
    pub distribution_days: u32,

    /// Tranche stack.
    #[serde(default = "default_tranches")]
    pub tranches: Vec<Tranche>,
}

fn default_notional() -> Decimal {
    dec!(10_000_000)
}

fn default_distribution_days() -> u32 {
    30
}

/// Senior 20-100%, mezzanine 10-20%, equity 0-10%.
fn default_tranches() -> Vec<Tranche> {
    vec![
        Tranche::new("senior", 1, dec!(0.20), dec!(1.00)).with_coupon(dec!(0.05)),
        Tranche::new("mezzanine", 2, dec!(0.10), dec!(0.20)).with_coupon(dec!(0.09)),
        Tranche::new("equity", 3, dec!(0.00), dec!(0.10)).with_coupon(dec!(0.18)),
    ]
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            notional: default_notional(),
            distribution_days: default_distribution_days(),
            tranches: default_tranches(),
        }
    }
}

impl PoolConfig {
    /// Sets the pool notional.
    #[must_use]
    pub fn with_notional(mut self, notional: Decimal) -> Self {
        self.notional = notional;
        self
    }

    /// Replaces the tranche stack.
    #[must_use]
    pub fn with_tranches(mut self, tranches: Vec<Tranche>) -> Self {
        self.tranches = tranches;
        self
    }
}

impl Validate for PoolConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.notional <= Decimal::ZERO {
            errors.push(ValidationError::new(
                "notional",
                format!("must be positive, got {}", self.notional),
            ));
        }
        if self.distribution_days == 0 {
            errors.push(ValidationError::new(
                "distribution_days",
                "must be at least one day",
            ));
        }
        // structural checks live in TrancheSet::new
        if let Err(e) = sluice_core::types::TrancheSet::new(self.tranches.clone()) {
            errors.push(ValidationError::new("tranches", e.to_string()));
        }
        errors
    }
}

// =============================================================================
// DATA QUALITY
// =============================================================================

/// Thresholds for the provider's data-quality signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityConfig {
    /// Snapshots built from data scoring below this are marked degraded.
    #[serde(default = "default_min_quality")]
    pub min_quality: f64,

    /// Maximum age of the newest obligor record before it counts as stale.
    #[serde(default = "default_max_staleness_secs")]
    pub max_staleness_secs: u64,

    /// Score deducted for an empty obligor batch or an empty initial
    /// transaction load.
    #[serde(default = "default_empty_batch_penalty")]
    pub empty_batch_penalty: f64,

    /// Score deducted per record that fails field validation.
    #[serde(default = "default_invalid_record_penalty")]
    pub invalid_record_penalty: f64,

    /// Score deducted per transaction naming an obligor the store has never seen.
    #[serde(default = "default_unknown_obligor_penalty")]
    pub unknown_obligor_penalty: f64,
}

fn default_min_quality() -> f64 {
    0.8
}

fn default_max_staleness_secs() -> u64 {
    3_600
}

fn default_empty_batch_penalty() -> f64 {
    0.20
}

fn default_invalid_record_penalty() -> f64 {
    0.10
}

fn default_unknown_obligor_penalty() -> f64 {
    0.05
}

impl Default for DataQualityConfig {
    fn default() -> Self {
        Self {
            min_quality: default_min_quality(),
            max_staleness_secs: default_max_staleness_secs(),
            empty_batch_penalty: default_empty_batch_penalty(),
            invalid_record_penalty: default_invalid_record_penalty(),
            unknown_obligor_penalty: default_unknown_obligor_penalty(),
        }
    }
}

impl Validate for DataQualityConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.min_quality) {
            errors.push(ValidationError::new(
                "min_quality",
                format!("must lie in [0, 1], got {}", self.min_quality),
            ));
        }
        if self.max_staleness_secs == 0 {
            errors.push(ValidationError::new(
                "max_staleness_secs",
                "must be positive",
            ));
        }
        for (field, value) in [
            ("empty_batch_penalty", self.empty_batch_penalty),
            ("invalid_record_penalty", self.invalid_record_penalty),
            ("unknown_obligor_penalty", self.unknown_obligor_penalty),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ValidationError::new(
                    field,
                    format!("must lie in [0, 1], got {value}"),
                ));
            }
        }
        errors
    }
}
