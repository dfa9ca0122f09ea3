//! Price simulation configuration.

use serde::{Deserialize, Serialize};
use sluice_core::validation::{Validate, ValidationError};

/// Parameters of the simulated price stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceConfig {
    /// Fixed reference value.
    #[serde(default = "default_peg")]
    pub peg: f64,

    /// Maximum relative deviation of the composite from peg.
    #[serde(default = "default_max_depeg")]
    pub max_depeg: f64,

    /// Stationary standard deviation of the volatility term, as a fraction of peg.
    #[serde(default = "default_volatility")]
    pub volatility: f64,

    /// Half-life of a volatility shock, in seconds.
    #[serde(default = "default_half_life_secs")]
    pub half_life_secs: f64,

    /// Age after which the yield-rate input is considered stale, in seconds.
    #[serde(default = "default_yield_staleness_secs")]
    pub yield_staleness_secs: f64,

    /// Trailing window for the pool yield rate, in days.
    #[serde(default = "default_yield_window_days")]
    pub yield_window_days: i64,

    /// RNG seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_peg() -> f64 {
    1.0
}

fn default_max_depeg() -> f64 {
    0.05
}

fn default_volatility() -> f64 {
    0.004
}

fn default_half_life_secs() -> f64 {
    300.0
}

fn default_yield_staleness_secs() -> f64 {
    // two medium-tier intervals
    90.0
}

fn default_yield_window_days() -> i64 {
    30
}

fn default_seed() -> u64 {
    42
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            peg: default_peg(),
            max_depeg: default_max_depeg(),
            volatility: default_volatility(),
            half_life_secs: default_half_life_secs(),
            yield_staleness_secs: default_yield_staleness_secs(),
            yield_window_days: default_yield_window_days(),
            seed: default_seed(),
        }
    }
}

impl PriceConfig {
    /// Sets the de-peg bound.
    #[must_use]
    pub fn with_max_depeg(mut self, max_depeg: f64) -> Self {
        self.max_depeg = max_depeg;
        self
    }

    /// Sets the volatility.
    #[must_use]
    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the yield staleness threshold.
    #[must_use]
    pub fn with_yield_staleness_secs(mut self, secs: f64) -> Self {
        self.yield_staleness_secs = secs;
        self
    }

    /// Lower and upper composite bounds.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        (
            self.peg * (1.0 - self.max_depeg),
            self.peg * (1.0 + self.max_depeg),
        )
    }
}

impl Validate for PriceConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !(self.peg > 0.0) || !self.peg.is_finite() {
            errors.push(ValidationError::new("peg", "peg must be positive"));
        }
        if !(self.max_depeg > 0.0 && self.max_depeg < 1.0) {
            errors.push(ValidationError::new(
                "max_depeg",
                format!("must lie in (0, 1), got {}", self.max_depeg),
            ));
        }
        if !(self.volatility >= 0.0) || !self.volatility.is_finite() {
            errors.push(ValidationError::new("volatility", "must be non-negative"));
        }
        if !(self.half_life_secs > 0.0) {
            errors.push(ValidationError::new("half_life_secs", "must be positive"));
        }
        if !(self.yield_staleness_secs > 0.0) {
            errors.push(ValidationError::new(
                "yield_staleness_secs",
                "must be positive",
            ));
        }
        if self.yield_window_days <= 0 {
            errors.push(ValidationError::new("yield_window_days", "must be positive"));
        }
        errors
    }
}
