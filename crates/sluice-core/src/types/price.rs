//! Price ticks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Tier;

/// One point of the simulated price stream.
///
/// `composite = peg + yield_accrual + volatility`, clamped to the de-peg bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Monotonic sequence number.
    pub sequence: u64,
    /// Tick time.
    pub timestamp: DateTime<Utc>,
    /// Tier that produced the tick.
    pub tier: Tier,
    /// Fixed reference value.
    pub peg: f64,
    /// Accrued yield since the last distribution.
    pub yield_accrual: f64,
    /// Mean-reverting perturbation.
    pub volatility: f64,
    /// Resulting price.
    pub composite: f64,
    /// Set when the yield-rate input was stale and accrual was frozen.
    pub degraded: bool,
}

impl PriceTick {
    /// Relative deviation from peg.
    #[must_use]
    pub fn deviation(&self) -> f64 {
        if self.peg == 0.0 {
            0.0
        } else {
            (self.composite - self.peg) / self.peg
        }
    }
}
