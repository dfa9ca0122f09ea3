//! Update cadence tiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Recomputation tier.
///
/// Fast ticks only move the volatility term of the price, medium ticks
/// refresh obligor-linked yield inputs, slow ticks recompute every
/// downstream component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Sub-10-second cadence.
    Fast,
    /// Tens-of-seconds cadence.
    Medium,
    /// Minutes cadence.
    Slow,
}

impl Tier {
    /// All tiers, fastest first.
    pub const ALL: [Tier; 3] = [Tier::Fast, Tier::Medium, Tier::Slow];

    /// Lower-case tier name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
