//! # Sluice Pricing
//!
//! Price simulation for the synthetic credit instrument.
//!
//! The price is a stabilized composite of a fixed peg, the yield accrued
//! since the last distribution, and a mean-reverting volatility term. Three
//! tiers drive it at different cadences (see [`sluice_core::types::Tier`]).
//!
//! # Modules
//!
//! - [`config`]: simulation parameters
//! - [`simulator`]: the stateful [`PriceSimulator`]
//! - [`yield_rate`]: trailing pool yield rate feeding the accrual
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use sluice_core::types::Tier;
//! use sluice_pricing::{PriceConfig, PriceSimulator};
//!
//! let mut sim = PriceSimulator::new(PriceConfig::default()).unwrap();
//! sim.set_yield_rate(0.08, Utc::now()).unwrap();
//! let tick = sim.tick(Tier::Fast, Utc::now());
//! assert!((tick.composite - 1.0).abs() <= 0.05);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod config;
pub mod simulator;
pub mod yield_rate;

pub use config::PriceConfig;
pub use simulator::PriceSimulator;
pub use yield_rate::trailing_yield_rate;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use super::config::PriceConfig;
    pub use super::simulator::PriceSimulator;
    pub use super::yield_rate::trailing_yield_rate;
}
