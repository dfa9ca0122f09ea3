//! # Sluice Config
//!
//! Configuration for the Sluice credit analytics engine.
//!
//! One [`EngineConfig`] aggregates every component's settings. It is loaded
//! from TOML, every section is optional and falls back to its defaults, and
//! validation collects all failures (prefixed with their section) into a
//! single fatal configuration error.
//!
//! ```toml
//! [tiers]
//! fast_secs = 5
//! medium_secs = 45
//! slow_secs = 600
//!
//! [pool]
//! notional = 10000000
//!
//! [risk]
//! var_method = "historical"
//! confidence_levels = [0.95, 0.99]
//!
//! [[scenarios]]
//! id = "severe_recession"
//! type = "pd_multiplier"
//! multiplier = 3.0
//! recovery_rate = 0.3
//! correlation_shift = 0.2
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod engine;
pub mod sections;

pub use engine::EngineConfig;
pub use sections::{DataQualityConfig, PoolConfig, TierSchedule};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::engine::EngineConfig;
    pub use crate::sections::{DataQualityConfig, PoolConfig, TierSchedule};
    pub use sluice_core::validation::Validate;
}
