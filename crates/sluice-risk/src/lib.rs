//! # Sluice Risk
//!
//! Pool-level credit risk analytics for the Sluice engine.
//!
//! - **Correlation**: sample correlation of exposure returns with shrinkage
//!   toward the identity when the estimate is near-singular
//! - **Concentration**: Herfindahl index, effective obligor count, sector
//!   shares
//! - **VaR**: historical, parametric and simulated credit-loss VaR with
//!   expected shortfall
//! - **Stress testing**: configurable scenarios with tranche loss allocation
//! - **Calculator**: one [`RiskReport`] per evaluation, with failed metrics
//!   listed instead of aborting the report
//!
//! ## Example
//!
//! ```rust
//! use sluice_risk::prelude::*;
//! use sluice_core::types::Sector;
//!
//! let positions = vec![
//!     PoolPosition::new("A", Sector::Retail, 500.0, 0.02),
//!     PoolPosition::new("B", Sector::Energy, 500.0, 0.04),
//! ];
//! let report = concentration(&positions).unwrap();
//! assert!((report.hhi - 0.5).abs() < 1e-12);
//! assert_eq!(report.level, ConcentrationLevel::High);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod calculator;
pub mod concentration;
pub mod config;
pub mod correlation;
pub mod position;
pub mod stress;
pub mod var;

pub use calculator::{OmittedMetric, RiskCalculator, RiskInputs, RiskReport};
pub use config::{CorrelationConfig, RiskConfig};
pub use stress::{StressKind, StressResult, StressScenario};
pub use var::{VarEstimate, VarMethod};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::calculator::{OmittedMetric, RiskCalculator, RiskInputs, RiskReport};
    pub use crate::concentration::{concentration, ConcentrationLevel, ConcentrationReport};
    pub use crate::config::{CorrelationConfig, RiskConfig};
    pub use crate::correlation::{align_correlation, estimate_correlation, ReturnPanel};
    pub use crate::position::{total_exposure, weighted_pd, PoolPosition};
    pub use crate::stress::{standard, StressKind, StressOutcome, StressResult, StressScenario};
    pub use crate::var::{
        enforce_monotone, historical_var, monte_carlo_var, parametric_var, VarEstimate,
        VarMethod,
    };
}
