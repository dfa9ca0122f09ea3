//! # Sluice Core
//!
//! Core domain types and the error taxonomy for the Sluice credit analytics
//! engine.
//!
//! - **Identifiers**: `ObligorId`, `TransactionId`, `TrancheId`, `ScenarioId`
//! - **Types**: obligors, transactions, tranches, price ticks, correlation matrices
//! - **Errors**: `AnalyticsError` with its four kinds (data quality, stale data,
//!   computation, configuration)
//!
//! ## Example
//!
//! ```rust
//! use sluice_core::prelude::*;
//! use rust_decimal_macros::dec;
//!
//! let tranches = TrancheSet::new(vec![
//!     Tranche::new("senior", 1, dec!(0.2), dec!(1.0)),
//!     Tranche::new("equity", 2, dec!(0.0), dec!(0.2)),
//! ])
//! .unwrap();
//!
//! let losses = tranches.allocate_loss(dec!(0.25));
//! assert_eq!(losses[0].absorbed, dec!(0.20));
//! assert_eq!(losses[1].absorbed, dec!(0.05));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod ids;
pub mod types;
pub mod validation;

pub use error::{AnalyticsError, AnalyticsResult, ErrorKind};
pub use ids::{ObligorId, ScenarioId, TrancheId, TransactionId};
pub use validation::{Validate, ValidationError};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{AnalyticsError, AnalyticsResult, ErrorKind};
    pub use crate::ids::{ObligorId, ScenarioId, TrancheId, TransactionId};
    pub use crate::types::{
        CashFlowKind, CorrelationMatrix, Direction, Feature, FeatureVector, LossAllocation,
        Obligor, ObligorRecord, PriceTick, Sector, Tier, Tranche, TrancheSet, Transaction,
        TransactionStatus,
    };
    pub use crate::validation::{Validate, ValidationError};
    pub use rust_decimal::Decimal;
}
