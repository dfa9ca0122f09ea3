//! Domain types for the credit pool.
//!
//! - [`Obligor`], [`ObligorRecord`], [`FeatureVector`]: borrowers and their model inputs
//! - [`Transaction`]: append-only cash movements
//! - [`Tranche`], [`TrancheSet`]: risk slices and loss allocation
//! - [`PriceTick`]: simulated price stream
//! - [`CorrelationMatrix`]: obligor dependence
//! - [`Tier`]: recomputation cadence

mod correlation;
mod obligor;
mod price;
mod tier;
mod tranche;
mod transaction;

pub use correlation::CorrelationMatrix;
pub use obligor::{Feature, FeatureVector, Obligor, ObligorRecord, Sector, OBLIGOR_SCHEMA_VERSION};
pub use price::PriceTick;
pub use tier::Tier;
pub use tranche::{LossAllocation, Tranche, TrancheSet};
pub use transaction::{CashFlowKind, Direction, Transaction, TransactionStatus};
