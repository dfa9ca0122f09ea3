//! # Sluice Store
//!
//! Append-only time-series store for obligor records, transactions and
//! price ticks.
//!
//! The store has exactly one [`StoreWriter`] and any number of
//! [`StoreReader`]s. Readers take [`StoreSnapshot`]s: immutable views that
//! stay consistent while the writer keeps appending.
//!
//! ```rust
//! use sluice_store::TimeSeriesStore;
//!
//! let (_writer, reader) = TimeSeriesStore::new();
//! assert_eq!(reader.snapshot().obligor_count(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod snapshot;
mod store;

pub use snapshot::StoreSnapshot;
pub use store::{IngestReport, SharedWriter, StoreReader, StoreWriter, TimeSeriesStore};
