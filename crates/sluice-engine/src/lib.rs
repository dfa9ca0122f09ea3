//! # Sluice Engine
//!
//! Tiered orchestration of the Sluice analytics pipeline.
//!
//! - **Provider**: the async [`DataProvider`] contract, plus a seeded
//!   [`MockDataProvider`] for tests and demos
//! - **Orchestrator**: one tokio task per tier, publishing immutable
//!   [`AnalyticsSnapshot`]s through a `watch` channel
//! - **Queries**: a clonable [`QueryHandle`] for prices, risk reports,
//!   waterfalls, correlation and on-demand stress tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sluice_config::EngineConfig;
//! use sluice_engine::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(MockDataProvider::new(MockConfig::default()));
//! let engine = Orchestrator::bootstrap(EngineConfig::default(), provider).await?;
//! engine.start().await?;
//!
//! let query = engine.query_handle();
//! let report = query.get_risk_report()?;
//! println!("expected loss {:.2}", report.expected_loss);
//!
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod cache;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod provider;
pub mod quality;
pub mod query;
pub mod snapshot;

pub use cache::{CacheStats, ScoreCache};
pub use error::{QueryError, QueryResult};
pub use mock::{MockConfig, MockDataProvider};
pub use orchestrator::{Orchestrator, SnapshotReceiver};
pub use provider::DataProvider;
pub use quality::{QualityAssessment, QualityLevel};
pub use query::QueryHandle;
pub use snapshot::{
    AnalyticsSnapshot, EngineHealth, HealthStatus, SnapshotIssue, TierState, TierStatus,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::mock::{MockConfig, MockDataProvider};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::provider::DataProvider;
    pub use crate::query::QueryHandle;
    pub use crate::snapshot::{AnalyticsSnapshot, EngineHealth, HealthStatus, SnapshotIssue};
}
