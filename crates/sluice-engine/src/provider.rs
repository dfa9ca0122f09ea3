//! Data provider contract.
//!
//! The orchestrator pulls every input through a [`DataProvider`]. A live
//! deployment implements it against its banking data feeds; tests and
//! demos use [`MockDataProvider`](crate::mock::MockDataProvider).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sluice_core::error::AnalyticsResult;
use sluice_core::types::{ObligorRecord, Tier, Tranche, Transaction};

/// Pull-based source of obligors, transactions and tranche definitions.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Current obligor records. Unchanged obligors may be repeated.
    async fn fetch_obligors(&self) -> AnalyticsResult<Vec<ObligorRecord>>;

    /// Transactions strictly after `since`, oldest first. `None` means all.
    async fn fetch_transactions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> AnalyticsResult<Vec<Transaction>>;

    /// Tranche definitions. An empty list defers to configuration.
    async fn fetch_tranches(&self) -> AnalyticsResult<Vec<Tranche>>;

    /// Quality of the data feeding `tier`, in `[0, 1]`.
    async fn data_quality(&self, tier: Tier) -> f64;
}
