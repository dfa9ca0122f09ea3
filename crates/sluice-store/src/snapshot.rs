//! Immutable point-in-time views of the store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use sluice_core::ids::{ObligorId, TransactionId};
use sluice_core::types::{Obligor, PriceTick, Transaction};

/// Full store contents. Cloned only when a writer mutates while a snapshot
/// of the previous state is still held.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    pub(crate) obligors: BTreeMap<ObligorId, Vec<Obligor>>,
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) transaction_ids: HashSet<TransactionId>,
    pub(crate) prices: Vec<PriceTick>,
    pub(crate) version: u64,
    pub(crate) last_ingest: Option<DateTime<Utc>>,
}

/// A consistent, immutable view of the store at one version.
///
/// Cloning is cheap; readers never block the writer.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    state: Arc<StoreState>,
}

impl StoreSnapshot {
    pub(crate) fn new(state: Arc<StoreState>) -> Self {
        Self { state }
    }

    /// Monotonic write watermark.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Wall-clock time of the last accepted write.
    #[must_use]
    pub fn last_ingest(&self) -> Option<DateTime<Utc>> {
        self.state.last_ingest
    }

    /// Latest record of every obligor, ordered by id.
    pub fn obligors(&self) -> impl Iterator<Item = &Obligor> {
        self.state.obligors.values().filter_map(|h| h.last())
    }

    /// Number of distinct obligors.
    #[must_use]
    pub fn obligor_count(&self) -> usize {
        self.state.obligors.len()
    }

    /// Latest record of one obligor.
    #[must_use]
    pub fn obligor(&self, id: &ObligorId) -> Option<&Obligor> {
        self.state.obligors.get(id).and_then(|h| h.last())
    }

    /// Every record ever ingested for an obligor, oldest first.
    #[must_use]
    pub fn obligor_history(&self, id: &ObligorId) -> &[Obligor] {
        self.state
            .obligors
            .get(id)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Exposure observations of an obligor, oldest first.
    #[must_use]
    pub fn exposure_series(&self, id: &ObligorId) -> Vec<f64> {
        self.obligor_history(id)
            .iter()
            .map(Obligor::exposure_f64)
            .collect()
    }

    /// Sum of latest exposures.
    #[must_use]
    pub fn total_exposure(&self) -> Decimal {
        self.obligors().map(|o| o.exposure).sum()
    }

    /// All transactions in timestamp order.
    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        &self.state.transactions
    }

    /// Transactions with `from <= timestamp < to`.
    pub fn transactions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = &Transaction> {
        let start = self
            .state
            .transactions
            .partition_point(|t| t.timestamp < from);
        self.state.transactions[start..]
            .iter()
            .take_while(move |t| t.timestamp < to)
    }

    /// Timestamp of the newest transaction.
    #[must_use]
    pub fn last_transaction_at(&self) -> Option<DateTime<Utc>> {
        self.state.transactions.last().map(|t| t.timestamp)
    }

    /// All price ticks in sequence order.
    #[must_use]
    pub fn price_ticks(&self) -> &[PriceTick] {
        &self.state.prices
    }

    /// Most recent price tick.
    #[must_use]
    pub fn latest_price(&self) -> Option<&PriceTick> {
        self.state.prices.last()
    }
}
