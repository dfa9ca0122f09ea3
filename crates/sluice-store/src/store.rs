//! Single-writer, multi-reader store handles.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, warn};

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::types::{Obligor, ObligorRecord, PriceTick, Transaction};

use crate::snapshot::{StoreSnapshot, StoreState};

/// Writer handle shared by the ingestion paths.
pub type SharedWriter = Arc<Mutex<StoreWriter>>;

/// Constructor for a store's writer/reader pair.
pub struct TimeSeriesStore;

impl TimeSeriesStore {
    /// Creates an empty store and returns its only writer and a reader.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (StoreWriter, StoreReader) {
        let state = Arc::new(RwLock::new(Arc::new(StoreState::default())));
        (
            StoreWriter {
                state: Arc::clone(&state),
            },
            StoreReader { state },
        )
    }

    /// Creates an empty store with the writer wrapped for sharing.
    pub fn shared() -> (SharedWriter, StoreReader) {
        let (writer, reader) = Self::new();
        (Arc::new(Mutex::new(writer)), reader)
    }
}

/// Outcome of a batch ingest: accepted count plus per-entity rejections.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Records accepted.
    pub accepted: usize,
    /// Records rejected, one error per record.
    pub rejected: Vec<AnalyticsError>,
}

impl IngestReport {
    fn record(&mut self, result: AnalyticsResult<()>) {
        match result {
            Ok(()) => self.accepted += 1,
            Err(e) => self.rejected.push(e),
        }
    }

    /// Merges another report into this one.
    pub fn merge(&mut self, other: IngestReport) {
        self.accepted += other.accepted;
        self.rejected.extend(other.rejected);
    }
}

/// The sole mutating handle. Deliberately not `Clone`.
pub struct StoreWriter {
    state: Arc<RwLock<Arc<StoreState>>>,
}

impl StoreWriter {
    fn commit<R>(
        &mut self,
        apply: impl FnOnce(&mut StoreState) -> AnalyticsResult<R>,
    ) -> AnalyticsResult<R> {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut guard);
        let out = apply(state)?;
        state.version += 1;
        state.last_ingest = Some(Utc::now());
        Ok(out)
    }

    /// Ingests an obligor record, superseding any previous record.
    ///
    /// Returns the new record version (1 for a first observation).
    pub fn ingest_obligor(&mut self, record: ObligorRecord) -> AnalyticsResult<u64> {
        record.validate()?;
        let result = self.commit(|state| {
            let history = state.obligors.entry(record.id.clone()).or_default();
            if let Some(prev) = history.last() {
                if record.as_of < prev.as_of {
                    return Err(AnalyticsError::data_quality(
                        record.id.as_str(),
                        format!(
                            "record as of {} is older than stored version {} ({})",
                            record.as_of, prev.version, prev.as_of
                        ),
                    ));
                }
            }
            let version = history.last().map_or(1, |p| p.version + 1);
            history.push(Obligor::from_record(record, version));
            Ok(version)
        });
        if let Err(e) = &result {
            warn!(error = %e, "obligor record rejected");
        }
        result
    }

    /// Appends a transaction.
    ///
    /// Rejects unknown obligors, non-positive amounts, duplicate ids, and
    /// timestamps older than the last accepted transaction.
    pub fn append_transaction(&mut self, tx: Transaction) -> AnalyticsResult<()> {
        tx.validate()?;
        let result = self.commit(|state| {
            if !state.obligors.contains_key(&tx.obligor_id) {
                return Err(AnalyticsError::data_quality(
                    tx.id.as_str(),
                    format!("unknown obligor {}", tx.obligor_id),
                ));
            }
            if state.transaction_ids.contains(&tx.id) {
                return Err(AnalyticsError::data_quality(
                    tx.id.as_str(),
                    "duplicate transaction id",
                ));
            }
            if let Some(last) = state.transactions.last() {
                if tx.timestamp < last.timestamp {
                    return Err(AnalyticsError::data_quality(
                        tx.id.as_str(),
                        format!(
                            "timestamp {} precedes last accepted {}",
                            tx.timestamp, last.timestamp
                        ),
                    ));
                }
            }
            state.transaction_ids.insert(tx.id.clone());
            state.transactions.push(tx);
            Ok(())
        });
        if let Err(e) = &result {
            debug!(error = %e, "transaction rejected");
        }
        result
    }

    /// Appends a price tick. Sequence numbers must strictly increase.
    pub fn append_price_tick(&mut self, tick: PriceTick) -> AnalyticsResult<()> {
        self.commit(|state| {
            if let Some(last) = state.prices.last() {
                if tick.sequence <= last.sequence {
                    return Err(AnalyticsError::data_quality(
                        format!("price_tick.{}", tick.sequence),
                        format!("sequence must exceed {}", last.sequence),
                    ));
                }
            }
            state.prices.push(tick);
            Ok(())
        })
    }

    /// Ingests a batch of obligor records, containing failures per record.
    pub fn ingest_obligors(&mut self, records: Vec<ObligorRecord>) -> IngestReport {
        let mut report = IngestReport::default();
        for record in records {
            report.record(self.ingest_obligor(record).map(|_| ()));
        }
        report
    }

    /// Appends a batch of transactions, containing failures per record.
    pub fn append_transactions(&mut self, transactions: Vec<Transaction>) -> IngestReport {
        let mut report = IngestReport::default();
        for tx in transactions {
            report.record(self.append_transaction(tx));
        }
        report
    }

    /// A reader for this store.
    #[must_use]
    pub fn reader(&self) -> StoreReader {
        StoreReader {
            state: Arc::clone(&self.state),
        }
    }
}

/// Read handle. Clone freely.
#[derive(Clone)]
pub struct StoreReader {
    state: Arc<RwLock<Arc<StoreState>>>,
}

impl StoreReader {
    /// Immutable view of the current store contents.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::new(Arc::clone(&self.state.read()))
    }

    /// Current write watermark.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.read().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use sluice_core::ids::ObligorId;
    use sluice_core::types::{CashFlowKind, Direction, FeatureVector, Sector, Tier};

    fn record(id: &str, exposure: rust_decimal::Decimal, day: i64) -> ObligorRecord {
        let as_of = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
        ObligorRecord::new(
            id,
            FeatureVector::new(1.2, 0.9, Sector::Retail, 5.5),
            exposure,
            as_of,
        )
    }

    fn tx(id: &str, obligor: &str, minute: i64) -> Transaction {
        Transaction::settled(
            id,
            obligor,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
            dec!(100),
            Direction::Inflow,
            CashFlowKind::Interest,
        )
    }

    #[test]
    fn test_obligor_versions_and_history() {
        let (mut writer, reader) = TimeSeriesStore::new();
        assert_eq!(writer.ingest_obligor(record("A", dec!(500), 0)).unwrap(), 1);
        assert_eq!(writer.ingest_obligor(record("A", dec!(550), 1)).unwrap(), 2);

        let snap = reader.snapshot();
        let id = ObligorId::new("A");
        assert_eq!(snap.obligor(&id).unwrap().version, 2);
        assert_eq!(snap.obligor_history(&id).len(), 2);
        assert_eq!(snap.exposure_series(&id), vec![500.0, 550.0]);

        // older record rejected
        assert!(writer.ingest_obligor(record("A", dec!(1), 0)).is_err());
    }

    #[test]
    fn test_snapshot_is_immutable() {
        let (mut writer, reader) = TimeSeriesStore::new();
        writer.ingest_obligor(record("A", dec!(500), 0)).unwrap();
        let before = reader.snapshot();
        writer.ingest_obligor(record("B", dec!(300), 0)).unwrap();
        let after = reader.snapshot();

        assert_eq!(before.obligor_count(), 1);
        assert_eq!(after.obligor_count(), 2);
        assert!(after.version() > before.version());
    }

    #[test]
    fn test_transaction_rejections() {
        let (mut writer, reader) = TimeSeriesStore::new();
        writer.ingest_obligor(record("A", dec!(500), 0)).unwrap();

        assert!(writer.append_transaction(tx("T1", "A", 10)).is_ok());
        // unknown obligor
        assert!(writer.append_transaction(tx("T2", "Z", 11)).is_err());
        // out of order
        assert!(writer.append_transaction(tx("T3", "A", 5)).is_err());
        // duplicate
        assert!(writer.append_transaction(tx("T1", "A", 12)).is_err());

        let report = writer.append_transactions(vec![tx("T4", "A", 20), tx("T5", "Q", 21)]);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected.len(), 1);

        let snap = reader.snapshot();
        assert_eq!(snap.transactions().len(), 2);
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 15, 0).unwrap();
        let end = start + Duration::hours(1);
        assert_eq!(snap.transactions_between(start, end).count(), 1);
    }

    #[test]
    fn test_price_sequence() {
        let (mut writer, reader) = TimeSeriesStore::new();
        let tick = PriceTick {
            sequence: 1,
            timestamp: Utc::now(),
            tier: Tier::Fast,
            peg: 1.0,
            yield_accrual: 0.0,
            volatility: 0.001,
            composite: 1.001,
            degraded: false,
        };
        writer.append_price_tick(tick).unwrap();
        assert!(writer.append_price_tick(tick).is_err());
        assert_eq!(reader.snapshot().latest_price().unwrap().sequence, 1);
    }
}
