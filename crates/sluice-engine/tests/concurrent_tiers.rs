//! Tiers that overlap never ingest the same batch twice.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sluice_config::EngineConfig;
use sluice_core::error::{AnalyticsResult, ErrorKind};
use sluice_core::types::{
    CashFlowKind, Direction, FeatureVector, ObligorRecord, Sector, Tier, Tranche, Transaction,
};
use sluice_engine::{DataProvider, Orchestrator};

/// Serves a fixed feed; transactions appear once `release` is set and every
/// transaction fetch yields to the scheduler before answering.
struct YieldingProvider {
    obligors: Vec<ObligorRecord>,
    transactions: Vec<Transaction>,
    release: AtomicBool,
}

impl YieldingProvider {
    fn new(now: DateTime<Utc>) -> Self {
        let mut obligors = Vec::new();
        for day in (0..5).rev() {
            for (i, sector) in [Sector::Retail, Sector::Energy, Sector::Technology]
                .iter()
                .enumerate()
            {
                let exposure = 100_000.0 + f64::from(day * 1_000) * (i as f64 + 1.0);
                obligors.push(ObligorRecord::new(
                    format!("OBL{i}").as_str(),
                    FeatureVector::new(1.5, 0.9, *sector, exposure.ln()),
                    rust_decimal::Decimal::try_from(exposure).unwrap().round_dp(2),
                    now - Duration::days(i64::from(day)),
                ));
            }
        }
        let at = now + Duration::seconds(1);
        let transactions = vec![
            Transaction::settled("TX1", "OBL0", at, dec!(1_200), Direction::Inflow, CashFlowKind::Interest),
            Transaction::settled("TX2", "OBL1", at, dec!(300), Direction::Inflow, CashFlowKind::Fee),
        ];
        Self {
            obligors,
            transactions,
            release: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DataProvider for YieldingProvider {
    fn name(&self) -> &str {
        "yielding"
    }

    async fn fetch_obligors(&self) -> AnalyticsResult<Vec<ObligorRecord>> {
        Ok(self.obligors.clone())
    }

    async fn fetch_transactions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> AnalyticsResult<Vec<Transaction>> {
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        if !self.release.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self
            .transactions
            .iter()
            .filter(|t| since.map_or(true, |s| t.timestamp > s))
            .cloned()
            .collect())
    }

    async fn fetch_tranches(&self) -> AnalyticsResult<Vec<Tranche>> {
        Ok(Vec::new())
    }

    async fn data_quality(&self, _tier: Tier) -> f64 {
        1.0
    }
}

#[tokio::test]
async fn overlapping_medium_and_slow_cycles_ingest_once() {
    let provider = Arc::new(YieldingProvider::new(Utc::now()));
    let engine = Orchestrator::bootstrap(EngineConfig::default(), provider.clone())
        .await
        .unwrap();
    engine.run_cycle(Tier::Slow).await.unwrap();

    provider.release.store(true, Ordering::SeqCst);
    let (medium, slow) = tokio::join!(
        engine.run_cycle(Tier::Medium),
        engine.run_cycle(Tier::Slow)
    );
    medium.unwrap();
    slow.unwrap();

    assert_eq!(engine.store().snapshot().transactions().len(), 2);
    let latest = engine.latest().unwrap();
    assert!(
        latest.issues.iter().all(|i| i.kind != ErrorKind::DataQuality),
        "{:?}",
        latest.issues
    );
    assert!(latest.issues.iter().all(|i| !i.detail.contains("duplicate")));
    assert!(latest.data_quality.values().all(|q| *q >= 0.8));
}
