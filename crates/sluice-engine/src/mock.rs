//! Seeded in-memory data provider.
//!
//! Generates a pool of obligors in three size bands and a live stream of
//! settlements, defaults and recoveries. Everything is driven by one
//! ChaCha RNG, so a given seed always produces the same pool.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use sluice_core::error::AnalyticsResult;
use sluice_core::ids::ObligorId;
use sluice_core::types::{
    CashFlowKind, Direction, FeatureVector, ObligorRecord, Sector, Tier, Tranche, Transaction,
    TransactionStatus,
};

use crate::provider::DataProvider;

/// Mock provider configuration.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Number of obligors in the pool.
    pub obligors: usize,
    /// Days of daily back history returned by the first obligor fetch.
    pub history_days: usize,
    /// Fraction of obligors whose record changes on each later fetch.
    pub drift_fraction: f64,
    /// Tranches to report. Empty defers to engine configuration.
    pub tranches: Vec<Tranche>,
    /// RNG seed.
    pub seed: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            obligors: 100,
            history_days: 30,
            drift_fraction: 0.4,
            tranches: Vec::new(),
            seed: 42,
        }
    }
}

impl MockConfig {
    /// Sets the pool size.
    #[must_use]
    pub fn with_obligors(mut self, obligors: usize) -> Self {
        self.obligors = obligors;
        self
    }

    /// Sets the back-history length.
    #[must_use]
    pub fn with_history_days(mut self, days: usize) -> Self {
        self.history_days = days;
        self
    }

    /// Sets the tranches to report.
    #[must_use]
    pub fn with_tranches(mut self, tranches: Vec<Tranche>) -> Self {
        self.tranches = tranches;
        self
    }

    /// Sets the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeBand {
    Large,
    Medium,
    Small,
}

impl SizeBand {
    /// First 30% large, next 30% medium, the rest small.
    fn of(index: usize, total: usize) -> Self {
        let position = index * 10;
        if position < total * 3 {
            Self::Large
        } else if position < total * 6 {
            Self::Medium
        } else {
            Self::Small
        }
    }

    fn exposure_range(self) -> (f64, f64) {
        match self {
            Self::Large => (150_000.0, 250_000.0),
            Self::Medium => (80_000.0, 150_000.0),
            Self::Small => (30_000.0, 80_000.0),
        }
    }

    fn leverage_range(self) -> (f64, f64) {
        match self {
            Self::Large => (0.8, 2.0),
            Self::Medium => (1.2, 3.0),
            Self::Small => (1.8, 4.5),
        }
    }

    fn selection_weight(self) -> f64 {
        match self {
            Self::Large => 3.0,
            Self::Medium => 2.0,
            Self::Small => 1.0,
        }
    }
}

#[derive(Debug, Clone)]
struct MockObligor {
    id: ObligorId,
    band: SizeBand,
    features: FeatureVector,
    exposure: f64,
    as_of: DateTime<Utc>,
    defaulted: Decimal,
}

impl MockObligor {
    fn record(&self) -> ObligorRecord {
        ObligorRecord::new(
            self.id.clone(),
            self.features,
            money(self.exposure),
            self.as_of,
        )
    }
}

struct MockState {
    rng: ChaCha8Rng,
    obligors: Vec<MockObligor>,
    selection: Option<WeightedIndex<f64>>,
    transactions: Vec<Transaction>,
    next_tx: u64,
    last_timestamp: Option<DateTime<Utc>>,
    history_pending: bool,
}

/// Seeded generator of obligors and transactions.
///
/// ```rust
/// use sluice_engine::mock::{MockConfig, MockDataProvider};
/// use sluice_engine::DataProvider;
///
/// # #[tokio::main]
/// # async fn main() {
/// let provider = MockDataProvider::new(MockConfig::default().with_obligors(10).with_history_days(0));
/// let obligors = provider.fetch_obligors().await.unwrap();
/// assert_eq!(obligors.len(), 10);
/// # }
/// ```
pub struct MockDataProvider {
    config: MockConfig,
    state: Mutex<MockState>,
    quality: Mutex<HashMap<Tier, f64>>,
}

impl MockDataProvider {
    /// Creates a provider whose pool is generated as of now.
    #[must_use]
    pub fn new(config: MockConfig) -> Self {
        Self::starting_at(config, Utc::now())
    }

    /// Creates a provider whose pool is generated as of `start`.
    #[must_use]
    pub fn starting_at(config: MockConfig, start: DateTime<Utc>) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let obligors: Vec<MockObligor> = (0..config.obligors)
            .map(|i| {
                let band = SizeBand::of(i, config.obligors);
                let (lo, hi) = band.leverage_range();
                let (emin, emax) = band.exposure_range();
                let exposure = rng.gen_range(emin..emax);
                let sector = Sector::ALL[rng.gen_range(0..Sector::ALL.len())];
                MockObligor {
                    id: ObligorId::new(format!("OBL{:03}", i + 1)),
                    band,
                    features: FeatureVector::new(
                        rng.gen_range(lo..hi),
                        rng.gen_range(0.75..0.99),
                        sector,
                        exposure.ln(),
                    ),
                    exposure,
                    as_of: start,
                    defaulted: Decimal::ZERO,
                }
            })
            .collect();
        let selection =
            WeightedIndex::new(obligors.iter().map(|o| o.band.selection_weight())).ok();

        Self {
            config,
            state: Mutex::new(MockState {
                rng,
                obligors,
                selection,
                transactions: Vec::new(),
                next_tx: 1,
                last_timestamp: None,
                history_pending: true,
            }),
            quality: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the data-quality signal for one tier.
    pub fn set_quality(&self, tier: Tier, quality: f64) {
        self.quality.lock().insert(tier, quality);
    }

    /// Number of transactions generated so far.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    fn back_history(&self, state: &mut MockState) -> Vec<ObligorRecord> {
        let days = self.config.history_days;
        let mut records = Vec::with_capacity(state.obligors.len() * (days + 1));
        if days > 0 {
            let mut paths: Vec<Vec<f64>> = state
                .obligors
                .iter()
                .map(|o| vec![o.exposure])
                .collect();
            // walk backwards from today's exposure with a shared market factor
            for _ in 0..days {
                let market: f64 = state.rng.gen_range(-0.02..0.02);
                for path in &mut paths {
                    let last = path.last().copied().unwrap_or(1.0);
                    let idio: f64 = state.rng.gen_range(-0.015..0.015);
                    path.push((last * (1.0 - market - idio)).max(1.0));
                }
            }
            for day in (1..=days).rev() {
                for (obligor, path) in state.obligors.iter().zip(&paths) {
                    let mut past = obligor.clone();
                    past.exposure = path[day];
                    past.as_of = obligor.as_of - Duration::days(day as i64);
                    records.push(past.record());
                }
            }
        }
        records.extend(state.obligors.iter().map(MockObligor::record));
        records
    }

    fn drift(&self, state: &mut MockState, now: DateTime<Utc>) {
        let market: f64 = state.rng.gen_range(-0.02..0.02);
        let fraction = self.config.drift_fraction;
        let MockState { rng, obligors, .. } = state;
        for obligor in obligors.iter_mut() {
            if !rng.gen_bool(fraction.clamp(0.0, 1.0)) {
                continue;
            }
            let idio: f64 = rng.gen_range(-0.03..0.03);
            obligor.exposure = (obligor.exposure * (1.0 + market + idio)).max(1.0);
            let leverage = (obligor.features.leverage + rng.gen_range(-0.1..0.1)).max(0.0);
            let history = (obligor.features.payment_history + rng.gen_range(-0.02..0.02))
                .clamp(0.0, 1.0);
            obligor.features = obligor
                .features
                .with_leverage(leverage)
                .with_payment_history(history);
            obligor.features.exposure_size = obligor.exposure.ln();
            obligor.as_of = obligor.as_of.max(now);
        }
    }

    fn generate_transactions(&self, state: &mut MockState, now: DateTime<Utc>) {
        let Some(selection) = state.selection.clone() else {
            return;
        };
        let count = [2usize, 3, 4, 5][weighted(&mut state.rng, &[0.2, 0.3, 0.3, 0.2])];
        for _ in 0..count {
            let idx = selection.sample(&mut state.rng);
            let timestamp = match state.last_timestamp {
                Some(last) if last >= now => last + Duration::milliseconds(1),
                _ => now,
            };
            state.last_timestamp = Some(timestamp);

            let principal = state.rng.gen_range(50_000.0..300_000.0);
            let roll: f64 = state.rng.gen();
            let obligor = &mut state.obligors[idx];
            let (amount, direction, kind, status) = if roll < 0.45 {
                let direction = if state.rng.gen_bool(0.6) {
                    Direction::Inflow
                } else {
                    Direction::Outflow
                };
                (principal, direction, CashFlowKind::Principal, TransactionStatus::Settled)
            } else if roll < 0.85 {
                let rate = state.rng.gen_range(0.01..0.03);
                (principal * rate, Direction::Inflow, CashFlowKind::Interest, TransactionStatus::Settled)
            } else if roll < 0.98 || (roll < 0.995 && obligor.defaulted.is_zero()) {
                let rate = state.rng.gen_range(0.002..0.008);
                (principal * rate, Direction::Inflow, CashFlowKind::Fee, TransactionStatus::Settled)
            } else if roll < 0.995 {
                let rate = state.rng.gen_range(0.35..0.65);
                let recovered = obligor.defaulted.to_f64().unwrap_or(0.0) * rate;
                obligor.defaulted = Decimal::ZERO;
                (recovered, Direction::Inflow, CashFlowKind::Recovery, TransactionStatus::Settled)
            } else {
                let share = state.rng.gen_range(0.02..0.08);
                let loss = obligor.exposure * share;
                obligor.defaulted += money(loss);
                (loss, Direction::Outflow, CashFlowKind::Principal, TransactionStatus::Defaulted)
            };

            let tx = Transaction::settled(
                format!("TX{:06}", state.next_tx),
                obligor.id.clone(),
                timestamp,
                money(amount.max(0.01)),
                direction,
                kind,
            )
            .with_status(status);
            state.next_tx += 1;
            state.transactions.push(tx);
        }
    }
}

impl std::fmt::Debug for MockDataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDataProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DataProvider for MockDataProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_obligors(&self) -> AnalyticsResult<Vec<ObligorRecord>> {
        let mut state = self.state.lock();
        if state.history_pending {
            state.history_pending = false;
            let records = self.back_history(&mut state);
            debug!(records = records.len(), "mock pool generated");
            return Ok(records);
        }
        self.drift(&mut state, Utc::now());
        Ok(state.obligors.iter().map(MockObligor::record).collect())
    }

    async fn fetch_transactions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> AnalyticsResult<Vec<Transaction>> {
        let mut state = self.state.lock();
        self.generate_transactions(&mut state, Utc::now());
        Ok(state
            .transactions
            .iter()
            .filter(|t| since.map_or(true, |s| t.timestamp > s))
            .cloned()
            .collect())
    }

    async fn fetch_tranches(&self) -> AnalyticsResult<Vec<Tranche>> {
        Ok(self.config.tranches.clone())
    }

    async fn data_quality(&self, tier: Tier) -> f64 {
        self.quality.lock().get(&tier).copied().unwrap_or(1.0)
    }
}

fn weighted(rng: &mut ChaCha8Rng, weights: &[f64]) -> usize {
    WeightedIndex::new(weights).map_or(0, |dist| dist.sample(rng))
}

fn money(amount: f64) -> Decimal {
    Decimal::from_f64(amount).unwrap_or_default().round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn provider(seed: u64) -> MockDataProvider {
        let start = DateTime::parse_from_rfc3339("2026-01-15T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        MockDataProvider::starting_at(
            MockConfig::default().with_obligors(20).with_history_days(5).with_seed(seed),
            start,
        )
    }

    #[test]
    fn test_size_bands() {
        assert_eq!(SizeBand::of(0, 100), SizeBand::Large);
        assert_eq!(SizeBand::of(29, 100), SizeBand::Large);
        assert_eq!(SizeBand::of(30, 100), SizeBand::Medium);
        assert_eq!(SizeBand::of(60, 100), SizeBand::Small);
    }

    #[tokio::test]
    async fn test_history_then_current() {
        let p = provider(7);
        let first = p.fetch_obligors().await.unwrap();
        assert_eq!(first.len(), 20 * 6);
        assert!(first.windows(2).all(|w| w[0].as_of <= w[1].as_of));
        assert!(first.iter().all(|r| r.validate().is_ok()));

        let second = p.fetch_obligors().await.unwrap();
        assert_eq!(second.len(), 20);
    }

    #[tokio::test]
    async fn test_seed_reproducible() {
        let a = provider(11).fetch_obligors().await.unwrap();
        let b = provider(11).fetch_obligors().await.unwrap();
        let c = provider(12).fetch_obligors().await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_transactions_ordered_and_incremental() {
        let p = provider(3);
        let ids: HashSet<ObligorId> =
            p.fetch_obligors().await.unwrap().into_iter().map(|r| r.id).collect();

        let first = p.fetch_transactions(None).await.unwrap();
        assert!((2..=5).contains(&first.len()));
        assert!(first.iter().all(|t| ids.contains(&t.obligor_id)));
        assert!(first.iter().all(|t| t.validate().is_ok()));

        let since = first.last().map(|t| t.timestamp);
        let next = p.fetch_transactions(since).await.unwrap();
        assert!((2..=5).contains(&next.len()));
        assert!(next.iter().all(|t| Some(t.timestamp) > since));
        assert_eq!(p.transaction_count(), first.len() + next.len());
    }

    #[tokio::test]
    async fn test_quality_override() {
        let p = provider(1);
        assert_eq!(p.data_quality(Tier::Slow).await, 1.0);
        p.set_quality(Tier::Slow, 0.5);
        assert_eq!(p.data_quality(Tier::Slow).await, 0.5);
        assert_eq!(p.data_quality(Tier::Fast).await, 1.0);
    }
}
