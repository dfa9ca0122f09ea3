//! Tiered recomputation.
//!
//! Each tier runs as its own tokio task on a fixed interval:
//!
//! - **fast**: price volatility tick
//! - **medium**: transaction ingest, trailing yield rate, accrual tick
//! - **slow**: obligor ingest, scoring, correlation, risk, yield waterfall
//!
//! A cycle moves its tier through `Idle → Computing → Published` and ends
//! with one atomic publication: the previous snapshot is cloned, the
//! tier's outputs and issues are swapped in, and the result is sent on a
//! `watch` channel. Slower tiers never wait on faster ones.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use sluice_config::EngineConfig;
use sluice_core::error::{AnalyticsError, AnalyticsResult, ErrorKind};
use sluice_core::ids::ObligorId;
use sluice_core::types::{CorrelationMatrix, Obligor, ObligorRecord, PriceTick, Tier, TrancheSet};
use sluice_models::{score_batch, CreditScorer};
use sluice_pricing::{trailing_yield_rate, PriceSimulator};
use sluice_risk::correlation::{estimate_correlation, ReturnPanel};
use sluice_risk::position::PoolPosition;
use sluice_risk::{RiskCalculator, RiskInputs, RiskReport};
use sluice_store::{IngestReport, SharedWriter, StoreReader, StoreSnapshot, TimeSeriesStore};
use sluice_yield::{YieldEngine, YieldInputs, YieldPeriod, YieldWaterfall};

use crate::cache::{CacheStats, ScoreCache};
use crate::provider::DataProvider;
use crate::quality::QualityAssessment;
use crate::query::QueryHandle;
use crate::snapshot::{AnalyticsSnapshot, RiskState, SnapshotIssue, TierStatus};

/// Latest published snapshot, `None` until the first publication.
pub type SnapshotReceiver = watch::Receiver<Option<Arc<AnalyticsSnapshot>>>;

pub(crate) type TierBoard = Arc<Mutex<BTreeMap<Tier, TierStatus>>>;

/// Runs the tier tasks and owns the store.
pub struct Orchestrator {
    inner: Arc<Inner>,
    shutdown: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    config: Arc<EngineConfig>,
    provider: Arc<dyn DataProvider>,
    writer: SharedWriter,
    reader: StoreReader,
    pricing: Mutex<PriceSimulator>,
    scorer: Arc<dyn CreditScorer>,
    calculator: Arc<RiskCalculator>,
    yields: YieldEngine,
    tranches: Arc<TrancheSet>,
    cache: ScoreCache,
    publisher: watch::Sender<Option<Arc<AnalyticsSnapshot>>>,
    tiers: TierBoard,
    last_distribution: Mutex<DateTime<Utc>>,
    /// Serializes read-fetch-append so overlapping tiers never fetch the same batch.
    ingest: AsyncMutex<()>,
}

/// Outputs of one slow cycle, produced off the async runtime.
struct SlowOutput {
    default_probabilities: BTreeMap<ObligorId, f64>,
    correlation: Arc<CorrelationMatrix>,
    report: Arc<RiskReport>,
    waterfall: Option<Arc<YieldWaterfall>>,
    risk_state: Arc<RiskState>,
    issues: Vec<SnapshotIssue>,
}

impl Orchestrator {
    /// Validates configuration, resolves tranches and builds every model.
    ///
    /// Fails only on configuration errors. Tranches come from the provider
    /// unless it reports none, in which case the configured stack is used.
    pub async fn bootstrap(
        config: EngineConfig,
        provider: Arc<dyn DataProvider>,
    ) -> AnalyticsResult<Self> {
        let config = config.validated()?;
        let fetched = provider.fetch_tranches().await?;
        let tranches = if fetched.is_empty() {
            config.tranche_set()?
        } else {
            TrancheSet::new(fetched)?
        };

        let scorer = config.scoring.build()?;
        let calculator = RiskCalculator::new(config.risk.clone(), config.tail.build()?)?;
        let yields = YieldEngine::new(config.yields.clone())?;
        let pricing = PriceSimulator::new(config.price.clone())?;
        let (writer, reader) = TimeSeriesStore::shared();
        let (publisher, _) = watch::channel(None);
        let tiers: BTreeMap<Tier, TierStatus> =
            Tier::ALL.iter().map(|t| (*t, TierStatus::default())).collect();

        info!(
            provider = provider.name(),
            tranches = tranches.len(),
            scorer = scorer.name(),
            scenarios = config.scenarios.len(),
            "orchestrator ready"
        );

        let (shutdown, _) = broadcast::channel(1);
        Ok(Self {
            inner: Arc::new(Inner {
                config: Arc::new(config),
                provider,
                writer,
                reader,
                pricing: Mutex::new(pricing),
                scorer,
                calculator: Arc::new(calculator),
                yields,
                tranches: Arc::new(tranches),
                cache: ScoreCache::new(),
                publisher,
                tiers: Arc::new(Mutex::new(tiers)),
                last_distribution: Mutex::new(Utc::now()),
                ingest: AsyncMutex::new(()),
            }),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Runs one slow cycle, then starts a task per tier.
    ///
    /// Returns the first snapshot. Calling `start` on a running
    /// orchestrator does nothing and returns the latest snapshot.
    pub async fn start(&self) -> AnalyticsResult<Arc<AnalyticsSnapshot>> {
        if !self.tasks.lock().is_empty() {
            warn!("orchestrator already running");
            return self
                .latest()
                .ok_or_else(|| AnalyticsError::computation("orchestrator", "no snapshot"));
        }
        let first = self.run_cycle(Tier::Slow).await?;

        let handles: Vec<JoinHandle<()>> = Tier::ALL
            .iter()
            .map(|&tier| {
                let inner = Arc::clone(&self.inner);
                let shutdown = self.shutdown.subscribe();
                tokio::spawn(run_tier(inner, tier, shutdown))
            })
            .collect();
        *self.tasks.lock() = handles;
        info!(
            fast = ?self.inner.config.tiers.cadence(Tier::Fast),
            medium = ?self.inner.config.tiers.cadence(Tier::Medium),
            slow = ?self.inner.config.tiers.cadence(Tier::Slow),
            "tier tasks started"
        );
        Ok(first)
    }

    /// Runs a single cycle of `tier` now and returns the published snapshot.
    pub async fn run_cycle(&self, tier: Tier) -> AnalyticsResult<Arc<AnalyticsSnapshot>> {
        Inner::run_cycle(&self.inner, tier, 0).await
    }

    /// Stops every tier between ticks and waits for the tasks to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        if handles.is_empty() {
            return;
        }
        let _ = self.shutdown.send(());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "tier task ended abnormally");
            }
        }
        info!("orchestrator stopped");
    }

    /// True while tier tasks are running.
    pub fn is_running(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    /// A clonable query interface.
    pub fn query_handle(&self) -> QueryHandle {
        QueryHandle::new(
            self.inner.publisher.subscribe(),
            Arc::clone(&self.inner.calculator),
            Arc::clone(&self.inner.config),
            Arc::clone(&self.inner.tranches),
            Arc::clone(&self.inner.tiers),
            self.inner.reader.clone(),
        )
    }

    /// The latest snapshot, if any.
    pub fn latest(&self) -> Option<Arc<AnalyticsSnapshot>> {
        self.inner.publisher.borrow().clone()
    }

    /// A reader over the underlying store.
    pub fn store(&self) -> StoreReader {
        self.inner.reader.clone()
    }

    /// Score cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Validated tranche stack.
    pub fn tranches(&self) -> &TrancheSet {
        &self.inner.tranches
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.inner.provider.name())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TIER TASKS
// =============================================================================

async fn run_tier(inner: Arc<Inner>, tier: Tier, mut shutdown: broadcast::Receiver<()>) {
    let period = inner.config.tiers.cadence(tier);
    // the slow tier already ran once in start()
    let first = if tier == Tier::Slow {
        Instant::now() + period
    } else {
        Instant::now()
    };
    let mut ticker = interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    debug!(tier = %tier, ?period, "tier task running");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                debug!(tier = %tier, "tier task stopping");
                break;
            }
            scheduled = ticker.tick() => {
                let lateness = Instant::now().saturating_duration_since(scheduled);
                if let Err(e) = Inner::run_cycle(&inner, tier, millis(lateness)).await {
                    warn!(tier = %tier, error = %e, "cycle failed");
                }
                if Instant::now() > scheduled + period {
                    inner.tiers.lock().entry(tier).or_default().miss_deadline();
                    warn!(tier = %tier, lateness_ms = millis(lateness), "deadline missed");
                }
                inner.tiers.lock().entry(tier).or_default().settle();
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// CYCLES
// =============================================================================

impl Inner {
    async fn run_cycle(
        inner: &Arc<Self>,
        tier: Tier,
        lateness_ms: u64,
    ) -> AnalyticsResult<Arc<AnalyticsSnapshot>> {
        inner.tiers.lock().entry(tier).or_default().begin(lateness_ms);
        let mut issues = Vec::new();
        let mut assessments = Vec::new();

        let snapshot = match tier {
            Tier::Fast => {
                let quality = inner.cycle_quality(tier, &assessments, &mut issues).await;
                let tick = inner.price_tick(tier, &mut issues);
                inner.publish(tier, quality, issues, |snap| {
                    snap.price = Some(tick);
                })
            }
            Tier::Medium => {
                assessments.extend(inner.ingest_transactions(tier, &mut issues).await);
                inner.refresh_yield_rate(tier, &mut issues);
                let quality = inner.cycle_quality(tier, &assessments, &mut issues).await;
                let tick = inner.price_tick(tier, &mut issues);
                inner.publish(tier, quality, issues, |snap| {
                    snap.price = Some(tick);
                })
            }
            Tier::Slow => {
                assessments.extend(inner.ingest_obligors(tier, &mut issues).await);
                assessments.extend(inner.ingest_transactions(tier, &mut issues).await);
                let quality = inner.cycle_quality(tier, &assessments, &mut issues).await;
                let worker = Arc::clone(inner);
                let output = tokio::task::spawn_blocking(move || worker.compute_slow())
                    .await
                    .map_err(|e| AnalyticsError::computation("slow_cycle", e.to_string()))?;
                let tick = inner.price_tick(tier, &mut issues);
                issues.extend(output.issues);
                inner.publish(tier, quality, issues, |snap| {
                    snap.price = Some(tick);
                    snap.default_probabilities = Arc::new(output.default_probabilities);
                    snap.correlation = Some(output.correlation);
                    snap.risk_report = Some(output.report);
                    if let Some(waterfall) = output.waterfall {
                        snap.waterfall = Some(waterfall);
                    }
                    snap.risk_state = Some(output.risk_state);
                })
            }
        };
        Ok(snapshot)
    }

    /// Lowest of the provider's signal and this cycle's batch scores. Adds
    /// one issue when it falls below the configured minimum.
    async fn cycle_quality(
        &self,
        tier: Tier,
        assessments: &[QualityAssessment],
        issues: &mut Vec<SnapshotIssue>,
    ) -> f64 {
        let reported = self.provider.data_quality(tier).await;
        let quality = assessments
            .iter()
            .map(|a| a.score)
            .fold(reported, f64::min);
        let min = self.config.data_quality.min_quality;
        if quality >= min {
            return quality;
        }
        let mut findings: Vec<String> = assessments
            .iter()
            .flat_map(|a| a.issues.iter().cloned())
            .collect();
        if reported < min {
            findings.push(format!("provider reported {reported:.3}"));
        }
        warn!(tier = %tier, quality, min, findings = ?findings, "data quality below threshold");
        issues.push(SnapshotIssue {
            tier,
            kind: ErrorKind::DataQuality,
            entity: format!("data_quality.{tier}"),
            detail: format!(
                "quality {quality:.3} below minimum {min:.3}: {}",
                findings.join(", ")
            ),
        });
        quality
    }

    fn publish(
        &self,
        tier: Tier,
        quality: f64,
        issues: Vec<SnapshotIssue>,
        apply: impl FnOnce(&mut AnalyticsSnapshot),
    ) -> Arc<AnalyticsSnapshot> {
        let now = Utc::now();
        let tiers = {
            let mut board = self.tiers.lock();
            board.entry(tier).or_default().publish(now);
            board.clone()
        };
        let store_version = self.reader.version();

        let mut published = None;
        self.publisher.send_modify(|slot| {
            let mut next = slot.as_deref().cloned().unwrap_or_default();
            apply(&mut next);
            next.cycle += 1;
            next.published_at = Some(now);
            next.store_version = store_version;
            next.data_quality.insert(tier, quality);
            next.tiers = tiers;
            next.replace_issues(tier, issues);
            let next = Arc::new(next);
            published = Some(Arc::clone(&next));
            *slot = Some(next);
        });
        let snapshot = published.unwrap_or_default();
        debug!(
            tier = %tier,
            cycle = snapshot.cycle,
            degraded = snapshot.degraded,
            issues = snapshot.issues.len(),
            "snapshot published"
        );
        snapshot
    }

    fn price_tick(&self, tier: Tier, issues: &mut Vec<SnapshotIssue>) -> PriceTick {
        let tick = self.pricing.lock().tick(tier, Utc::now());
        if tick.degraded && tier != Tier::Fast {
            issues.push(SnapshotIssue {
                tier,
                kind: ErrorKind::StaleData,
                entity: "yield_rate".to_string(),
                detail: format!(
                    "yield rate older than {}s, accrual frozen",
                    self.config.price.yield_staleness_secs
                ),
            });
        }
        if let Err(e) = self.writer.lock().append_price_tick(tick) {
            issues.push(SnapshotIssue::from_error(tier, &e));
        }
        tick
    }

    async fn ingest_obligors(
        &self,
        tier: Tier,
        issues: &mut Vec<SnapshotIssue>,
    ) -> Option<QualityAssessment> {
        let _ingest = self.ingest.lock().await;
        let records = match self.provider.fetch_obligors().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "obligor fetch failed");
                issues.push(SnapshotIssue::from_error(tier, &e));
                return None;
            }
        };
        let assessment = QualityAssessment::of_obligors(&records, &self.config.data_quality);
        let fetched = records.len();
        let stored = self.reader.snapshot();
        let changed: Vec<ObligorRecord> = records
            .into_iter()
            .filter(|r| !is_unchanged(&stored, r))
            .collect();
        let report = self.writer.lock().ingest_obligors(changed);
        debug!(fetched, accepted = report.accepted, score = assessment.score, "obligors ingested");
        record_rejections(tier, report, issues);
        Some(assessment)
    }

    async fn ingest_transactions(
        &self,
        tier: Tier,
        issues: &mut Vec<SnapshotIssue>,
    ) -> Option<QualityAssessment> {
        let _ingest = self.ingest.lock().await;
        let since = self.reader.snapshot().last_transaction_at();
        let transactions = match self.provider.fetch_transactions(since).await {
            Ok(transactions) => transactions,
            Err(e) => {
                warn!(error = %e, "transaction fetch failed");
                issues.push(SnapshotIssue::from_error(tier, &e));
                return None;
            }
        };
        let assessment = QualityAssessment::of_transactions(
            &transactions,
            &self.reader.snapshot(),
            since.is_none(),
            &self.config.data_quality,
        );
        if !transactions.is_empty() {
            let report = self.writer.lock().append_transactions(transactions);
            debug!(
                accepted = report.accepted,
                rejected = report.rejected.len(),
                score = assessment.score,
                "transactions ingested"
            );
            record_rejections(tier, report, issues);
        }
        Some(assessment)
    }

    fn refresh_yield_rate(&self, tier: Tier, issues: &mut Vec<SnapshotIssue>) {
        let now = Utc::now();
        let window = ChronoDuration::days(self.config.price.yield_window_days);
        let snapshot = self.reader.snapshot();
        let result = trailing_yield_rate(
            snapshot.transactions_between(now - window, now),
            self.config.pool.notional,
            window,
        )
        .and_then(|rate| self.pricing.lock().set_yield_rate(rate, now));
        if let Err(e) = result {
            issues.push(SnapshotIssue::from_error(tier, &e));
        }
    }

    /// Scoring, correlation, risk and yield. Runs on the blocking pool.
    fn compute_slow(&self) -> SlowOutput {
        let tier = Tier::Slow;
        let now = Utc::now();
        let store = self.reader.snapshot();
        let mut issues = Vec::new();

        if let Some(e) = self.staleness(&store, now) {
            issues.push(SnapshotIssue::from_error(tier, &e));
        }

        let obligors: Vec<&Obligor> = store.obligors().collect();
        let default_probabilities = self.score(&obligors, &mut issues);
        let positions: Vec<PoolPosition> = obligors
            .iter()
            .filter_map(|o| {
                default_probabilities
                    .get(&o.id)
                    .map(|pd| PoolPosition::from_obligor(o, *pd))
            })
            .collect();

        let ids: Vec<ObligorId> = positions.iter().map(|p| p.id.clone()).collect();
        let (returns, correlation) = match ReturnPanel::from_snapshot(
            &store,
            self.config.correlation.window,
        )
        .and_then(|panel| {
            estimate_correlation(&panel, &self.config.correlation).map(|m| (panel, m))
        }) {
            Ok((panel, matrix)) => (Some(panel), Arc::new(matrix)),
            Err(e) => {
                warn!(error = %e, "correlation unavailable, using identity");
                issues.push(SnapshotIssue::from_error(tier, &e));
                (None, Arc::new(CorrelationMatrix::identity(ids)))
            }
        };

        let risk_state = Arc::new(RiskState {
            positions,
            returns,
            correlation: Arc::clone(&correlation),
            tranches: Arc::clone(&self.tranches),
            pool_notional: self.config.pool.notional.to_f64().unwrap_or(0.0),
        });
        let inputs: RiskInputs<'_> = risk_state.inputs();
        let report = self
            .calculator
            .compute(&inputs, &self.config.scenarios, now);
        issues.extend(
            report
                .omitted
                .iter()
                .map(|m| SnapshotIssue::from_omitted(tier, m)),
        );

        let waterfall = match self.distribute(&store, report.expected_loss, now) {
            Ok(w) => Some(Arc::new(w)),
            Err(e) => {
                warn!(error = %e, "waterfall failed");
                issues.push(SnapshotIssue::from_error(tier, &e));
                None
            }
        };

        info!(
            obligors = store.obligor_count(),
            scored = default_probabilities.len(),
            expected_loss = report.expected_loss,
            issues = issues.len(),
            "slow cycle computed"
        );
        SlowOutput {
            default_probabilities,
            correlation,
            report: Arc::new(report),
            waterfall,
            risk_state,
            issues,
        }
    }

    fn staleness(&self, store: &StoreSnapshot, now: DateTime<Utc>) -> Option<AnalyticsError> {
        let newest = store.obligors().map(|o| o.as_of).max()?;
        let age = (now - newest).num_milliseconds() as f64 / 1000.0;
        let threshold = self.config.data_quality.max_staleness_secs as f64;
        (age > threshold).then(|| AnalyticsError::stale("obligors", age, threshold))
    }

    fn score(
        &self,
        obligors: &[&Obligor],
        issues: &mut Vec<SnapshotIssue>,
    ) -> BTreeMap<ObligorId, f64> {
        let mut scores = BTreeMap::new();
        let mut pending = Vec::new();
        let mut by_id: HashMap<&ObligorId, &Obligor> = HashMap::with_capacity(obligors.len());
        for obligor in obligors {
            match self.cache.get(obligor) {
                Some(pd) => {
                    scores.insert(obligor.id.clone(), pd);
                }
                None => {
                    pending.push((obligor.id.clone(), obligor.features));
                    by_id.insert(&obligor.id, *obligor);
                }
            }
        }

        let rescored = pending.len();
        for (id, result) in score_batch(
            self.scorer.as_ref(),
            &pending,
            self.config.scoring.parallel_threshold,
        ) {
            match result {
                Ok(pd) => {
                    if let Some(obligor) = by_id.get(&id) {
                        self.cache.insert(obligor, pd);
                    }
                    scores.insert(id, pd);
                }
                Err(e) => {
                    warn!(obligor = %id, error = %e, "scoring failed");
                    issues.push(SnapshotIssue::from_error(Tier::Slow, &e));
                }
            }
        }
        debug!(cached = scores.len().saturating_sub(rescored), rescored, "obligors scored");
        scores
    }

    /// Waterfall for the period since the last distribution. Closes the
    /// period and resets accrual once it spans `distribution_days`.
    fn distribute(
        &self,
        store: &StoreSnapshot,
        expected_loss: f64,
        now: DateTime<Utc>,
    ) -> AnalyticsResult<YieldWaterfall> {
        let start = *self.last_distribution.lock();
        let waterfall = self.yields.distribute(&YieldInputs {
            tranches: &self.tranches,
            pool_notional: self.config.pool.notional,
            transactions: store.transactions(),
            period: YieldPeriod::new(start, now)?,
            expected_loss: Some(expected_loss),
        })?;

        let length = ChronoDuration::days(i64::from(self.config.pool.distribution_days));
        if now - start >= length {
            self.pricing.lock().reset_accrual(now);
            *self.last_distribution.lock() = now;
            info!(
                distributable = %waterfall.distributable,
                reserve = %waterfall.reserve,
                "distribution period closed"
            );
        }
        Ok(waterfall)
    }
}

/// True when `record` repeats the stored latest observation exactly.
fn is_unchanged(store: &StoreSnapshot, record: &ObligorRecord) -> bool {
    store.obligor(&record.id).is_some_and(|o| {
        o.as_of == record.as_of && o.features == record.features && o.exposure == record.exposure
    })
}

fn record_rejections(tier: Tier, report: IngestReport, issues: &mut Vec<SnapshotIssue>) {
    issues.extend(
        report
            .rejected
            .iter()
            .map(|e| SnapshotIssue::from_error(tier, e)),
    );
}
