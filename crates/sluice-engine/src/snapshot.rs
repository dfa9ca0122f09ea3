//! Published analytics snapshots.
//!
//! A snapshot is immutable once published. Each tier builds the next one
//! from the previous by replacing only what it recomputed; the expensive
//! parts (risk report, waterfall, correlation) are shared through `Arc`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use sluice_core::error::{AnalyticsError, ErrorKind};
use sluice_core::ids::{ObligorId, TrancheId};
use sluice_core::types::{CorrelationMatrix, PriceTick, Tier, TrancheSet};
use sluice_risk::{OmittedMetric, RiskInputs, RiskReport};
use sluice_risk::correlation::ReturnPanel;
use sluice_risk::position::PoolPosition;
use sluice_yield::{TrancheAllocation, YieldWaterfall};

// =============================================================================
// TIER STATUS
// =============================================================================

/// Where a tier is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierState {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// Recomputing.
    Computing,
    /// Publication of the last cycle just completed.
    Published,
}

/// Progress and timeliness of one tier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TierStatus {
    /// Current state.
    pub state: TierState,
    /// Completed cycles.
    pub cycles: u64,
    /// Time of the last publication.
    pub last_published: Option<DateTime<Utc>>,
    /// Cycles that finished after the next tick was due.
    pub missed_deadlines: u64,
    /// Lateness of the most recent tick, in milliseconds.
    pub lateness_ms: u64,
}

impl TierStatus {
    /// Idle → Computing.
    pub fn begin(&mut self, lateness_ms: u64) {
        self.state = TierState::Computing;
        self.lateness_ms = lateness_ms;
    }

    /// Computing → Published.
    pub fn publish(&mut self, at: DateTime<Utc>) {
        self.state = TierState::Published;
        self.cycles += 1;
        self.last_published = Some(at);
    }

    /// Counts a cycle that overran its interval.
    pub fn miss_deadline(&mut self) {
        self.missed_deadlines += 1;
    }

    /// Published → Idle.
    pub fn settle(&mut self) {
        if self.state == TierState::Published {
            self.state = TierState::Idle;
        }
    }
}

// =============================================================================
// ISSUES
// =============================================================================

/// An entity or metric missing from, or unreliable in, a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotIssue {
    /// Tier that reported the issue.
    pub tier: Tier,
    /// Failure category.
    pub kind: ErrorKind,
    /// Affected obligor, transaction, metric or input.
    pub entity: String,
    /// Description.
    pub detail: String,
}

impl SnapshotIssue {
    /// Annotates an error.
    pub fn from_error(tier: Tier, error: &AnalyticsError) -> Self {
        Self {
            tier,
            kind: error.kind(),
            entity: error.subject().to_string(),
            detail: error.to_string(),
        }
    }

    /// Annotates a metric the risk calculator left out.
    pub fn from_omitted(tier: Tier, omitted: &OmittedMetric) -> Self {
        Self {
            tier,
            kind: omitted.kind,
            entity: omitted.metric.clone(),
            detail: omitted.reason.clone(),
        }
    }
}

/// Overall engine health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Nothing published yet.
    Starting,
    /// Latest snapshot complete.
    Healthy,
    /// Latest snapshot carries issues.
    Degraded,
}

/// Health summary served to monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineHealth {
    /// Overall status.
    pub status: HealthStatus,
    /// Cycle of the latest snapshot.
    pub cycle: u64,
    /// Publication time of the latest snapshot.
    pub published_at: Option<DateTime<Utc>>,
    /// Number of issues on the latest snapshot.
    pub issues: usize,
    /// Live tier status.
    pub tiers: BTreeMap<Tier, TierStatus>,
}

impl EngineHealth {
    /// Health before the first publication.
    pub fn starting(tiers: BTreeMap<Tier, TierStatus>) -> Self {
        Self {
            status: HealthStatus::Starting,
            cycle: 0,
            published_at: None,
            issues: 0,
            tiers,
        }
    }

    /// True once a snapshot exists.
    pub fn is_ready(&self) -> bool {
        self.status != HealthStatus::Starting
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Inputs retained so stress tests can be re-run on demand.
#[derive(Debug)]
pub(crate) struct RiskState {
    pub(crate) positions: Vec<PoolPosition>,
    pub(crate) returns: Option<ReturnPanel>,
    pub(crate) correlation: Arc<CorrelationMatrix>,
    pub(crate) tranches: Arc<TrancheSet>,
    pub(crate) pool_notional: f64,
}

impl RiskState {
    pub(crate) fn inputs(&self) -> RiskInputs<'_> {
        RiskInputs {
            positions: &self.positions,
            correlation: Arc::clone(&self.correlation),
            returns: self.returns.as_ref(),
            tranches: &self.tranches,
            pool_notional: self.pool_notional,
        }
    }
}

/// Everything consumers can read, as of one publication.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsSnapshot {
    /// Publication counter.
    pub cycle: u64,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// Store version the snapshot was computed from.
    pub store_version: u64,
    /// Latest price tick.
    pub price: Option<PriceTick>,
    /// Latest risk report.
    pub risk_report: Option<Arc<RiskReport>>,
    /// Latest yield waterfall.
    pub waterfall: Option<Arc<YieldWaterfall>>,
    /// Latest obligor correlation matrix.
    pub correlation: Option<Arc<CorrelationMatrix>>,
    /// Current default probability per obligor.
    pub default_probabilities: Arc<BTreeMap<ObligorId, f64>>,
    /// Last data-quality reading per tier.
    pub data_quality: BTreeMap<Tier, f64>,
    /// Tier status at publication.
    pub tiers: BTreeMap<Tier, TierStatus>,
    /// True when any issue is recorded.
    pub degraded: bool,
    /// Contained failures, grouped by reporting tier.
    pub issues: Vec<SnapshotIssue>,
    #[serde(skip)]
    pub(crate) risk_state: Option<Arc<RiskState>>,
}

impl AnalyticsSnapshot {
    /// Allocation of one tranche in the latest waterfall.
    pub fn allocation(&self, tranche: &TrancheId) -> Option<&TrancheAllocation> {
        self.waterfall.as_ref().and_then(|w| w.entry(tranche))
    }

    /// Issues reported by `tier`.
    pub fn issues_for(&self, tier: Tier) -> impl Iterator<Item = &SnapshotIssue> {
        self.issues.iter().filter(move |i| i.tier == tier)
    }

    /// Replaces the issues of `tier`, keeping those of the other tiers.
    pub(crate) fn replace_issues(&mut self, tier: Tier, issues: Vec<SnapshotIssue>) {
        self.issues.retain(|i| i.tier != tier);
        self.issues.extend(issues);
        self.degraded = !self.issues.is_empty();
    }

    /// Health summary using live tier status.
    pub fn health(&self, tiers: BTreeMap<Tier, TierStatus>) -> EngineHealth {
        EngineHealth {
            status: if self.degraded {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            },
            cycle: self.cycle,
            published_at: self.published_at,
            issues: self.issues.len(),
            tiers,
        }
    }
}
