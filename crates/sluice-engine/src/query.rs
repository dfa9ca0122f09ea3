//! Read-only query interface.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use sluice_config::EngineConfig;
use sluice_core::ids::{ScenarioId, TrancheId};
use sluice_core::types::{CorrelationMatrix, PriceTick, TrancheSet};
use sluice_risk::{RiskCalculator, RiskReport};
use sluice_store::StoreReader;
use sluice_yield::{
    backtest_portfolio, forecast_yield, BacktestInputs, BacktestReport, ForecastInputs,
    TrancheAllocation, YieldForecast,
};

use crate::error::{QueryError, QueryResult};
use crate::orchestrator::{SnapshotReceiver, TierBoard};
use crate::snapshot::{AnalyticsSnapshot, EngineHealth};

/// Clonable handle for reading published analytics.
///
/// Every read sees one complete snapshot. Stress tests are computed on
/// demand from the inputs retained with the latest slow-tier publication
/// and never change what is published.
#[derive(Clone)]
pub struct QueryHandle {
    receiver: SnapshotReceiver,
    calculator: Arc<RiskCalculator>,
    config: Arc<EngineConfig>,
    tranches: Arc<TrancheSet>,
    tiers: TierBoard,
    store: StoreReader,
}

impl QueryHandle {
    pub(crate) fn new(
        receiver: SnapshotReceiver,
        calculator: Arc<RiskCalculator>,
        config: Arc<EngineConfig>,
        tranches: Arc<TrancheSet>,
        tiers: TierBoard,
        store: StoreReader,
    ) -> Self {
        Self {
            receiver,
            calculator,
            config,
            tranches,
            tiers,
            store,
        }
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> QueryResult<Arc<AnalyticsSnapshot>> {
        self.receiver
            .borrow()
            .clone()
            .ok_or_else(|| QueryError::not_ready("snapshot"))
    }

    /// Latest price tick.
    pub fn get_latest_price(&self) -> QueryResult<PriceTick> {
        self.snapshot()?
            .price
            .ok_or_else(|| QueryError::not_ready("price"))
    }

    /// Latest risk report.
    pub fn get_risk_report(&self) -> QueryResult<Arc<RiskReport>> {
        self.snapshot()?
            .risk_report
            .clone()
            .ok_or_else(|| QueryError::not_ready("risk report"))
    }

    /// One tranche's line in the latest waterfall.
    pub fn get_yield_breakdown(&self, tranche: &TrancheId) -> QueryResult<TrancheAllocation> {
        if self.tranches.get(tranche).is_none() {
            return Err(QueryError::UnknownTranche(tranche.clone()));
        }
        let snapshot = self.snapshot()?;
        snapshot
            .allocation(tranche)
            .cloned()
            .ok_or_else(|| QueryError::not_ready("yield waterfall"))
    }

    /// Recomputes the latest risk report under one configured scenario.
    ///
    /// CPU-bound; async callers should run it on a blocking thread.
    pub fn run_stress_test(&self, scenario: &ScenarioId) -> QueryResult<RiskReport> {
        let definition = self
            .config
            .scenario(scenario.as_str())
            .ok_or_else(|| QueryError::UnknownScenario(scenario.clone()))?;
        let snapshot = self.snapshot()?;
        let state = snapshot
            .risk_state
            .as_ref()
            .ok_or_else(|| QueryError::not_ready("risk inputs"))?;
        let report = self
            .calculator
            .run_stress(&state.inputs(), definition, Utc::now())?;
        info!(
            scenario = %scenario,
            expected_loss = report.expected_loss,
            "stress test run"
        );
        Ok(report)
    }

    /// Forecasts pool yield from the stored cash history.
    pub fn forecast_yield(&self, days_ahead: u32) -> QueryResult<YieldForecast> {
        let store = self.store.snapshot();
        let forecast = forecast_yield(
            &self.config.yields,
            &ForecastInputs {
                pool_notional: self.config.pool.notional,
                transactions: store.transactions(),
                as_of: Utc::now(),
                days_ahead,
            },
        )?;
        Ok(forecast)
    }

    /// Replays the last `period_days` days of stored cash flows.
    pub fn backtest_portfolio(&self, period_days: u32) -> QueryResult<BacktestReport> {
        let store = self.store.snapshot();
        let report = backtest_portfolio(
            &self.config.yields,
            &BacktestInputs {
                pool_notional: self.config.pool.notional,
                transactions: store.transactions(),
                end: Utc::now(),
                period_days,
            },
        )?;
        info!(
            period_days,
            total_return = report.total_return,
            max_drawdown = report.max_drawdown,
            "backtest run"
        );
        Ok(report)
    }

    /// Latest correlation matrix.
    pub fn get_correlation_matrix(&self) -> QueryResult<Arc<CorrelationMatrix>> {
        self.snapshot()?
            .correlation
            .clone()
            .ok_or_else(|| QueryError::not_ready("correlation matrix"))
    }

    /// Health summary with live tier status.
    pub fn health(&self) -> EngineHealth {
        let tiers = self.tiers.lock().clone();
        match self.receiver.borrow().as_ref() {
            Some(snapshot) => snapshot.health(tiers),
            None => EngineHealth::starting(tiers),
        }
    }

    /// Configured scenario ids.
    pub fn scenarios(&self) -> Vec<ScenarioId> {
        self.config.scenarios.iter().map(|s| s.id.clone()).collect()
    }

    /// Validated tranche stack.
    pub fn tranches(&self) -> &TrancheSet {
        &self.tranches
    }

    /// A receiver notified on every publication.
    pub fn subscribe(&self) -> SnapshotReceiver {
        let mut receiver = self.receiver.clone();
        let _ = receiver.borrow_and_update();
        receiver
    }
}

impl std::fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandle")
            .field("tranches", &self.tranches.len())
            .field("scenarios", &self.config.scenarios.len())
            .finish_non_exhaustive()
    }
}
