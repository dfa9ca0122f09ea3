//! HTTP request handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use sluice_core::ids::{ScenarioId, TrancheId};
use sluice_core::types::{CorrelationMatrix, PriceTick};
use sluice_engine::{AnalyticsSnapshot, EngineHealth, HealthStatus, QueryHandle};
use sluice_risk::RiskReport;
use sluice_yield::{BacktestReport, TrancheAllocation, YieldForecast};

use crate::error::ServerError;

/// Shared application state.
pub struct AppState {
    /// Read side of the running engine.
    pub query: QueryHandle,
}

impl AppState {
    /// Create new application state.
    pub fn new(query: QueryHandle) -> Self {
        Self { query }
    }
}

type ApiResult<T> = Result<Json<T>, ServerError>;

// =============================================================================
// HEALTH
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    engine: EngineHealth,
    version: &'static str,
}

/// Engine health. Answers 503 until the first snapshot is published.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let engine = state.query.health();
    let status = match engine.status {
        HealthStatus::Starting => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (
        status,
        Json(HealthResponse {
            engine,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

// =============================================================================
// ANALYTICS
// =============================================================================

pub async fn get_price(State(state): State<Arc<AppState>>) -> ApiResult<PriceTick> {
    Ok(Json(state.query.get_latest_price()?))
}

pub async fn get_risk(State(state): State<Arc<AppState>>) -> ApiResult<Arc<RiskReport>> {
    Ok(Json(state.query.get_risk_report()?))
}

pub async fn get_correlation(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Arc<CorrelationMatrix>> {
    Ok(Json(state.query.get_correlation_matrix()?))
}

pub async fn get_yield(
    State(state): State<Arc<AppState>>,
    Path(tranche_id): Path<String>,
) -> ApiResult<TrancheAllocation> {
    let tranche = TrancheId::new(tranche_id);
    Ok(Json(state.query.get_yield_breakdown(&tranche)?))
}

#[derive(Debug, Deserialize)]
pub struct ForecastParams {
    #[serde(default = "default_forecast_days")]
    days: u32,
}

fn default_forecast_days() -> u32 {
    30
}

pub async fn get_forecast(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ForecastParams>,
) -> ApiResult<YieldForecast> {
    Ok(Json(state.query.forecast_yield(params.days)?))
}

#[derive(Debug, Deserialize)]
pub struct BacktestParams {
    #[serde(default = "default_backtest_days")]
    days: u32,
}

fn default_backtest_days() -> u32 {
    90
}

pub async fn get_backtest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BacktestParams>,
) -> ApiResult<BacktestReport> {
    Ok(Json(state.query.backtest_portfolio(params.days)?))
}

pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> ApiResult<Arc<AnalyticsSnapshot>> {
    Ok(Json(state.query.snapshot()?))
}

// =============================================================================
// STRESS
// =============================================================================

pub async fn list_scenarios(State(state): State<Arc<AppState>>) -> Json<Vec<ScenarioId>> {
    Json(state.query.scenarios())
}

/// Runs one scenario against the latest inputs on a blocking thread.
pub async fn run_stress(
    State(state): State<Arc<AppState>>,
    Path(scenario_id): Path<String>,
) -> ApiResult<RiskReport> {
    let query = state.query.clone();
    let scenario = ScenarioId::new(scenario_id);
    let report = tokio::task::spawn_blocking(move || query.run_stress_test(&scenario))
        .await
        .map_err(|e| ServerError::internal(e.to_string()))??;
    Ok(Json(report))
}
