//! API routes.

use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::handlers::{self, AppState};

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/snapshot", get(handlers::get_snapshot))
        .route("/api/v1/price", get(handlers::get_price))
        .route("/api/v1/risk", get(handlers::get_risk))
        .route("/api/v1/correlation", get(handlers::get_correlation))
        .route("/api/v1/yield/{tranche_id}", get(handlers::get_yield))
        .route("/api/v1/forecast", get(handlers::get_forecast))
        .route("/api/v1/backtest", get(handlers::get_backtest))
        .route("/api/v1/scenarios", get(handlers::list_scenarios))
        .route("/api/v1/stress/{scenario_id}", get(handlers::run_stress))
        .with_state(state)
}
