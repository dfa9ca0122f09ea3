//! # Sluice Server
//!
//! Read-only HTTP interface over a running Sluice engine.
//!
//! ## Endpoints
//!
//! - `GET /health` - engine health and tier status
//! - `GET /api/v1/snapshot` - the full latest snapshot
//! - `GET /api/v1/price` - latest price tick
//! - `GET /api/v1/risk` - latest risk report
//! - `GET /api/v1/correlation` - latest correlation matrix
//! - `GET /api/v1/yield/{tranche_id}` - one tranche's waterfall line
//! - `GET /api/v1/scenarios` - configured stress scenario ids
//! - `GET /api/v1/stress/{scenario_id}` - on-demand stress test

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
#[allow(missing_docs)]
pub mod handlers;
pub mod routes;

use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use sluice_engine::QueryHandle;

pub use config::ServerConfig;
pub use error::ServerError;
pub use handlers::AppState;

/// HTTP server over a [`QueryHandle`].
pub struct Server {
    config: ServerConfig,
    query: QueryHandle,
}

impl Server {
    /// Create a new server.
    pub fn new(config: ServerConfig, query: QueryHandle) -> Self {
        Self { config, query }
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState::new(self.query.clone()));

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        routes::create_router(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(%addr, "server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
