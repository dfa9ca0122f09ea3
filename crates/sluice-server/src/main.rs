//! Sluice server binary.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sluice_config::EngineConfig;
use sluice_engine::{MockConfig, MockDataProvider, Orchestrator};
use sluice_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sluice=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        ServerConfig::from_file(&config_path)
            .with_context(|| format!("loading server config {config_path}"))?
    } else {
        info!("config file not found, using defaults");
        ServerConfig::default()
    };

    let engine_config = match &config.engine_config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let provider = MockDataProvider::new(
        MockConfig::default()
            .with_obligors(config.mock_obligors)
            .with_tranches(engine_config.pool.tranches.clone())
            .with_seed(config.mock_seed),
    );

    let engine = Orchestrator::bootstrap(engine_config, Arc::new(provider))
        .await
        .context("bootstrapping engine")?;
    let first = engine.start().await.context("starting engine")?;
    info!(cycle = first.cycle, degraded = first.degraded, "engine started");

    let server = Server::new(config, engine.query_handle());
    server
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("serving")?;

    engine.shutdown().await;
    info!("engine stopped");
    Ok(())
}
