//! metricwatch -- threshold and pattern anomaly detection over metric streams.
//!
//! This crate provides the detection engine, its TOML configuration, and an
//! HTTP API that serves detection requests.

pub mod api;
pub mod config;
pub mod detect;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::MetricwatchConfig;
use crate::detect::ids::UuidIds;
use crate::detect::DetectionEngine;

/// Start the metricwatch daemon and serve the HTTP API until shutdown.
pub async fn serve(config: MetricwatchConfig) -> Result<()> {
    let engine = DetectionEngine::new(config.detection.clone(), Arc::new(UuidIds));
    let state = api::state::AppState::new(
        engine,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr: std::net::SocketAddr = config
        .server
        .listen_address
        .parse()
        .with_context(|| format!("invalid listen address: {}", config.server.listen_address))?;
    let app = api::router(state);

    tracing::info!(%addr, "metricwatch listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("metricwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
