//! glassmeter -- speed test measurement and delivery for a looking-glass service.
//!
//! This crate drives iperf3 throughput tests against public reference
//! servers, advises users on running iperf3 by hand, and streams synthetic
//! files of exact size for browser download benchmarks.

pub mod api;
pub mod config;
pub mod speedtest;
pub mod throughput;

use anyhow::{Context, Result};

use crate::api::state::AppState;
use crate::config::ServiceConfig;

/// Start the HTTP service and run until interrupted.
pub async fn serve(config: ServiceConfig) -> Result<()> {
    let addr: std::net::SocketAddr = config
        .network
        .listen_address
        .parse()
        .with_context(|| format!("invalid listen address '{}'", config.network.listen_address))?;

    let state = AppState::from_config(&config);
    let app = api::router(state.clone());

    tracing::info!(
        %addr,
        max_concurrent_tests = config.limits.max_concurrent_tests,
        max_concurrent_streams = config.limits.max_concurrent_streams,
        "glassmeter listening"
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("glassmeter stopped");
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested, closing admission");
    state.close_admission();
}
