//! API route definitions.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::error::ApiError;
use super::state::AppState;
use crate::speedtest::{catalog, delivery};
use crate::throughput::advisor::{advise_commands, CommandAdvice};
use crate::throughput::orchestrator::{TestRequestBody, TestResult};
use crate::throughput::servers::{list_servers, ServerDescriptor};

/// Routes nested under `/api/speedtest`.
pub fn speedtest_api_routes() -> Router<AppState> {
    Router::new()
        .route("/iperf3/servers", get(iperf3_servers))
        .route("/iperf3/test", post(iperf3_test))
        .route("/iperf3/command", get(iperf3_command))
        .route("/files", get(speedtest_files))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn iperf3_servers() -> Json<&'static [ServerDescriptor]> {
    Json(list_servers())
}

async fn iperf3_test(
    State(state): State<AppState>,
    body: Result<Json<TestRequestBody>, JsonRejection>,
) -> Result<Json<TestResult>, ApiError> {
    let Json(body) = body?;
    let result = state.orchestrator.run_test(body.into()).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct CommandQuery {
    server_id: Option<String>,
}

async fn iperf3_command(
    State(state): State<AppState>,
    Query(query): Query<CommandQuery>,
) -> Json<CommandAdvice> {
    Json(advise_commands(
        &state.devices,
        state.local_iperf_port,
        query.server_id.as_deref(),
    ))
}

async fn speedtest_files(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<delivery::FileListing> {
    let base = delivery::base_url(&headers, &state.fallback_host);
    Json(delivery::file_listing(&base))
}

/// `GET /speedtest/{filename}`
pub async fn serve_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let spec = catalog::lookup(&filename).ok_or_else(|| {
        debug!(%filename, "unknown speed test file");
        ApiError::FileNotFound
    })?;

    let permit = state
        .stream_permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ApiError::Unavailable)?;

    info!(filename = spec.filename, bytes = spec.size_bytes, "serving speed test file");
    Ok(delivery::file_response(spec, Some(permit)))
}
