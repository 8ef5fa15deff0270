//! API layer -- axum routes, handlers, and middleware.

mod error;
mod routes;
pub mod state;

pub use self::error::ApiError;
use self::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .nest("/api/speedtest", routes::speedtest_api_routes())
        .route("/speedtest/{filename}", get(routes::serve_file))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Device, ServiceConfig};
    use crate::throughput::iperf::{Iperf3Invocation, Iperf3Runner};
    use crate::throughput::orchestrator::ThroughputOrchestrator;
    use crate::throughput::ThroughputError;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt; // for `oneshot`

    struct CannedRunner(Result<Value, &'static str>);

    #[async_trait::async_trait]
    impl Iperf3Runner for CannedRunner {
        async fn run(&self, _: &Iperf3Invocation, _: Duration) -> Result<Value, ThroughputError> {
            self.0.clone().map_err(|detail| ThroughputError::ExternalTool {
                detail: detail.to_string(),
            })
        }
    }

    fn app_with(outcome: Result<Value, &'static str>) -> Router {
        router(state_with(outcome))
    }

    fn state_with(outcome: Result<Value, &'static str>) -> AppState {
        let mut config = ServiceConfig::default();
        config.devices.push(Device {
            name: "edge01".into(),
            address: "192.0.2.1".into(),
        });
        let orchestrator =
            ThroughputOrchestrator::new(Arc::new(CannedRunner(outcome)), 2, Duration::from_secs(5));
        AppState::new(orchestrator, &config)
    }

    fn app() -> Router {
        app_with(Ok(json!({
            "end": {
                "sum_sent": { "bits_per_second": 500000000.0, "bytes": 625000000, "retransmits": 4 },
                "sum_received": { "bits_per_second": 480000000.0, "bytes": 600000000 }
            }
        })))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_test(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/speedtest/iperf3/test")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_len(response: axum::response::Response) -> (u64, usize) {
        let mut stream = response.into_body().into_data_stream();
        let mut total = 0u64;
        let mut largest = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            total += chunk.len() as u64;
            largest = largest.max(chunk.len());
        }
        (total, largest)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_list_servers() {
        let response = app()
            .oneshot(get("/api/speedtest/iperf3/servers"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let servers = json.as_array().unwrap();
        assert_eq!(servers.len(), 6);
        assert_eq!(servers[1]["id"], "iperf_he_fremont");
        assert_eq!(servers[1]["bandwidth"], "100 Gbps");
    }

    #[tokio::test]
    async fn test_run_test_upload_scenario() {
        let response = app()
            .oneshot(post_test(json!({
                "server_id": "iperf_he_fremont",
                "duration": 45,
                "direction": "upload"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["server"]["host"], "iperf.he.net");
        assert_eq!(json["test_config"]["duration"], 10);
        assert_eq!(json["test_config"]["direction"], "upload");
        assert!(json["test_config"]["timestamp"].is_string());
        assert_eq!(json["results"]["speed_mbps"], 500.0);
        assert_eq!(json["results"]["speed_gbps"], 0.5);
        assert_eq!(json["results"]["bytes_transferred"], 625_000_000u64);
        assert_eq!(json["results"]["retransmits"], 4);
        assert!(json["results"]["runtime"].is_number());
        assert_eq!(json["raw_output"]["end"]["sum_received"]["bytes"], 600_000_000u64);
    }

    #[tokio::test]
    async fn test_run_test_defaults_to_download() {
        let response = app()
            .oneshot(post_test(json!({ "server_id": "iperf_scaleway" })))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["test_config"]["direction"], "download");
        assert_eq!(json["test_config"]["duration"], 10);
        assert_eq!(json["results"]["speed_mbps"], 480.0);
        assert_eq!(json["results"]["retransmits"], 0);
    }

    #[tokio::test]
    async fn test_run_test_unknown_server_is_400() {
        let response = app()
            .oneshot(post_test(json!({ "server_id": "nowhere" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "Invalid server ID");
    }

    #[tokio::test]
    async fn test_run_test_non_string_server_id_is_400() {
        for body in [
            json!({ "server_id": 5 }),
            json!({ "server_id": null, "duration": 5 }),
            json!({ "duration": 5 }),
        ] {
            let response = app().oneshot(post_test(body.clone())).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json_body(response).await["detail"], "Invalid server ID");
        }
    }

    #[tokio::test]
    async fn test_run_test_malformed_body_is_400_with_detail() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/speedtest/iperf3/test")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"server_id\": "))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.starts_with("Invalid request body"), "{detail}");

        let request = Request::builder()
            .method("POST")
            .uri("/api/speedtest/iperf3/test")
            .body(Body::from("server_id=iperf_he_fremont"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn test_closed_admission_is_503() {
        let state = state_with(Ok(json!({})));
        state.close_admission();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(post_test(json!({ "server_id": "iperf_he_fremont" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["detail"], "Service unavailable");

        let response = app.oneshot(get("/speedtest/100MB.bin")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["detail"], "Service unavailable");
    }

    #[tokio::test]
    async fn test_run_test_tool_failure_is_500() {
        let response = app_with(Err("unable to connect to server"))
            .oneshot(post_test(json!({ "server_id": "iperf_bouygues", "duration": 5 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["detail"],
            "iperf3 test failed: unable to connect to server"
        );
    }

    #[tokio::test]
    async fn test_run_test_parse_failure_is_500() {
        let response = app_with(Ok(json!({ "end": [] })))
            .oneshot(post_test(json!({ "server_id": "iperf_bouygues" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["detail"], "Failed to parse iperf3 output");
    }

    #[tokio::test]
    async fn test_command_advice() {
        let response = app()
            .oneshot(get("/api/speedtest/iperf3/command?server_id=iperf_he_chicago"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["server_ip"], "192.0.2.1");
        assert_eq!(json["target_server"]["id"], "iperf_he_chicago");
        assert_eq!(
            json["commands"]["from_your_server"]["upload"],
            "iperf3 -c iperf-chi.he.net -p 5201 -t 10 -R"
        );
    }

    #[tokio::test]
    async fn test_command_advice_without_query_uses_default() {
        let response = app()
            .oneshot(get("/api/speedtest/iperf3/command"))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["target_server"]["id"], "iperf_he_fremont");
    }

    #[tokio::test]
    async fn test_file_listing_uses_request_host() {
        let request = Request::builder()
            .uri("/api/speedtest/files")
            .header(header::HOST, "lg.example.net")
            .body(Body::empty())
            .unwrap();
        let json = json_body(app().oneshot(request).await.unwrap()).await;
        assert_eq!(json["files"][0]["url"], "http://lg.example.net/speedtest/100MB.bin");
        assert_eq!(json["files"][0]["bytes"], 104_857_600u64);
        assert_eq!(
            json["instructions"]["examples"]["wget"],
            "wget http://lg.example.net/speedtest/100MB.bin"
        );
    }

    #[tokio::test]
    async fn test_download_100mb_is_exact() {
        let response = app().oneshot(get("/speedtest/100MB.bin")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "104857600");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"100MB.bin\""
        );

        let (total, largest) = body_len(response).await;
        assert_eq!(total, 104_857_600);
        assert!(largest <= 1024 * 1024);
    }

    #[tokio::test]
    async fn test_download_unknown_is_404() {
        let response = app().oneshot(get("/speedtest/unknown.bin")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["detail"], "Speed test file not found");
    }

    #[tokio::test]
    async fn test_concurrent_downloads_are_independent() {
        let app = app();
        let names = ["100MB.bin", "1GB.bin", "100MB.bin", "1GB.bin"];
        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let app = app.clone();
                let uri = format!("/speedtest/{}", name);
                tokio::spawn(async move {
                    let response = app.oneshot(get(&uri)).await.unwrap();
                    body_len(response).await.0
                })
            })
            .collect();

        for (name, handle) in names.iter().zip(handles) {
            let expected = crate::speedtest::catalog::lookup(name).unwrap().size_bytes;
            assert_eq!(handle.await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_route_falls_back() {
        let response = app().oneshot(get("/api/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
