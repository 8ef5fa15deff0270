//! Mapping of service errors onto HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::throughput::ThroughputError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Throughput(#[from] ThroughputError),

    #[error(transparent)]
    Body(#[from] JsonRejection),

    #[error("speed test file not found")]
    FileNotFound,

    #[error("service is shutting down")]
    Unavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Throughput(ThroughputError::InvalidServerId { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Throughput(ThroughputError::ShuttingDown) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Throughput(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::FileNotFound => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Human-readable detail returned to the caller.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Throughput(ThroughputError::InvalidServerId { .. }) => {
                "Invalid server ID".to_string()
            }
            ApiError::Throughput(ThroughputError::ExternalTool { detail }) => {
                format!("iperf3 test failed: {}", detail)
            }
            ApiError::Throughput(ThroughputError::OutputParse { .. }) => {
                "Failed to parse iperf3 output".to_string()
            }
            ApiError::Throughput(ThroughputError::Timeout { secs }) => {
                format!("iperf3 test failed: no result within {}s", secs)
            }
            ApiError::Throughput(ThroughputError::ShuttingDown) => {
                "Service unavailable".to_string()
            }
            ApiError::Body(rejection) => format!("Invalid request body: {}", rejection.body_text()),
            ApiError::FileNotFound => "Speed test file not found".to_string(),
            ApiError::Unavailable => "Service unavailable".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let invalid: ApiError = ThroughputError::InvalidServerId { id: "x".into() }.into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.detail(), "Invalid server ID");

        let tool: ApiError = ThroughputError::ExternalTool {
            detail: "unable to connect".into(),
        }
        .into();
        assert_eq!(tool.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(tool.detail(), "iperf3 test failed: unable to connect");

        let parse: ApiError = ThroughputError::OutputParse {
            reason: "eof".into(),
        }
        .into();
        assert_eq!(parse.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parse.detail(), "Failed to parse iperf3 output");

        let timeout: ApiError = ThroughputError::Timeout { secs: 25 }.into();
        assert_eq!(timeout.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let closed: ApiError = ThroughputError::ShuttingDown.into();
        assert_eq!(closed.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(closed.detail(), "Service unavailable");

        assert_eq!(ApiError::FileNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
