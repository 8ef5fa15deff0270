//! Throughput testing engine: iperf3 orchestration against reference servers.

pub mod advisor;
pub mod iperf;
pub mod orchestrator;
pub mod report;
pub mod servers;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThroughputError {
    #[error("unknown iperf3 server id '{id}'")]
    InvalidServerId { id: String },

    #[error("iperf3 failed: {detail}")]
    ExternalTool { detail: String },

    #[error("failed to parse iperf3 output: {reason}")]
    OutputParse { reason: String },

    #[error("iperf3 did not finish within {secs}s; process group killed")]
    Timeout { secs: u64 },

    #[error("throughput tests are no longer being admitted")]
    ShuttingDown,
}

/// Direction of the measured flow, relative to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestDirection {
    #[default]
    Download,
    Upload,
}

impl TestDirection {
    /// Repair a loosely-typed direction value: `"upload"` selects upload,
    /// anything else (including absent) is a download.
    pub fn from_loose(value: Option<&serde_json::Value>) -> Self {
        match value.and_then(|v| v.as_str()) {
            Some("upload") => TestDirection::Upload,
            _ => TestDirection::Download,
        }
    }
}

impl std::fmt::Display for TestDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestDirection::Download => write!(f, "download"),
            TestDirection::Upload => write!(f, "upload"),
        }
    }
}

impl std::str::FromStr for TestDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(TestDirection::Download),
            "upload" => Ok(TestDirection::Upload),
            other => Err(format!("unknown direction '{}' (expected download or upload)", other)),
        }
    }
}
