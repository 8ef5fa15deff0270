//! Throughput test orchestration: resolve the server, repair parameters,
//! run iperf3 under admission control, derive normalized metrics.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use super::iperf::{Iperf3Invocation, Iperf3Report, Iperf3Runner, Iperf3Sum, ProcessRunner};
use super::servers::{find_server, ServerDescriptor};
use super::{TestDirection, ThroughputError};
use crate::config::ServiceConfig;

pub const DEFAULT_DURATION_SECS: u32 = 10;
pub const MIN_DURATION_SECS: u32 = 1;
pub const MAX_DURATION_SECS: u32 = 30;

/// Repair a requested duration: anything absent or outside
/// `[MIN_DURATION_SECS, MAX_DURATION_SECS]` becomes the default.
pub fn repair_duration(requested: Option<i64>) -> u32 {
    match requested {
        Some(secs) if (MIN_DURATION_SECS as i64..=MAX_DURATION_SECS as i64).contains(&secs) => {
            secs as u32
        }
        _ => DEFAULT_DURATION_SECS,
    }
}

/// Raw request body as posted by the UI. Fields are loosely typed so that
/// bad values can be repaired instead of rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestRequestBody {
    #[serde(default)]
    pub server_id: Option<Value>,
    #[serde(default)]
    pub duration: Option<Value>,
    #[serde(default)]
    pub direction: Option<Value>,
}

/// A validated throughput test request. `duration_secs` is always in range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRequest {
    pub server_id: String,
    pub duration_secs: u32,
    pub direction: TestDirection,
}

impl TestRequest {
    pub fn new(server_id: impl Into<String>, duration: Option<i64>, direction: TestDirection) -> Self {
        Self {
            server_id: server_id.into(),
            duration_secs: repair_duration(duration),
            direction,
        }
    }
}

impl From<TestRequestBody> for TestRequest {
    fn from(body: TestRequestBody) -> Self {
        // A non-string id matches no server and is rejected by `run_test`.
        let server_id = body
            .server_id
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default();
        // `as_i64` is None for floats, strings, bools and null.
        let duration = body.duration.as_ref().and_then(Value::as_i64);
        Self::new(
            server_id,
            duration,
            TestDirection::from_loose(body.direction.as_ref()),
        )
    }
}

/// Normalized throughput metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestMetrics {
    #[serde(rename = "speed_bps")]
    pub bits_per_second: f64,
    #[serde(rename = "speed_mbps")]
    pub megabits_per_second: f64,
    #[serde(rename = "speed_gbps")]
    pub gigabits_per_second: f64,
    pub bytes_transferred: u64,
    pub retransmits: u64,
    #[serde(rename = "runtime")]
    pub runtime_seconds: f64,
}

impl TestMetrics {
    /// Derive metrics from the iperf3 summary for `direction`.
    ///
    /// Retransmits are a sender-side statistic and only reported for
    /// uploads. `runtime` is the measured wall-clock time, not the duration
    /// iperf3 claims.
    pub fn from_summary(summary: &Iperf3Sum, direction: TestDirection, runtime: Duration) -> Self {
        let bps = summary.bits_per_second.max(0.0);
        Self {
            bits_per_second: bps,
            megabits_per_second: round_to(bps / 1_000_000.0, 2),
            gigabits_per_second: round_to(bps / 1_000_000_000.0, 3),
            bytes_transferred: summary.bytes,
            retransmits: match direction {
                TestDirection::Upload => summary.retransmits,
                TestDirection::Download => 0,
            },
            runtime_seconds: round_to(runtime.as_secs_f64(), 2),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Echo of the effective test parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestConfig {
    pub duration: u32,
    pub direction: TestDirection,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a successful throughput test.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub success: bool,
    pub server: &'static ServerDescriptor,
    pub test_config: TestConfig,
    pub results: TestMetrics,
    /// iperf3's JSON document, passed through unmodified.
    pub raw_output: Value,
}

/// Runs throughput tests, at most `max_concurrent` at a time.
pub struct ThroughputOrchestrator {
    runner: Arc<dyn Iperf3Runner>,
    permits: Arc<Semaphore>,
    grace: Duration,
}

impl ThroughputOrchestrator {
    pub fn new(runner: Arc<dyn Iperf3Runner>, max_concurrent: usize, grace: Duration) -> Self {
        Self {
            runner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            grace,
        }
    }

    /// Orchestrator backed by the real iperf3 binary.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            Arc::new(ProcessRunner::new(config.iperf3.path.clone())),
            config.limits.max_concurrent_tests,
            Duration::from_secs(config.iperf3.grace_sec),
        )
    }

    /// Stop admitting tests. Runs already holding a permit finish; queued and
    /// later callers get `ShuttingDown`.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Run one test. Either the whole result is returned or an error; there
    /// are no partial results.
    pub async fn run_test(&self, request: TestRequest) -> Result<TestResult, ThroughputError> {
        let server =
            find_server(&request.server_id).ok_or_else(|| ThroughputError::InvalidServerId {
                id: request.server_id.clone(),
            })?;

        let test_id = Uuid::new_v4().to_string();
        let invocation = Iperf3Invocation {
            host: server.host.to_string(),
            port: server.port,
            duration_secs: request.duration_secs,
            direction: request.direction,
        };
        let deadline = Duration::from_secs(u64::from(request.duration_secs)) + self.grace;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ThroughputError::ShuttingDown)?;

        info!(
            test_id = test_id.as_str(),
            server = server.name,
            duration = request.duration_secs,
            direction = %request.direction,
            "starting iperf3 test"
        );

        let start = Instant::now();
        let outcome = self.runner.run(&invocation, deadline).await;
        let runtime = start.elapsed();

        let raw = outcome.map_err(|e| {
            error!(test_id = test_id.as_str(), error = %e, "iperf3 test failed");
            e
        })?;
        let report = Iperf3Report::from_json(&raw).map_err(|e| {
            error!(test_id = test_id.as_str(), error = %e, "unexpected iperf3 output");
            e
        })?;

        let results =
            TestMetrics::from_summary(report.summary(request.direction), request.direction, runtime);

        info!(
            test_id = test_id.as_str(),
            speed_mbps = results.megabits_per_second,
            runtime = results.runtime_seconds,
            "iperf3 test completed"
        );

        Ok(TestResult {
            success: true,
            server,
            test_config: TestConfig {
                duration: request.duration_secs,
                direction: request.direction,
                timestamp: Utc::now(),
            },
            results,
            raw_output: raw,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
