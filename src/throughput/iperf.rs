//! iperf3 process wrapper -- spawn, enforce a deadline, parse JSON output.

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{TestDirection, ThroughputError};

/// Arguments for a single iperf3 client run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iperf3Invocation {
    pub host: String,
    pub port: u16,
    pub duration_secs: u32,
    pub direction: TestDirection,
}

impl Iperf3Invocation {
    /// Command-line arguments, without the program name.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            self.host.clone(),
            "-p".to_string(),
            self.port.to_string(),
            "-t".to_string(),
            self.duration_secs.to_string(),
            "-J".to_string(),
        ];
        if self.direction == TestDirection::Upload {
            args.push("-R".to_string());
        }
        args
    }
}

/// Port to the external measurement tool.
///
/// Returns the tool's structured (JSON) output, or the failure that stopped
/// it. Implementations must not outlive `deadline`.
#[async_trait::async_trait]
pub trait Iperf3Runner: Send + Sync {
    async fn run(
        &self,
        invocation: &Iperf3Invocation,
        deadline: Duration,
    ) -> Result<Value, ThroughputError>;
}

/// Runs the real iperf3 binary as a child process.
pub struct ProcessRunner {
    path: String,
}

impl ProcessRunner {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Iperf3Runner for ProcessRunner {
    async fn run(
        &self,
        invocation: &Iperf3Invocation,
        deadline: Duration,
    ) -> Result<Value, ThroughputError> {
        let args = invocation.args();
        debug!(path = %self.path, ?args, deadline_sec = deadline.as_secs(), "spawning iperf3");

        let mut cmd = Command::new(&self.path);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so expiry can take down anything iperf3 forked.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| ThroughputError::ExternalTool {
            detail: format!("failed to spawn '{}': {}", self.path, e),
        })?;
        let pid = child.id();

        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ThroughputError::ExternalTool {
                    detail: format!("failed to wait for iperf3: {}", e),
                });
            }
            Err(_) => {
                // The child itself was killed when its future was dropped.
                warn!(?pid, deadline_sec = deadline.as_secs(), "iperf3 deadline expired");
                kill_process_group(pid);
                return Err(ThroughputError::Timeout {
                    secs: deadline.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let detail = failure_detail(&output.stderr, &output.stdout);
            debug!(exit_code = output.status.code(), %detail, "iperf3 exited with failure");
            return Err(ThroughputError::ExternalTool { detail });
        }

        parse_output(&output.stdout)
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: killpg has no memory-safety preconditions.
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            debug!(pid, "process group already gone");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Human-readable reason for a failed run.
///
/// iperf3 in `-J` mode reports most errors inside its JSON document rather
/// than on stderr, so that is the second place to look.
pub fn failure_detail(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    serde_json::from_slice::<Value>(stdout)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "iperf3 command failed".to_string())
}

/// Parse raw iperf3 stdout into a JSON document.
pub fn parse_output(stdout: &[u8]) -> Result<Value, ThroughputError> {
    serde_json::from_slice(stdout).map_err(|e| ThroughputError::OutputParse {
        reason: e.to_string(),
    })
}

/// The part of the iperf3 JSON document the metrics are derived from.
///
/// Absent fields read as zero.
#[derive(Debug, Default, Deserialize)]
pub struct Iperf3Report {
    #[serde(default)]
    pub end: Iperf3End,
}

#[derive(Debug, Default, Deserialize)]
pub struct Iperf3End {
    #[serde(default)]
    pub sum_sent: Iperf3Sum,
    #[serde(default)]
    pub sum_received: Iperf3Sum,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Iperf3Sum {
    #[serde(default)]
    pub bits_per_second: f64,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub retransmits: u64,
}

impl Iperf3Report {
    pub fn from_json(raw: &Value) -> Result<Self, ThroughputError> {
        Self::deserialize(raw).map_err(|e| ThroughputError::OutputParse {
            reason: e.to_string(),
        })
    }

    /// Download reads the received summary, upload the sent summary.
    pub fn summary(&self, direction: TestDirection) -> &Iperf3Sum {
        match direction {
            TestDirection::Download => &self.end.sum_received,
            TestDirection::Upload => &self.end.sum_sent,
        }
    }
}
