//! TOML configuration for the glassmeter service.
//!
//! Every section falls back to compiled-in defaults, so an empty file (or no
//! file at all) yields a working configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "GLASSMETER_CONFIG";

/// Standard system location for the config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/glassmeter/glassmeter.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the glassmeter process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub iperf3: Iperf3Config,
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Device inventory. The first entry is advertised as the local
    /// iperf3 endpoint by the command advisor.
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded glassmeter configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path specified by the `GLASSMETER_CONFIG` environment variable.
    /// 2. `/etc/glassmeter/glassmeter.toml`.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "GLASSMETER_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address and port for the HTTP API listener.
    pub listen_address: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Iperf3
// ---------------------------------------------------------------------------

/// Configuration for the iperf3 subprocess used by throughput tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Iperf3Config {
    /// Path (or bare command name resolved via `$PATH`) to the iperf3 binary.
    pub path: String,
    /// Seconds added to the test duration before the child is killed.
    pub grace_sec: u64,
    /// Port of the iperf3 server running on this host, used in advice.
    pub local_port: u16,
}

impl Default for Iperf3Config {
    fn default() -> Self {
        Self {
            path: "iperf3".to_string(),
            grace_sec: 15,
            local_port: 5201,
        }
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Admission limits for expensive operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of iperf3 processes running at once.
    pub max_concurrent_tests: usize,
    /// Maximum number of synthetic file downloads streaming at once.
    pub max_concurrent_streams: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tests: 2,
            max_concurrent_streams: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// A looking-glass device from the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub address: String,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
