use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::{Device, ServiceConfig};
use crate::throughput::orchestrator::ThroughputOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ThroughputOrchestrator>,
    /// Bounds the number of synthetic files streaming at once.
    pub stream_permits: Arc<Semaphore>,
    pub devices: Arc<Vec<Device>>,
    pub local_iperf_port: u16,
    /// Authority used for download URLs when a request carries no `Host`.
    pub fallback_host: String,
}

impl AppState {
    pub fn new(orchestrator: ThroughputOrchestrator, config: &ServiceConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            stream_permits: Arc::new(Semaphore::new(config.limits.max_concurrent_streams.max(1))),
            devices: Arc::new(config.devices.clone()),
            local_iperf_port: config.iperf3.local_port,
            fallback_host: config.network.listen_address.clone(),
        }
    }

    /// Refuse new tests and downloads. In-flight work keeps its permit and
    /// runs to completion; waiters are released with a 503.
    pub fn close_admission(&self) {
        self.orchestrator.close();
        self.stream_permits.close();
    }

    /// State backed by the real iperf3 binary.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(ThroughputOrchestrator::from_config(config), config)
    }
}
