// Host-wide cumulative counters via sysinfo and /proc

use super::linux;
use crate::error::{GatewayError, Result};
use crate::models::{InterfaceCounters, RawStatsSample};
use std::sync::{Arc, Mutex};
use sysinfo::{Networks, System};
use tracing::instrument;

/// Samples host counters in the same shape as a container sample.
///
/// `cpu_usage` is busy CPU time and `system_cpu_usage` total CPU time, both summed over
/// all CPUs, so the derived CPU percent uses the same per-core scale as containers.
pub struct HostSampler {
    sys: Arc<Mutex<System>>,
    networks: Arc<Mutex<Networks>>,
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            networks: Arc::new(Mutex::new(Networks::new_with_refreshed_list())),
        }
    }

    #[instrument(skip(self), fields(runtime = "host", operation = "sample"))]
    pub async fn sample(&self) -> Result<RawStatsSample> {
        let sys = self.sys.clone();
        let networks = self.networks.clone();
        tokio::task::spawn_blocking(move || {
            let (online_cpus, memory_used_bytes, memory_limit_bytes) = {
                let mut sys = sys.lock().map_err(|e| {
                    GatewayError::RuntimeUnavailable(format!("sysinfo lock poisoned: {}", e))
                })?;
                sys.refresh_memory();
                (
                    sys.cpus().len().max(1) as u32,
                    sys.used_memory(),
                    sys.total_memory(),
                )
            };

            let networks = {
                let mut guard = networks.lock().map_err(|e| {
                    GatewayError::RuntimeUnavailable(format!(
                        "sysinfo networks lock poisoned: {}",
                        e
                    ))
                })?;
                guard.refresh(true);
                guard
                    .list()
                    .iter()
                    .map(|(name, data)| {
                        (
                            name.clone(),
                            InterfaceCounters {
                                rx_bytes: data.total_received(),
                                tx_bytes: data.total_transmitted(),
                            },
                        )
                    })
                    .collect()
            };

            // Without /proc/stat the CPU counters stay at 0 and derive to 0%.
            let cpu = linux::read_cpu_times().unwrap_or_default();

            Ok(RawStatsSample {
                cpu_usage: cpu.busy,
                system_cpu_usage: cpu.total,
                online_cpus,
                memory_used_bytes,
                memory_limit_bytes,
                networks,
                read_at: crate::now_millis(),
            })
        })
        .await
        .map_err(|e| GatewayError::RuntimeUnavailable(format!("sysinfo task join: {}", e)))?
    }
}
