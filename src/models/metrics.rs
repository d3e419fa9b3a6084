// Derived point-in-time metrics

use serde::{Deserialize, Serialize};

/// Rates and percentages computed from two consecutive raw samples of the same entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub cpu_percent: f64,
    pub memory_used_bytes: u64,
    pub memory_limit_bytes: u64,
    pub memory_percent: f64,
    pub network_rx_bytes_per_interval: u64,
    pub network_tx_bytes_per_interval: u64,
    /// Unix timestamp (ms) of the newer sample.
    pub sampled_at: u64,
}
