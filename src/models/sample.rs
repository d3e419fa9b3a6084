// Raw cumulative counters as reported by the container runtime

use std::collections::HashMap;

/// Cumulative rx/tx byte counters for one network interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Point-in-time snapshot of cumulative counters for one entity (a container or the host).
///
/// Two temporally adjacent samples of the same entity are needed to derive a rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatsSample {
    /// Cumulative CPU time consumed by the entity.
    pub cpu_usage: u64,
    /// Cumulative CPU time elapsed on the host, same unit as `cpu_usage`.
    pub system_cpu_usage: u64,
    pub online_cpus: u32,
    pub memory_used_bytes: u64,
    /// 0 when the runtime reports no limit.
    pub memory_limit_bytes: u64,
    pub networks: HashMap<String, InterfaceCounters>,
    /// Unix timestamp (ms) at which the sample was taken.
    pub read_at: u64,
}
