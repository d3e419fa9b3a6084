// Cumulative counters -> point-in-time percentages and throughput

use crate::models::{DerivedMetrics, RawStatsSample};

/// Derive metrics from two consecutive samples of the same entity.
///
/// Zero elapsed host CPU time and a zero memory limit yield 0 rather than an error.
/// Counters that went backwards (interface or cgroup reset) contribute 0.
pub fn derive(prev: &RawStatsSample, curr: &RawStatsSample) -> DerivedMetrics {
    let (rx, tx) = network_deltas(prev, curr);
    DerivedMetrics {
        cpu_percent: round2(cpu_percent(prev, curr)),
        memory_used_bytes: curr.memory_used_bytes,
        memory_limit_bytes: curr.memory_limit_bytes,
        memory_percent: round2(memory_percent(
            curr.memory_used_bytes,
            curr.memory_limit_bytes,
        )),
        network_rx_bytes_per_interval: rx,
        network_tx_bytes_per_interval: tx,
        sampled_at: curr.read_at,
    }
}

fn cpu_percent(prev: &RawStatsSample, curr: &RawStatsSample) -> f64 {
    let cpu_delta = curr.cpu_usage.saturating_sub(prev.cpu_usage);
    let system_delta = curr.system_cpu_usage.saturating_sub(prev.system_cpu_usage);
    if system_delta == 0 {
        return 0.0;
    }
    (cpu_delta as f64 / system_delta as f64) * 100.0 * curr.online_cpus as f64
}

fn memory_percent(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    ((used as f64 / limit as f64) * 100.0).clamp(0.0, 100.0)
}

/// Sum of per-interface byte deltas. Interfaces without a baseline in `prev` are skipped.
fn network_deltas(prev: &RawStatsSample, curr: &RawStatsSample) -> (u64, u64) {
    curr.networks
        .iter()
        .filter_map(|(name, now)| prev.networks.get(name).map(|before| (before, now)))
        .fold((0u64, 0u64), |(rx, tx), (before, now)| {
            (
                rx + now.rx_bytes.saturating_sub(before.rx_bytes),
                tx + now.tx_bytes.saturating_sub(before.tx_bytes),
            )
        })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
