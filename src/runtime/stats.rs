// Convert raw Docker stats API responses into RawStatsSample.

use crate::models::{InterfaceCounters, RawStatsSample};
use bollard::models::ContainerStatsResponse;

/// Page-cache keys subtracted from memory usage, in lookup order (cgroup v2, then v1).
const CACHE_KEYS: [&str; 2] = ["inactive_file", "total_inactive_file"];

/// Map a Docker stats response to our cumulative counters. `None` when CPU stats are missing.
pub(crate) fn to_raw_sample(s: &ContainerStatsResponse, read_at: u64) -> Option<RawStatsSample> {
    let cpu_stats = s.cpu_stats.as_ref()?;
    let cpu_usage = cpu_stats.cpu_usage.as_ref()?;

    // Older engines omit online_cpus; fall back to the per-cpu breakdown, then 1.
    let online_cpus = cpu_stats
        .online_cpus
        .filter(|n| *n > 0)
        .or_else(|| {
            cpu_usage
                .percpu_usage
                .as_ref()
                .map(|p| p.len() as u32)
                .filter(|n| *n > 0)
        })
        .unwrap_or(1);

    let memory = s.memory_stats.as_ref();
    let mem_usage = memory.and_then(|m| m.usage).unwrap_or(0);
    let mem_cache = memory
        .and_then(|m| m.stats.as_ref())
        .and_then(|stats| CACHE_KEYS.iter().find_map(|k| stats.get(*k).copied()))
        .unwrap_or(0);
    let mem_limit = memory.and_then(|m| m.limit).unwrap_or(0);

    let networks = s
        .networks
        .as_ref()
        .map(|n| {
            n.iter()
                .map(|(name, v)| {
                    (
                        name.clone(),
                        InterfaceCounters {
                            rx_bytes: v.rx_bytes.unwrap_or(0),
                            tx_bytes: v.tx_bytes.unwrap_or(0),
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    Some(RawStatsSample {
        cpu_usage: cpu_usage.total_usage.unwrap_or(0),
        system_cpu_usage: cpu_stats.system_cpu_usage.unwrap_or(0),
        online_cpus,
        memory_used_bytes: mem_usage.saturating_sub(mem_cache),
        memory_limit_bytes: mem_limit,
        networks,
        read_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{
        ContainerCpuStats, ContainerCpuUsage, ContainerMemoryStats, ContainerNetworkStats,
    };
    use std::collections::HashMap;

    fn cpu_stats(total_usage: u64, system_cpu_usage: u64, online: Option<u32>) -> ContainerCpuStats {
        ContainerCpuStats {
            cpu_usage: Some(ContainerCpuUsage {
                total_usage: Some(total_usage),
                ..Default::default()
            }),
            system_cpu_usage: Some(system_cpu_usage),
            online_cpus: online,
            throttling_data: None,
        }
    }

    #[test]
    fn returns_none_when_cpu_stats_missing() {
        let s = ContainerStatsResponse {
            cpu_stats: None,
            ..Default::default()
        };
        assert!(to_raw_sample(&s, 0).is_none());
    }

    #[test]
    fn maps_counters_and_interfaces() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(cpu_stats(100_000_000, 1_000_000_000, Some(2))),
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(256 * 1024 * 1024),
                limit: Some(512 * 1024 * 1024),
                ..Default::default()
            }),
            networks: Some({
                let mut m = HashMap::new();
                m.insert(
                    "eth0".to_string(),
                    ContainerNetworkStats {
                        rx_bytes: Some(1000),
                        tx_bytes: Some(2000),
                        ..Default::default()
                    },
                );
                m.insert(
                    "eth1".to_string(),
                    ContainerNetworkStats {
                        rx_bytes: Some(10),
                        ..Default::default()
                    },
                );
                m
            }),
            ..Default::default()
        };
        let out = to_raw_sample(&s, 42).unwrap();
        assert_eq!(out.cpu_usage, 100_000_000);
        assert_eq!(out.system_cpu_usage, 1_000_000_000);
        assert_eq!(out.online_cpus, 2);
        assert_eq!(out.memory_used_bytes, 256 * 1024 * 1024);
        assert_eq!(out.memory_limit_bytes, 512 * 1024 * 1024);
        assert_eq!(out.networks.len(), 2);
        assert_eq!(out.networks["eth0"].rx_bytes, 1000);
        assert_eq!(out.networks["eth0"].tx_bytes, 2000);
        assert_eq!(out.networks["eth1"].tx_bytes, 0);
        assert_eq!(out.read_at, 42);
    }

    #[test]
    fn online_cpus_falls_back_to_percpu_then_one() {
        let mut cpu = cpu_stats(1, 1, None);
        cpu.cpu_usage = Some(ContainerCpuUsage {
            total_usage: Some(1),
            percpu_usage: Some(vec![1, 2, 3, 4]),
            ..Default::default()
        });
        let s = ContainerStatsResponse {
            cpu_stats: Some(cpu),
            ..Default::default()
        };
        assert_eq!(to_raw_sample(&s, 0).unwrap().online_cpus, 4);

        let s = ContainerStatsResponse {
            cpu_stats: Some(cpu_stats(1, 1, Some(0))),
            ..Default::default()
        };
        assert_eq!(to_raw_sample(&s, 0).unwrap().online_cpus, 1);
    }

    #[test]
    fn memory_usage_excludes_inactive_page_cache() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(cpu_stats(1, 1, Some(1))),
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(1000),
                limit: Some(4000),
                stats: Some(HashMap::from([("inactive_file".to_string(), 300u64)])),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out = to_raw_sample(&s, 0).unwrap();
        assert_eq!(out.memory_used_bytes, 700);
        assert_eq!(out.memory_limit_bytes, 4000);
    }

    #[test]
    fn missing_memory_and_networks_default_to_zero() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(cpu_stats(5, 10, Some(1))),
            ..Default::default()
        };
        let out = to_raw_sample(&s, 0).unwrap();
        assert_eq!(out.memory_used_bytes, 0);
        assert_eq!(out.memory_limit_bytes, 0);
        assert!(out.networks.is_empty());
    }
}
