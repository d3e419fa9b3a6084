// Linux-specific helpers: cumulative host CPU time from /proc/stat.

/// Aggregate CPU time in clock ticks, summed across all CPUs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct CpuTimes {
    /// Non-idle time (everything except idle and iowait).
    pub busy: u64,
    pub total: u64,
}

/// Read the aggregate "cpu" line of /proc/stat (Linux). `None` elsewhere or if unreadable.
pub(super) fn read_cpu_times() -> Option<CpuTimes> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/stat").ok()?;
        return parse_cpu_line(content.lines().next()?);
    }
    #[cfg(not(target_os = "linux"))]
    None
}

/// Parse `cpu  user nice system idle iowait irq softirq steal guest guest_nice`.
/// guest/guest_nice are already included in user/nice and are not added again.
pub(super) fn parse_cpu_line(line: &str) -> Option<CpuTimes> {
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
        return None;
    }
    let values: Vec<u64> = fields
        .take(8)
        .map(|f| f.parse::<u64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if values.len() < 4 {
        return None;
    }
    let total: u64 = values.iter().sum();
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}
