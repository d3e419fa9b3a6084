// Background app-stats reporter: periodically logs registry and connection counts.

use crate::gateway::Gateway;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Live WebSocket connection counts, shared between the routes and the reporter.
#[derive(Debug, Default)]
pub struct ConnectionCounters {
    pub stats_clients: AtomicUsize,
    pub terminal_sessions: AtomicUsize,
}

/// Increments a counter on creation and decrements it on drop.
pub struct ConnectionGuard {
    counter: Arc<ConnectionCounters>,
    kind: ConnectionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Stats,
    Terminal,
}

impl ConnectionCounters {
    fn slot(&self, kind: ConnectionKind) -> &AtomicUsize {
        match kind {
            ConnectionKind::Stats => &self.stats_clients,
            ConnectionKind::Terminal => &self.terminal_sessions,
        }
    }

    pub fn track(self: &Arc<Self>, kind: ConnectionKind) -> ConnectionGuard {
        self.slot(kind).fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            counter: self.clone(),
            kind,
        }
    }

    pub fn get(&self, kind: ConnectionKind) -> usize {
        self.slot(kind).load(Ordering::Relaxed)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.slot(self.kind).fetch_sub(1, Ordering::Relaxed);
    }
}

pub struct ReporterDeps {
    pub gateway: Gateway,
    pub connections: Arc<ConnectionCounters>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

pub fn spawn_reporter(
    deps: ReporterDeps,
    stats_log_interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    let ReporterDeps {
        gateway,
        connections,
        mut shutdown_rx,
    } = deps;

    tokio::spawn(async move {
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stats_log_tick.tick() => {
                    let status = gateway.status();
                    tracing::info!(
                        container_monitors = status.container_monitors,
                        system_monitor_running = status.system_monitor_running,
                        subscribers = status.subscribers,
                        ws_stats_clients = connections.get(ConnectionKind::Stats),
                        terminal_sessions = connections.get(ConnectionKind::Terminal),
                        "app stats"
                    );
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Reporter shutting down");
                    break;
                }
            }
        }
    })
}
