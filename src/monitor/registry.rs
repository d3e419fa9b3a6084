// Process-wide directory of active monitors

use super::{Monitor, MonitorTarget, Removal, SubscriberId, Subscription};
use crate::runtime::RuntimeClient;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::time::Duration;

/// Shortest poll period a registry accepts; `tokio::time::interval` rejects zero.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// Smallest per-subscriber queue: one emission plus the reserved error slot.
pub const MIN_SUBSCRIBER_BUFFER: usize = 2;

/// Polling and fan-out settings shared by every monitor.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub sample_interval: Duration,
    /// Per-subscriber queue depth; one slot is reserved for the terminal error.
    pub subscriber_buffer: usize,
}

/// Snapshot of the registry for logging and `/api/monitors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    pub container_monitors: usize,
    pub system_monitor_running: bool,
    pub subscribers: usize,
}

#[derive(Default)]
struct Monitors {
    containers: HashMap<String, Arc<Monitor>>,
    system: Option<Arc<Monitor>>,
}

impl Monitors {
    fn get(&self, target: &MonitorTarget) -> Option<&Arc<Monitor>> {
        match target {
            MonitorTarget::Container(id) => self.containers.get(id),
            MonitorTarget::System => self.system.as_ref(),
        }
    }

    fn insert(&mut self, monitor: Arc<Monitor>) {
        match monitor.target().clone() {
            MonitorTarget::Container(id) => {
                self.containers.insert(id, monitor);
            }
            MonitorTarget::System => self.system = Some(monitor),
        }
    }

    fn remove(&mut self, target: &MonitorTarget) {
        match target {
            MonitorTarget::Container(id) => {
                self.containers.remove(id);
            }
            MonitorTarget::System => self.system = None,
        }
    }
}

pub(crate) struct RegistryShared {
    runtime: Arc<dyn RuntimeClient>,
    config: MonitorConfig,
    monitors: Mutex<Monitors>,
}

impl RegistryShared {
    fn lock(&self) -> MutexGuard<'_, Monitors> {
        self.monitors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn unsubscribe(&self, target: &MonitorTarget, id: SubscriberId) {
        let mut monitors = self.lock();
        let Some(monitor) = monitors.get(target) else {
            return;
        };
        if monitor.remove_subscriber(id) == Removal::LastGone {
            monitors.remove(target);
        }
    }

    /// Remove a failed monitor, unless a newer one already took its place.
    pub(crate) fn evict(&self, monitor: &Arc<Monitor>) {
        let mut monitors = self.lock();
        if monitors
            .get(monitor.target())
            .is_some_and(|current| Arc::ptr_eq(current, monitor))
        {
            monitors.remove(monitor.target());
        }
    }
}

/// Single authority over "does a monitor for X already exist".
///
/// Create-if-absent and remove-on-empty both happen under the registry lock, so two
/// callers racing on the same container share one poll loop and a later subscribe
/// never lands on a stopped monitor. The registry lock is held together with a
/// monitor's own lock only for that lookup step; poll loops take just their own.
#[derive(Clone)]
pub struct MonitoringRegistry {
    shared: Arc<RegistryShared>,
}

impl MonitoringRegistry {
    /// Out-of-range settings are raised to their minimums, so direct construction
    /// cannot produce a monitor whose poll loop refuses to start.
    pub fn new(runtime: Arc<dyn RuntimeClient>, config: MonitorConfig) -> Self {
        let config = MonitorConfig {
            sample_interval: config.sample_interval.max(MIN_SAMPLE_INTERVAL),
            subscriber_buffer: config.subscriber_buffer.max(MIN_SUBSCRIBER_BUFFER),
        };
        Self {
            shared: Arc::new(RegistryShared {
                runtime,
                config,
                monitors: Mutex::new(Monitors::default()),
            }),
        }
    }

    /// Subscribe to one container's metrics. Must be called within a Tokio runtime.
    pub fn subscribe_container(&self, id: &str) -> Subscription {
        self.subscribe(MonitorTarget::Container(id.to_string()))
    }

    pub fn unsubscribe_container(&self, id: &str, handle: SubscriberId) {
        self.shared
            .unsubscribe(&MonitorTarget::Container(id.to_string()), handle);
    }

    /// Subscribe to host-wide metrics. Must be called within a Tokio runtime.
    pub fn subscribe_system(&self) -> Subscription {
        self.subscribe(MonitorTarget::System)
    }

    pub fn unsubscribe_system(&self, handle: SubscriberId) {
        self.shared.unsubscribe(&MonitorTarget::System, handle);
    }

    fn subscribe(&self, target: MonitorTarget) -> Subscription {
        let id = SubscriberId::next();
        let (tx, rx) = mpsc::channel(self.shared.config.subscriber_buffer);
        {
            let mut monitors = self.shared.lock();
            let tx = match monitors.get(&target) {
                Some(existing) => match existing.add_subscriber(id, tx) {
                    Ok(()) => None,
                    Err(tx) => Some(tx),
                },
                None => Some(tx),
            };
            if let Some(tx) = tx {
                let monitor = Monitor::new(
                    target.clone(),
                    self.shared.runtime.clone(),
                    self.shared.config.sample_interval,
                    Arc::downgrade(&self.shared),
                );
                // A fresh monitor has not stopped, so this cannot hand the sender back.
                let _ = monitor.add_subscriber(id, tx);
                monitors.insert(monitor);
            }
        }
        tracing::debug!(target_entity = %target, subscriber = %id, "subscribed");
        Subscription::new(id, target, rx, Arc::downgrade(&self.shared))
    }

    pub fn status(&self) -> RegistryStatus {
        let monitors = self.shared.lock();
        let subscribers = monitors
            .containers
            .values()
            .chain(monitors.system.iter())
            .map(|m| m.subscriber_count())
            .sum();
        RegistryStatus {
            container_monitors: monitors.containers.len(),
            system_monitor_running: monitors.system.is_some(),
            subscribers,
        }
    }
}
