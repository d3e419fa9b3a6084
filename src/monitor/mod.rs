// Shared-polling monitors: one poll loop per entity, fanned out to every subscriber.
// A container monitor and the system monitor are the same machine with a different target.

mod registry;
mod subscription;

pub use registry::{
    MIN_SAMPLE_INTERVAL, MIN_SUBSCRIBER_BUFFER, MonitorConfig, MonitoringRegistry, RegistryStatus,
};
pub use subscription::Subscription;

use crate::error::{GatewayError, Result};
use crate::metrics;
use crate::models::{DerivedMetrics, RawStatsSample};
use crate::runtime::RuntimeClient;
use registry::RegistryShared;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// One item of a metrics stream. An `Err` is terminal; the stream ends right after it.
pub type MetricsEvent = Result<DerivedMetrics>;

/// Opaque identity of one caller's interest in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The entity a monitor samples.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MonitorTarget {
    Container(String),
    System,
}

impl MonitorTarget {
    async fn sample(&self, runtime: &dyn RuntimeClient) -> Result<RawStatsSample> {
        match self {
            MonitorTarget::Container(id) => runtime.one_shot_stats(id).await,
            MonitorTarget::System => runtime.host_stats().await,
        }
    }
}

impl std::fmt::Display for MonitorTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorTarget::Container(id) => write!(f, "container:{}", id),
            MonitorTarget::System => f.write_str("system"),
        }
    }
}

/// Outcome of removing a subscriber from a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// The handle was not registered (already removed, or the monitor failed).
    Unknown,
    Removed,
    /// The last subscriber left; the monitor has stopped.
    LastGone,
}

struct MonitorState {
    subscribers: HashMap<SubscriberId, mpsc::Sender<MetricsEvent>>,
    baseline: Option<RawStatsSample>,
    task: Option<JoinHandle<()>>,
    /// Set once the monitor stops (last unsubscribe or poll failure); never cleared.
    stopped: bool,
}

/// Polling task plus subscriber set for one entity.
pub(crate) struct Monitor {
    target: MonitorTarget,
    runtime: Arc<dyn RuntimeClient>,
    sample_interval: Duration,
    registry: Weak<RegistryShared>,
    state: Mutex<MonitorState>,
}

impl Monitor {
    pub(crate) fn new(
        target: MonitorTarget,
        runtime: Arc<dyn RuntimeClient>,
        sample_interval: Duration,
        registry: Weak<RegistryShared>,
    ) -> Arc<Self> {
        Arc::new(Self {
            target,
            runtime,
            sample_interval,
            registry,
            state: Mutex::new(MonitorState {
                subscribers: HashMap::new(),
                baseline: None,
                task: None,
                stopped: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn target(&self) -> &MonitorTarget {
        &self.target
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Register a subscriber; the first one starts the poll loop.
    /// Hands the sender back if the monitor has already stopped.
    /// Must be called within a Tokio runtime.
    pub(crate) fn add_subscriber(
        self: &Arc<Self>,
        id: SubscriberId,
        tx: mpsc::Sender<MetricsEvent>,
    ) -> std::result::Result<(), mpsc::Sender<MetricsEvent>> {
        let mut state = self.lock();
        if state.stopped {
            return Err(tx);
        }
        state.subscribers.insert(id, tx);
        if state.task.is_none() {
            tracing::info!(target_entity = %self.target, "monitor started");
            state.task = Some(tokio::spawn(self.clone().poll_loop()));
        }
        Ok(())
    }

    /// Drop a subscriber; the last one stops polling and discards the baseline.
    pub(crate) fn remove_subscriber(&self, id: SubscriberId) -> Removal {
        let mut state = self.lock();
        if state.subscribers.remove(&id).is_none() {
            return Removal::Unknown;
        }
        if !state.subscribers.is_empty() {
            return Removal::Removed;
        }
        state.stopped = true;
        state.baseline = None;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        tracing::info!(target_entity = %self.target, "monitor stopped: no subscribers left");
        Removal::LastGone
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut tick = interval(self.sample_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            match self.target.sample(self.runtime.as_ref()).await {
                Ok(sample) => {
                    if !self.emit(sample) {
                        break;
                    }
                }
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }
        }
    }

    /// Derive against the baseline and deliver to the current subscribers.
    /// Returns false once the monitor has stopped.
    fn emit(&self, sample: RawStatsSample) -> bool {
        let mut state = self.lock();
        if state.stopped {
            return false;
        }
        if let Some(prev) = state.baseline.take() {
            let derived = metrics::derive(&prev, &sample);
            for (id, tx) in &state.subscribers {
                // One slot stays reserved for a terminal error.
                if tx.capacity() <= 1 {
                    tracing::warn!(
                        target_entity = %self.target,
                        subscriber = %id,
                        "subscriber lagging, emission skipped"
                    );
                    continue;
                }
                match tx.try_send(Ok(derived.clone())) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            target_entity = %self.target,
                            subscriber = %id,
                            "subscriber lagging, emission skipped"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(subscriber = %id, "subscriber receiver already dropped");
                    }
                }
            }
            tracing::debug!(
                target_entity = %self.target,
                subscribers = state.subscribers.len(),
                cpu_percent = derived.cpu_percent,
                "metrics emitted"
            );
        }
        state.baseline = Some(sample);
        true
    }

    /// Terminal failure: stop, leave the registry, then tell every subscriber once.
    fn fail(self: &Arc<Self>, error: GatewayError) {
        let subscribers = {
            let mut state = self.lock();
            state.stopped = true;
            state.baseline = None;
            state.task = None;
            std::mem::take(&mut state.subscribers)
        };
        tracing::warn!(
            target_entity = %self.target,
            error = %error,
            subscribers = subscribers.len(),
            "monitor failed; closing streams"
        );
        if let Some(registry) = self.registry.upgrade() {
            registry.evict(self);
        }
        for (_, tx) in subscribers {
            let _ = tx.try_send(Err(error.clone()));
        }
    }
}
