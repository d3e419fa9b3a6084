// Caller-owned handle on a metrics stream

use super::registry::RegistryShared;
use super::{MetricsEvent, MonitorTarget, SubscriberId};
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Lazy, cancelable sequence of derived metrics for one entity.
///
/// Dropping the subscription unsubscribes it; the last subscriber of a monitor
/// going away stops that monitor's polling.
pub struct Subscription {
    id: SubscriberId,
    target: MonitorTarget,
    rx: mpsc::Receiver<MetricsEvent>,
    registry: Weak<RegistryShared>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        target: MonitorTarget,
        rx: mpsc::Receiver<MetricsEvent>,
        registry: Weak<RegistryShared>,
    ) -> Self {
        Self {
            id,
            target,
            rx,
            registry,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn target(&self) -> &MonitorTarget {
        &self.target
    }

    /// Next emission; `None` once the stream has ended (after a terminal error).
    pub async fn recv(&mut self) -> Option<MetricsEvent> {
        self.rx.recv().await
    }

    /// Same as dropping the subscription; the Drop impl does the unsubscribe.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Stream for Subscription {
    type Item = MetricsEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(&self.target, self.id);
        }
        tracing::debug!(target_entity = %self.target, subscriber = %self.id, "unsubscribed");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
