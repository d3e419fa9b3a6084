// Entry point the request layer calls: metric streams and terminals

use crate::error::Result;
use crate::models::{ContainerDetails, ContainerSummary};
use crate::monitor::{MonitorConfig, MonitoringRegistry, RegistryStatus, Subscription};
use crate::runtime::RuntimeClient;
use crate::terminal::{PendingSession, TerminalSession};
use std::sync::Arc;

#[derive(Clone)]
pub struct Gateway {
    runtime: Arc<dyn RuntimeClient>,
    registry: MonitoringRegistry,
    shell: Arc<Vec<String>>,
}

impl Gateway {
    pub fn new(runtime: Arc<dyn RuntimeClient>, config: MonitorConfig, shell: Vec<String>) -> Self {
        Self {
            registry: MonitoringRegistry::new(runtime.clone(), config),
            runtime,
            shell: Arc::new(shell),
        }
    }

    pub fn subscribe_container(&self, id: &str) -> Subscription {
        self.registry.subscribe_container(id)
    }

    pub fn subscribe_system(&self) -> Subscription {
        self.registry.subscribe_system()
    }

    /// Ends the stream; any queued emissions are discarded with it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        subscription.unsubscribe();
    }

    /// Open a shell in the container; the caller binds it to its connection.
    pub async fn open_terminal(&self, container_id: &str) -> Result<PendingSession> {
        TerminalSession::open(self.runtime.as_ref(), container_id, self.shell.to_vec()).await
    }

    pub fn close_terminal(&self, session: &mut TerminalSession) {
        session.close();
    }

    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.runtime.list_containers().await
    }

    pub async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        self.runtime.inspect(id).await
    }

    pub fn status(&self) -> RegistryStatus {
        self.registry.status()
    }

    pub fn registry(&self) -> &MonitoringRegistry {
        &self.registry
    }
}
