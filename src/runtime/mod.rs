// Container runtime capability consumed by monitors and terminal sessions

mod docker;
mod host;
mod linux;
mod stats;

pub use docker::DockerRuntime;
pub use host::HostSampler;

use crate::error::Result;
use crate::models::{ContainerDetails, ContainerSummary, RawStatsSample};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::pin::Pin;
use tokio::io::AsyncWrite;

/// Options for an interactive execution channel.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Allocate a pseudo-terminal (stdout and stderr arrive combined).
    pub tty: bool,
    pub cmd: Vec<String>,
}

/// Duplex byte channel to a process running inside a container.
pub struct ExecChannel {
    /// Process output, in arrival order. Ends when the process closes its output.
    pub output: BoxStream<'static, Result<Bytes>>,
    /// Process standard input. Shutting it down signals end-of-input.
    pub input: Pin<Box<dyn AsyncWrite + Send>>,
}

impl std::fmt::Debug for ExecChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecChannel").finish_non_exhaustive()
    }
}

/// Shared, read-only handle to the container engine.
///
/// Implementations must tolerate concurrent calls from every monitor and session.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>>;

    async fn inspect(&self, id: &str) -> Result<ContainerDetails>;

    /// One snapshot of a container's cumulative counters.
    async fn one_shot_stats(&self, id: &str) -> Result<RawStatsSample>;

    /// One snapshot of host-wide cumulative counters.
    async fn host_stats(&self) -> Result<RawStatsSample>;

    async fn open_exec(&self, id: &str, options: ExecOptions) -> Result<ExecChannel>;
}
