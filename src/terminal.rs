// Full-duplex byte relay between a container exec channel and one client connection

use crate::error::{GatewayError, Result};
use crate::runtime::{ExecChannel, ExecOptions, RuntimeClient};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

/// Shell started when the caller does not configure one.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Longest a single write to the client may take before the relay is torn down.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

fn next_session_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// An exec channel that is open but not yet bound to a client connection.
#[derive(Debug)]
pub struct PendingSession {
    container_id: String,
    exec: ExecChannel,
    send_timeout: Duration,
}

impl PendingSession {
    pub fn new(container_id: &str, exec: ExecChannel) -> Self {
        Self {
            container_id: container_id.to_string(),
            exec,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Deadline for each write to the client; a stalled client breaks the relay.
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Start relaying. Must be called within a Tokio runtime.
    pub fn bind<S, K, E>(self, client_rx: S, client_tx: K) -> TerminalSession
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
        E: Display + Send + 'static,
        K: Sink<Bytes> + Send + Unpin + 'static,
        K::Error: Display + Send,
    {
        let PendingSession {
            container_id,
            exec,
            send_timeout,
        } = self;
        let id = next_session_id();
        let ExecChannel { output, input } = exec;
        let (close_tx, close_rx) = oneshot::channel();
        let (output_done_tx, output_done_rx) = oneshot::channel();
        let (input_failed_tx, input_failed_rx) = oneshot::channel();

        let input_task = tokio::spawn(pump_input(
            id,
            client_rx,
            input,
            close_rx,
            output_done_rx,
            input_failed_tx,
        ));
        let output_task = tokio::spawn(pump_output(
            id,
            output,
            client_tx,
            send_timeout,
            output_done_tx,
            input_failed_rx,
        ));
        tracing::info!(session = id, container_id = %container_id, "terminal session opened");

        TerminalSession {
            id,
            container_id,
            close_tx: Some(close_tx),
            input_task,
            output_task,
        }
    }
}

/// One live terminal: two forwarding tasks, one per direction.
///
/// Client end-of-stream (or [`TerminalSession::close`]) shuts down the shell's
/// stdin without killing it; the shell's end-of-output closes the client sink.
/// Nothing is retried: a broken half tears down the other one and is reported.
pub struct TerminalSession {
    id: u64,
    container_id: String,
    close_tx: Option<oneshot::Sender<()>>,
    input_task: JoinHandle<Result<()>>,
    output_task: JoinHandle<Result<()>>,
}

impl TerminalSession {
    /// Start an interactive shell (pseudo-terminal, combined output) in the container.
    /// The returned channel is bound to a client with [`PendingSession::bind`].
    pub async fn open(
        runtime: &dyn RuntimeClient,
        container_id: &str,
        cmd: Vec<String>,
    ) -> Result<PendingSession> {
        let exec = runtime
            .open_exec(container_id, ExecOptions { tty: true, cmd })
            .await?;
        Ok(PendingSession::new(container_id, exec))
    }

    /// Relay between an already-open exec channel and the client, with the default
    /// send deadline. Must be called within a Tokio runtime.
    pub fn bind<S, K, E>(container_id: &str, exec: ExecChannel, client_rx: S, client_tx: K) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
        E: Display + Send + 'static,
        K: Sink<Bytes> + Send + Unpin + 'static,
        K::Error: Display + Send,
    {
        PendingSession::new(container_id, exec).bind(client_rx, client_tx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Signal end-of-input to the shell. The output side drains until the shell exits.
    pub fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for both directions to finish; reports the first relay failure.
    pub async fn wait(self) -> Result<()> {
        let TerminalSession {
            id,
            container_id,
            close_tx,
            input_task,
            output_task,
        } = self;
        // Dropping the close sender would read as close(); keep it until both halves finish.
        let _close_tx = close_tx;
        let output = output_task.await.unwrap_or_else(|e| {
            Err(GatewayError::RelayBroken(format!("output task: {}", e)))
        });
        let input = input_task.await.unwrap_or_else(|e| {
            Err(GatewayError::RelayBroken(format!("input task: {}", e)))
        });
        let result = output.and(input);
        match &result {
            Ok(()) => tracing::info!(
                session = id,
                container_id = %container_id,
                "terminal session closed"
            ),
            Err(e) => tracing::warn!(
                session = id,
                container_id = %container_id,
                error = %e,
                "terminal session torn down"
            ),
        }
        result
    }
}

/// Client -> shell stdin, verbatim and in order. A failure here stops the output side too.
async fn pump_input<S, E>(
    session: u64,
    mut client_rx: S,
    mut input: Pin<Box<dyn AsyncWrite + Send>>,
    mut close_rx: oneshot::Receiver<()>,
    mut output_done_rx: oneshot::Receiver<()>,
    input_failed_tx: oneshot::Sender<()>,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    let result = loop {
        tokio::select! {
            _ = &mut close_rx => break Ok(()),
            _ = &mut output_done_rx => {
                tracing::debug!(session, "shell output ended; input relay stopping");
                break Ok(());
            }
            next = client_rx.next() => match next {
                Some(Ok(chunk)) => {
                    if let Err(e) = write_chunk(&mut input, &chunk).await {
                        break Err(GatewayError::RelayBroken(format!("shell stdin: {}", e)));
                    }
                }
                Some(Err(e)) => {
                    break Err(GatewayError::RelayBroken(format!("client read: {}", e)));
                }
                None => break Ok(()),
            }
        }
    };
    if result.is_err() {
        let _ = input_failed_tx.send(());
    }
    if let Err(e) = input.shutdown().await {
        tracing::debug!(session, error = %e, "shell stdin shutdown failed");
    }
    tracing::debug!(session, "shell stdin closed");
    result
}

async fn write_chunk(
    input: &mut Pin<Box<dyn AsyncWrite + Send>>,
    chunk: &[u8],
) -> std::io::Result<()> {
    input.write_all(chunk).await?;
    input.flush().await
}

/// Shell output -> client, one chunk per send. Closes the client sink when done.
async fn pump_output<K>(
    session: u64,
    mut output: BoxStream<'static, Result<Bytes>>,
    mut client_tx: K,
    send_timeout: Duration,
    output_done_tx: oneshot::Sender<()>,
    mut input_failed_rx: oneshot::Receiver<()>,
) -> Result<()>
where
    K: Sink<Bytes> + Send + Unpin + 'static,
    K::Error: Display + Send,
{
    // The input side drops its sender on a clean finish; only a sent signal stops us.
    let mut input_settled = false;
    let result = loop {
        tokio::select! {
            failed = &mut input_failed_rx, if !input_settled => {
                input_settled = true;
                if failed.is_ok() {
                    tracing::debug!(session, "input relay broke; output relay stopping");
                    break Ok(());
                }
            }
            next = output.next() => match next {
                Some(Ok(chunk)) => match timeout(send_timeout, client_tx.send(chunk)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        break Err(GatewayError::RelayBroken(format!("client write: {}", e)));
                    }
                    Err(_) => {
                        break Err(GatewayError::RelayBroken(format!(
                            "client write timed out after {:?}",
                            send_timeout
                        )));
                    }
                },
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            }
        }
    };
    let _ = output_done_tx.send(());
    match timeout(send_timeout, client_tx.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(session, error = %e, "client close failed"),
        Err(_) => tracing::debug!(session, "client close timed out"),
    }
    tracing::debug!(session, "shell output closed");
    result
}
