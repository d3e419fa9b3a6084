// Shared test helpers: scripted runtime client and loopback terminal ends
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use dockgate::error::{GatewayError, Result};
use dockgate::models::{
    ContainerDetails, ContainerState, ContainerSummary, InterfaceCounters, RawStatsSample,
};
use dockgate::monitor::MonitorConfig;
use dockgate::runtime::{ExecChannel, ExecOptions, RuntimeClient};
use futures_util::{Sink, Stream, StreamExt, sink, stream};
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::Duration;

pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

pub fn monitor_config() -> MonitorConfig {
    MonitorConfig {
        sample_interval: SAMPLE_INTERVAL,
        subscriber_buffer: 8,
    }
}

pub fn sample(cpu: u64, system: u64, online: u32) -> RawStatsSample {
    RawStatsSample {
        cpu_usage: cpu,
        system_cpu_usage: system,
        online_cpus: online,
        ..Default::default()
    }
}

/// Sample for the n-th call (1-based) once a script runs out.
/// Every pair of consecutive samples derives to 10% CPU; `read_at` is `n`.
pub fn generated(n: usize) -> RawStatsSample {
    let n = n as u64;
    let mut s = sample(50 * n, 1000 * n, 2);
    s.memory_used_bytes = 512;
    s.memory_limit_bytes = 1024;
    s.networks.insert(
        "eth0".to_string(),
        InterfaceCounters {
            rx_bytes: 100 * n,
            tx_bytes: 10 * n,
        },
    );
    s.read_at = n;
    s
}

/// Runtime double: scripted stats per container (then generated), call counters, one exec slot.
#[derive(Default)]
pub struct MockRuntime {
    scripts: Mutex<HashMap<String, VecDeque<Result<RawStatsSample>>>>,
    stats_calls: Mutex<HashMap<String, usize>>,
    host_script: Mutex<VecDeque<Result<RawStatsSample>>>,
    host_calls: AtomicUsize,
    exec: Mutex<Option<ExecChannel>>,
    exec_requests: Mutex<Vec<(String, ExecOptions)>>,
    containers: Vec<ContainerSummary>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containers(containers: Vec<ContainerSummary>) -> Self {
        Self {
            containers,
            ..Default::default()
        }
    }

    pub fn script(&self, id: &str, samples: Vec<Result<RawStatsSample>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), samples.into());
    }

    pub fn script_host(&self, samples: Vec<Result<RawStatsSample>>) {
        *self.host_script.lock().unwrap() = samples.into();
    }

    pub fn stats_calls(&self, id: &str) -> usize {
        self.stats_calls
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn host_calls(&self) -> usize {
        self.host_calls.load(Ordering::SeqCst)
    }

    pub fn set_exec(&self, exec: ExecChannel) {
        *self.exec.lock().unwrap() = Some(exec);
    }

    pub fn exec_requests(&self) -> Vec<(String, ExecOptions)> {
        self.exec_requests.lock().unwrap().clone()
    }
}

pub fn summary(id: &str, name: &str) -> ContainerSummary {
    ContainerSummary {
        id: id.to_string(),
        name: name.to_string(),
        image: "nginx:latest".to_string(),
        state: ContainerState::Running,
        status: "Up 2 minutes".to_string(),
        created: 1_700_000_000,
    }
}

#[async_trait]
impl RuntimeClient for MockRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        Ok(self.containers.clone())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerDetails> {
        let c = self
            .containers
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        Ok(ContainerDetails {
            id: c.id.clone(),
            name: c.name.clone(),
            image: c.image.clone(),
            state: c.state,
            running: c.state == ContainerState::Running,
            pid: 42,
            created: String::new(),
            started_at: String::new(),
            restart_count: 0,
        })
    }

    async fn one_shot_stats(&self, id: &str) -> Result<RawStatsSample> {
        let n = {
            let mut calls = self.stats_calls.lock().unwrap();
            let n = calls.entry(id.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(|q| q.pop_front());
        scripted.unwrap_or_else(|| Ok(generated(n)))
    }

    async fn host_stats(&self) -> Result<RawStatsSample> {
        let n = self.host_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let scripted = self.host_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(generated(n)))
    }

    async fn open_exec(&self, id: &str, options: ExecOptions) -> Result<ExecChannel> {
        self.exec_requests
            .lock()
            .unwrap()
            .push((id.to_string(), options));
        self.exec
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }
}

/// Test-side ends of an exec channel: feed shell output, read shell stdin.
pub struct ShellEnd {
    pub output_tx: mpsc::Sender<Result<Bytes>>,
    pub stdin: DuplexStream,
}

pub fn loopback_exec() -> (ExecChannel, ShellEnd) {
    let (output_tx, output_rx) = mpsc::channel::<Result<Bytes>>(16);
    let (stdin_writer, stdin) = tokio::io::duplex(1024);
    let output = stream::unfold(output_rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed();
    let exec = ExecChannel {
        output,
        input: Box::pin(stdin_writer),
    };
    (exec, ShellEnd { output_tx, stdin })
}

pub type ClientStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send>>;
pub type ClientSink = Pin<Box<dyn Sink<Bytes, Error = &'static str> + Send>>;

/// Test-side ends of a client connection: type keystrokes, read what the client receives.
pub struct ClientEnd {
    pub input_tx: mpsc::Sender<std::result::Result<Bytes, std::io::Error>>,
    pub output_rx: mpsc::Receiver<Bytes>,
}

pub fn loopback_client() -> (ClientStream, ClientSink, ClientEnd) {
    let (input_tx, input_rx) = mpsc::channel(16);
    let (output_tx, output_rx) = mpsc::channel::<Bytes>(16);
    let client_rx: ClientStream = Box::pin(stream::unfold(input_rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }));
    let client_tx: ClientSink = Box::pin(sink::unfold(output_tx, |tx, chunk: Bytes| async move {
        tx.send(chunk).await.map_err(|_| "client closed")?;
        Ok::<_, &'static str>(tx)
    }));
    (client_rx, client_tx, ClientEnd { input_tx, output_rx })
}
