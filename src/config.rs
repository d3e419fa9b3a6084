use crate::monitor::{MIN_SUBSCRIBER_BUFFER, MonitorConfig};
use crate::terminal::DEFAULT_SHELL;
use serde::Deserialize;
use tokio::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub docker: DockerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub sample_interval_ms: u64,
    /// Per-subscriber queue depth; a lagging subscriber misses emissions once it is full.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// How often to log app stats (active monitors, subscribers) at INFO level.
    pub stats_log_interval_secs: u64,
}

fn default_subscriber_buffer() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerminalConfig {
    /// Command run inside the container for each terminal.
    #[serde(default = "default_command")]
    pub command: Vec<String>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
        }
    }
}

fn default_command() -> Vec<String> {
    vec![DEFAULT_SHELL.to_string()]
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockerConfig {
    /// Unix socket path; platform defaults (DOCKER_HOST or /var/run/docker.sock) when unset.
    pub socket: Option<String>,
}

impl MonitoringConfig {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            subscriber_buffer: self.subscriber_buffer,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.subscriber_buffer >= MIN_SUBSCRIBER_BUFFER,
            "monitoring.subscriber_buffer must be >= {}, got {}",
            MIN_SUBSCRIBER_BUFFER,
            self.monitoring.subscriber_buffer
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.terminal.command.first().is_some_and(|c| !c.is_empty()),
            "terminal.command must name a program"
        );
        if let Some(socket) = &self.docker.socket {
            anyhow::ensure!(!socket.is_empty(), "docker.socket must be non-empty when set");
        }
        Ok(())
    }
}
