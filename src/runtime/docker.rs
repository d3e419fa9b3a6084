// Docker Engine runtime client via bollard

use super::stats;
use super::{ExecChannel, ExecOptions, HostSampler, RuntimeClient};
use crate::error::{GatewayError, Result};
use crate::models::{ContainerDetails, ContainerState, ContainerSummary, RawStatsSample};
use async_trait::async_trait;
use bollard::Docker;
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::query_parameters::{InspectContainerOptions, ListContainersOptions, StatsOptions};
use bollard::models::ExecConfig;
use futures_util::StreamExt;
use tracing::instrument;

pub struct DockerRuntime {
    docker: Docker,
    host: HostSampler,
}

impl DockerRuntime {
    /// Connect to the engine over `socket`, or the platform default when `None`.
    pub fn connect(socket: Option<&str>) -> anyhow::Result<Self> {
        let docker = match socket {
            Some(path) => Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION)?,
            None => Docker::connect_with_local_defaults()?,
        };
        Ok(Self {
            docker,
            host: HostSampler::new(),
        })
    }
}

/// 404 from the engine means the container is gone; anything else is an engine failure.
fn map_err(id: &str, e: bollard::errors::Error) -> GatewayError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => GatewayError::NotFound(id.to_string()),
        other => GatewayError::RuntimeUnavailable(other.to_string()),
    }
}

fn trim_name(name: &str) -> String {
    name.trim_start_matches('/').to_string()
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    #[instrument(skip(self), fields(runtime = "docker", operation = "list_containers"))]
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| GatewayError::RuntimeUnavailable(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let id = c.id.unwrap_or_default();
                let name = c
                    .names
                    .as_ref()
                    .and_then(|n| n.first())
                    .map(|n| trim_name(n))
                    .unwrap_or_else(|| id.clone());
                ContainerSummary {
                    name,
                    image: c.image.unwrap_or_default(),
                    state: c
                        .state
                        .as_ref()
                        .map(|s| ContainerState::from_docker(&s.to_string()))
                        .unwrap_or(ContainerState::Unknown),
                    status: c.status.unwrap_or_default(),
                    created: c.created.unwrap_or(0),
                    id,
                }
            })
            .collect())
    }

    #[instrument(skip(self), fields(runtime = "docker", operation = "inspect"))]
    async fn inspect(&self, id: &str) -> Result<ContainerDetails> {
        let c = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_err(id, e))?;
        let state = c.state.as_ref();
        Ok(ContainerDetails {
            id: c.id.clone().unwrap_or_else(|| id.to_string()),
            name: c.name.as_deref().map(trim_name).unwrap_or_default(),
            image: c
                .config
                .as_ref()
                .and_then(|cfg| cfg.image.clone())
                .or_else(|| c.image.clone())
                .unwrap_or_default(),
            state: state
                .and_then(|s| s.status.as_ref())
                .map(|s| ContainerState::from_docker(&s.to_string()))
                .unwrap_or(ContainerState::Unknown),
            running: state.and_then(|s| s.running).unwrap_or(false),
            pid: state.and_then(|s| s.pid).unwrap_or(0),
            created: c.created.as_ref().map(|t| t.to_string()).unwrap_or_default(),
            started_at: state
                .and_then(|s| s.started_at.as_ref())
                .map(|t| t.to_string())
                .unwrap_or_default(),
            restart_count: c.restart_count.unwrap_or(0),
        })
    }

    #[instrument(skip(self), fields(runtime = "docker", operation = "one_shot_stats"))]
    async fn one_shot_stats(&self, id: &str) -> Result<RawStatsSample> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
            ..Default::default()
        };
        let mut stream = self.docker.stats(id, Some(options));
        let response = match stream.next().await {
            Some(Ok(s)) => s,
            Some(Err(e)) => return Err(map_err(id, e)),
            None => {
                return Err(GatewayError::RuntimeUnavailable(format!(
                    "stats stream for {} ended without a sample",
                    id
                )));
            }
        };
        stats::to_raw_sample(&response, crate::now_millis()).ok_or_else(|| {
            GatewayError::RuntimeUnavailable(format!("stats for {} carried no cpu counters", id))
        })
    }

    async fn host_stats(&self) -> Result<RawStatsSample> {
        self.host.sample().await
    }

    #[instrument(skip(self, options), fields(runtime = "docker", operation = "open_exec"))]
    async fn open_exec(&self, id: &str, options: ExecOptions) -> Result<ExecChannel> {
        let config = ExecConfig {
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(options.tty),
            cmd: Some(options.cmd),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(id, config)
            .await
            .map_err(|e| map_err(id, e))?;

        let start = StartExecOptions {
            detach: false,
            tty: options.tty,
            ..Default::default()
        };
        match self
            .docker
            .start_exec(&exec.id, Some(start))
            .await
            .map_err(|e| map_err(id, e))?
        {
            StartExecResults::Attached { output, input } => Ok(ExecChannel {
                output: output
                    .map(|chunk| {
                        chunk
                            .map(|log| log.into_bytes())
                            .map_err(|e| GatewayError::RelayBroken(e.to_string()))
                    })
                    .boxed(),
                input,
            }),
            StartExecResults::Detached => Err(GatewayError::RuntimeUnavailable(format!(
                "exec {} in {} started detached",
                exec.id, id
            ))),
        }
    }
}
