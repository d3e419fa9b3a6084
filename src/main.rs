use anyhow::Result;
use dockgate::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let docker = runtime::DockerRuntime::connect(app_config.docker.socket.as_deref())?;
    let gateway = Gateway::new(
        Arc::new(docker),
        app_config.monitoring.monitor_config(),
        app_config.terminal.command.clone(),
    );
    let connections = Arc::new(worker::ConnectionCounters::default());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let reporter_handle = worker::spawn_reporter(
        worker::ReporterDeps {
            gateway: gateway.clone(),
            connections: connections.clone(),
            shutdown_rx,
        },
        app_config.monitoring.stats_log_interval_secs,
    );

    let app = routes::app(gateway, connections);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        version = version::VERSION,
        sample_interval_ms = app_config.monitoring.sample_interval_ms,
        "Listening on http://{}",
        addr
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = reporter_handle.await;
        }
    }

    Ok(())
}
