// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::gateway::Gateway;
use crate::worker::ConnectionCounters;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) gateway: Gateway,
    pub(crate) connections: Arc<ConnectionCounters>,
}

pub fn app(gateway: Gateway, connections: Arc<ConnectionCounters>) -> Router {
    let state = AppState {
        gateway,
        connections,
    };
    Router::new()
        .route("/", get(|| async { "dockgate: container telemetry gateway" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/containers", get(http::list_containers_handler)) // GET /api/containers
        .route("/api/containers/{id}", get(http::inspect_container_handler)) // GET /api/containers/{id}
        .route("/api/monitors", get(http::monitors_handler)) // GET /api/monitors
        .route("/ws/containers/{id}/stats", get(ws::ws_container_stats)) // WS container metrics
        .route("/ws/containers/{id}/terminal", get(ws::ws_terminal)) // WS container shell
        .route("/ws/system/stats", get(ws::ws_system_stats)) // WS host metrics
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
