// GET handlers: version, containers, monitors

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::error::GatewayError;
use crate::version::{NAME, VERSION};

/// Maps gateway errors onto HTTP status codes.
pub(super) struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::RuntimeUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::RelayBroken(_) | GatewayError::Closed => StatusCode::BAD_GATEWAY,
        };
        let body = serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/containers — all containers known to the runtime, any state.
pub(super) async fn list_containers_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let containers = state.gateway.list_containers().await?;
    Ok(Json(containers))
}

pub(super) async fn inspect_container_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state.gateway.inspect_container(&id).await?;
    Ok(Json(details))
}

/// GET /api/monitors — active monitors and subscriber count.
pub(super) async fn monitors_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.gateway.status())
}
