// Gateway error taxonomy

/// Failures surfaced by monitors, terminal sessions and the runtime client.
///
/// Degenerate counter deltas are never errors; they are absorbed by
/// [`crate::metrics::derive`] and reported as 0.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The container identifier no longer resolves.
    #[error("container not found: {0}")]
    NotFound(String),
    /// The engine connection itself failed.
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),
    /// One half of a terminal relay failed.
    #[error("terminal relay broken: {0}")]
    RelayBroken(String),
    /// The stream was torn down without a more specific cause.
    #[error("stream closed")]
    Closed,
}

impl GatewayError {
    /// Short machine-readable tag used in WebSocket error frames.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NotFound(_) => "notFound",
            GatewayError::RuntimeUnavailable(_) => "runtimeUnavailable",
            GatewayError::RelayBroken(_) => "relayBroken",
            GatewayError::Closed => "closed",
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
