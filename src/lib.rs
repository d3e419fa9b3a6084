// Container telemetry and interactive terminal gateway

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod routes;
pub mod runtime;
pub mod terminal;
pub mod version;
pub mod worker;

pub use error::{GatewayError, Result};
pub use gateway::Gateway;

/// Current unix time in milliseconds; 0 if the clock is before the epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
