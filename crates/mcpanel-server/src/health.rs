//! `/health` endpoint.

use std::time::Instant;

use mcpanel_core::ServerStatus;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the panel is running.
    pub status: String,
    /// Seconds since the panel started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Status of the managed process.
    pub server_status: ServerStatus,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    server_status: ServerStatus,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        server_status,
    }
}
