//! `/health` endpoint body.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server runs.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Authenticated connections in the registry.
    pub connections: usize,
    /// Whether the comms endpoint is mounted.
    pub comms_enabled: bool,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, comms_enabled: bool) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        comms_enabled,
    }
}
