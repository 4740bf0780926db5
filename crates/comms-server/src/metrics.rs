//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Returns the handle that renders `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Comms sockets accepted (counter).
pub const COMMS_CONNECTIONS_TOTAL: &str = "comms_connections_total";
/// Comms sockets closed (counter).
pub const COMMS_DISCONNECTIONS_TOTAL: &str = "comms_disconnections_total";
/// Open comms sockets, authenticated or not (gauge).
pub const COMMS_CONNECTIONS_ACTIVE: &str = "comms_connections_active";
/// Registry members (gauge).
pub const COMMS_REGISTRY_MEMBERS: &str = "comms_registry_members";
/// Successful auth handshakes (counter, labels: method).
pub const COMMS_AUTH_SUCCESS_TOTAL: &str = "comms_auth_success_total";
/// Rejected auth handshakes (counter, labels: method).
pub const COMMS_AUTH_FAILURES_TOTAL: &str = "comms_auth_failures_total";
/// Frames handed to the socket writer (counter).
pub const COMMS_FRAMES_FLUSHED_TOTAL: &str = "comms_frames_flushed_total";
/// Flushes that failed and closed their connection (counter).
pub const COMMS_SEND_FAILURES_TOTAL: &str = "comms_send_failures_total";
/// Heartbeat rounds broadcast (counter).
pub const COMMS_HEARTBEATS_TOTAL: &str = "comms_heartbeats_total";
/// Inbound frames that were not JSON (counter).
pub const COMMS_MALFORMED_FRAMES_TOTAL: &str = "comms_malformed_frames_total";
/// Connection lifetime in seconds (histogram).
pub const COMMS_CONNECTION_DURATION_SECONDS: &str = "comms_connection_duration_seconds";
