//! Server configuration.

use std::time::Duration;

use comms_settings::CommsSettings;
use serde::{Deserialize, Serialize};

use crate::service::CommsConfig;

/// Configuration for the comms server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Base path; the endpoint is mounted at `<base>/comms`.
    pub endpoint_base_path: String,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Hold new connections until they authenticate.
    pub authentication_required: bool,
    /// Keep-alive window in milliseconds.
    pub keep_alive_ms: u64,
    /// Skip mounting the endpoint.
    pub disabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 1880,
            endpoint_base_path: "/".into(),
            max_message_size: 1024 * 1024,
            authentication_required: false,
            keep_alive_ms: 15_000,
            disabled: false,
        }
    }
}

impl ServerConfig {
    /// Project loaded settings onto server config.
    pub fn from_settings(settings: &CommsSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            endpoint_base_path: settings.server.endpoint_base_path.clone(),
            max_message_size: settings.server.max_message_size,
            authentication_required: settings.comms.authentication_required,
            keep_alive_ms: settings.comms.keep_alive_ms,
            disabled: settings.comms.disabled,
        }
    }

    /// Full path of the comms endpoint.
    pub fn comms_path(&self) -> String {
        comms_path(&self.endpoint_base_path)
    }

    /// Keep-alive window.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// The subset the service needs.
    pub fn comms_config(&self) -> CommsConfig {
        CommsConfig {
            authentication_required: self.authentication_required,
            keep_alive: self.keep_alive(),
            disabled: self.disabled,
        }
    }
}

/// Normalize `base` to have leading and trailing slashes, then append `comms`.
pub fn comms_path(base: &str) -> String {
    let mut path = String::with_capacity(base.len() + 7);
    if !base.starts_with('/') {
        path.push('/');
    }
    path.push_str(base);
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str("comms");
    path
}
