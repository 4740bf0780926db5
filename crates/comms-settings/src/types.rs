//! Settings types.

use comms_core::{Scope, UserRecord};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommsSettings {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Push channel behaviour.
    pub comms: ChannelSettings,
    /// Credential store seed data.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl CommsSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.comms.keep_alive_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "comms.keepAliveMs must be greater than zero".into(),
            ));
        }
        if self.server.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageSize must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Server network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Path the comms endpoint is mounted under (`<base>/comms`).
    pub endpoint_base_path: String,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1880,
            endpoint_base_path: "/".to_string(),
            max_message_size: 1024 * 1024,
        }
    }
}

/// Push channel settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Hold new connections until they authenticate.
    pub authentication_required: bool,
    /// Keep-alive window in milliseconds.
    pub keep_alive_ms: u64,
    /// Do not mount the comms endpoint at all.
    pub disabled: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            authentication_required: false,
            keep_alive_ms: 15_000,
            disabled: false,
        }
    }
}

/// A bearer token issued to a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    /// Opaque token string presented by the client.
    pub token: String,
    /// Username the token belongs to.
    pub user: String,
    /// Scope granted to the token.
    #[serde(default)]
    pub scope: Scope,
}

/// Seed data for the in-memory credential store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Known users.
    pub users: Vec<UserRecord>,
    /// Issued tokens.
    pub tokens: Vec<TokenGrant>,
    /// Permissions of the anonymous default user; `None` disables anonymous access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_permissions: Option<Scope>,
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = CommsSettings::default();
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 1880);
        assert_eq!(s.server.endpoint_base_path, "/");
        assert_eq!(s.comms.keep_alive_ms, 15_000);
        assert!(!s.comms.authentication_required);
        assert!(!s.comms.disabled);
        assert!(s.auth.default_permissions.is_none());
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn camel_case_keys() {
        let value = serde_json::to_value(CommsSettings::default()).unwrap();
        assert!(value["comms"]["keepAliveMs"].is_number());
        assert!(value["comms"]["authenticationRequired"].is_boolean());
        assert!(value["server"]["endpointBasePath"].is_string());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: CommsSettings =
            serde_json::from_str(r#"{"comms":{"authenticationRequired":true}}"#).unwrap();
        assert!(s.comms.authentication_required);
        assert_eq!(s.comms.keep_alive_ms, 15_000);
        assert_eq!(s.server.port, 1880);
    }

    #[test]
    fn auth_seed_parses() {
        let json = r#"{
            "users": [{"username": "alice", "permissions": "*"}],
            "tokens": [{"token": "t1", "user": "alice", "scope": ["status.read"]}],
            "defaultPermissions": "read"
        }"#;
        let auth: AuthSettings = serde_json::from_str(json).unwrap();
        assert_eq!(auth.users[0].username, "alice");
        assert_eq!(auth.tokens[0].token, "t1");
        assert_eq!(auth.default_permissions, Some(Scope::read()));
    }

    #[test]
    fn validate_rejects_zero_keep_alive() {
        let mut s = CommsSettings::default();
        s.comms.keep_alive_ms = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(CommsSettings::default().validate().is_ok());
    }
}
