//! Shared fakes for unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use comms_auth::{AuthError, AuthProvider};
use comms_core::{ClientRecord, UserRecord};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bridge::SubscriptionBridge;
use crate::websocket::connection::Connection;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::send_buffer::COALESCE_DELAY;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BridgeEvent {
    Added(String),
    Removed(String),
    Subscribed {
        session: String,
        user: Option<String>,
        topic: String,
    },
}

#[derive(Default)]
pub(crate) struct RecordingBridge {
    events: Mutex<Vec<BridgeEvent>>,
}

impl RecordingBridge {
    pub(crate) fn events(&self) -> Vec<BridgeEvent> {
        self.events.lock().clone()
    }
}

impl SubscriptionBridge for RecordingBridge {
    fn subscribe(&self, identity: Option<&UserRecord>, connection: &Arc<Connection>, topic: &str) {
        self.events.lock().push(BridgeEvent::Subscribed {
            session: connection.session_id().to_string(),
            user: identity.map(|u| u.username.clone()),
            topic: topic.to_owned(),
        });
    }

    fn add_connection(&self, connection: &Arc<Connection>) {
        self.events
            .lock()
            .push(BridgeEvent::Added(connection.session_id().to_string()));
    }

    fn remove_connection(&self, connection: &Arc<Connection>) {
        self.events
            .lock()
            .push(BridgeEvent::Removed(connection.session_id().to_string()));
    }
}

/// Credential store whose every lookup fails.
pub(crate) struct FailingProvider;

#[async_trait]
impl AuthProvider for FailingProvider {
    async fn resolve_token(&self, _: &str) -> Result<Option<ClientRecord>, AuthError> {
        Err(AuthError::Unavailable("store offline".into()))
    }

    async fn resolve_user(&self, _: &str) -> Result<Option<UserRecord>, AuthError> {
        Err(AuthError::Unavailable("store offline".into()))
    }

    async fn default_user(&self) -> Result<Option<UserRecord>, AuthError> {
        Err(AuthError::Unavailable("store offline".into()))
    }
}

pub(crate) fn recording_registry() -> (Arc<ConnectionRegistry>, Arc<RecordingBridge>) {
    let bridge = Arc::new(RecordingBridge::default());
    let registry = Arc::new(ConnectionRegistry::new(bridge.clone()));
    (registry, bridge)
}

pub(crate) fn connection(
    registry: &Arc<ConnectionRegistry>,
) -> (Arc<Connection>, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(64);
    let conn = Connection::new(tx, Arc::clone(registry), CancellationToken::new());
    (conn, rx)
}

/// Sleep past one coalescing window.
pub(crate) async fn wait_for_flush() {
    tokio::time::sleep(COALESCE_DELAY + Duration::from_millis(10)).await;
}

/// Let spawned tasks run to their next suspension point.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Drain every frame written so far, parsed as JSON.
pub(crate) fn frames(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        if let Ok(value) = serde_json::from_str(&text) {
            out.push(value);
        }
    }
    out
}
