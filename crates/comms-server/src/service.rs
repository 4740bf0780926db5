//! The comms service.
//!
//! One [`CommsService`] owns the registry, the auth gate and the heartbeat,
//! and every [`Connection`] is driven through it: opened, fed inbound
//! frames, and closed.

use std::sync::Arc;
use std::time::Duration;

use comms_auth::AuthProvider;
use comms_core::UserRecord;
use comms_core::logging::audit;
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::bridge::SubscriptionBridge;
use crate::error::CommsError;
use crate::metrics::{
    COMMS_AUTH_FAILURES_TOTAL, COMMS_AUTH_SUCCESS_TOTAL, COMMS_CONNECTION_DURATION_SECONDS,
    COMMS_CONNECTIONS_ACTIVE, COMMS_CONNECTIONS_TOTAL, COMMS_DISCONNECTIONS_TOTAL,
    COMMS_MALFORMED_FRAMES_TOTAL,
};
use crate::websocket::auth_gate::{AuthGate, AuthOutcome};
use crate::websocket::connection::{AuthState, Connection};
use crate::websocket::heartbeat::HeartbeatMonitor;
use crate::websocket::protocol::{AUTH_FAIL_FRAME, AUTH_OK_FRAME, ClientMessage};
use crate::websocket::registry::ConnectionRegistry;

/// Behavioural switches for the service.
#[derive(Clone, Debug)]
pub struct CommsConfig {
    /// Hold new connections in `PendingAuth` until they authenticate.
    pub authentication_required: bool,
    /// Heartbeat keep-alive window.
    pub keep_alive: Duration,
    /// The endpoint is not mounted; `start` does nothing.
    pub disabled: bool,
}

impl Default for CommsConfig {
    fn default() -> Self {
        Self {
            authentication_required: false,
            keep_alive: Duration::from_millis(15_000),
            disabled: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AuthPath {
    Token,
    Anonymous,
}

impl AuthPath {
    fn label(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Anonymous => "anonymous",
        }
    }
}

/// Push channel service with an `new` / `start` / `stop` lifecycle.
pub struct CommsService {
    config: CommsConfig,
    registry: Arc<ConnectionRegistry>,
    gate: AuthGate,
    bridge: Arc<dyn SubscriptionBridge>,
    heartbeat: Arc<HeartbeatMonitor>,
    /// Parent of every connection token; replaced on `stop`.
    lifecycle: Mutex<CancellationToken>,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl CommsService {
    /// Build a stopped service.
    pub fn new(
        config: CommsConfig,
        provider: Arc<dyn AuthProvider>,
        bridge: Arc<dyn SubscriptionBridge>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: Arc::new(ConnectionRegistry::new(Arc::clone(&bridge))),
            gate: AuthGate::new(provider),
            heartbeat: Arc::new(HeartbeatMonitor::new(config.keep_alive)),
            bridge,
            config,
            lifecycle: Mutex::new(CancellationToken::new()),
            heartbeat_task: Mutex::new(None),
        })
    }

    /// Service configuration.
    pub fn config(&self) -> &CommsConfig {
        &self.config
    }

    /// Authenticated connections.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The keep-alive monitor.
    pub fn heartbeat(&self) -> &Arc<HeartbeatMonitor> {
        &self.heartbeat
    }

    /// The auth gate.
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// Whether the heartbeat task is running.
    pub fn is_running(&self) -> bool {
        self.heartbeat_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Resolve the anonymous user and start the heartbeat.
    ///
    /// A no-op when disabled or already running.
    pub async fn start(&self) -> Result<(), CommsError> {
        if self.config.disabled {
            info!("comms endpoint disabled, not starting");
            return Ok(());
        }
        if self.is_running() {
            debug!("comms service already running");
            return Ok(());
        }
        if self.config.keep_alive.is_zero() {
            return Err(CommsError::InvalidKeepAlive);
        }

        let anonymous = self.gate.load_anonymous().await?;
        self.heartbeat.reset();
        let cancel = self.lifecycle.lock().child_token();
        let task = tokio::spawn(
            Arc::clone(&self.heartbeat).run(Arc::clone(&self.registry), cancel),
        );
        *self.heartbeat_task.lock() = Some(task);

        info!(
            keep_alive_ms = u64::try_from(self.config.keep_alive.as_millis()).unwrap_or(u64::MAX),
            authentication_required = self.config.authentication_required,
            anonymous = anonymous.is_some(),
            "comms service started"
        );
        Ok(())
    }

    /// Stop the heartbeat and close every open connection.
    pub fn stop(&self) {
        let lifecycle = std::mem::take(&mut *self.lifecycle.lock());
        lifecycle.cancel();
        if let Some(task) = self.heartbeat_task.lock().take() {
            task.abort();
        }
        let members = self.registry.members();
        for member in &members {
            let _ = member.close();
        }
        info!(closed = members.len(), "comms service stopped");
    }

    /// Accept a new socket whose writer reads from the other end of `tx`.
    ///
    /// With authentication disabled the connection is registered at once.
    pub fn open_connection(&self, tx: mpsc::Sender<String>) -> Arc<Connection> {
        let cancel = self.lifecycle.lock().child_token();
        let connection = Connection::new(tx, Arc::clone(&self.registry), cancel);
        audit("comms.open", Some(connection.session_id()), None);
        counter!(COMMS_CONNECTIONS_TOTAL).increment(1);
        gauge!(COMMS_CONNECTIONS_ACTIVE).increment(1.0);

        if !self.config.authentication_required {
            let _ = self.admit(&connection, None);
        }
        connection
    }

    /// Route one inbound text frame.
    ///
    /// Returns the spawned auth task when the frame started token
    /// resolution.
    pub fn handle_frame(
        self: &Arc<Self>,
        connection: &Arc<Connection>,
        text: &str,
    ) -> Option<JoinHandle<()>> {
        let message = match ClientMessage::decode(text) {
            Ok(message) => message,
            Err(error) => {
                trace!(session = %connection.session_id(), %error, "comms received malformed message");
                counter!(COMMS_MALFORMED_FRAMES_TOTAL).increment(1);
                return None;
            }
        };

        match connection.auth_state() {
            AuthState::Closed => None,
            AuthState::Authenticated => {
                if let Some(topic) = message.subscribe_topic() {
                    self.subscribe(connection, topic);
                }
                None
            }
            AuthState::PendingAuth => match message {
                ClientMessage::Auth { token, .. } => Some(self.spawn_token_auth(connection, token)),
                other => {
                    let outcome = self.gate.authenticate_anonymous();
                    if self.complete_auth(connection, outcome, AuthPath::Anonymous) {
                        if let Some(topic) = other.subscribe_topic() {
                            self.subscribe(connection, topic);
                        }
                    }
                    None
                }
            },
        }
    }

    /// Close after the socket ended, for whatever reason.
    ///
    /// Only the first call for a connection is audited and counted.
    pub fn close_connection(&self, connection: &Connection) {
        let identity = connection.identity();
        if !connection.finish() {
            trace!(session = %connection.session_id(), "connection already finished");
            return;
        }
        audit("comms.close", Some(connection.session_id()), identity.as_ref());
        counter!(COMMS_DISCONNECTIONS_TOTAL).increment(1);
        gauge!(COMMS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(COMMS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
    }

    fn spawn_token_auth(self: &Arc<Self>, connection: &Arc<Connection>, token: String) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let weak = Arc::downgrade(connection);
        tokio::spawn(async move {
            let outcome = service.gate.authenticate_token(&token).await;
            let Some(connection) = weak.upgrade() else {
                trace!("auth resolved after connection was dropped");
                return;
            };
            let _ = service.complete_auth(&connection, outcome, AuthPath::Token);
        })
    }

    /// Apply an auth outcome. Returns whether the connection was admitted.
    fn complete_auth(&self, connection: &Arc<Connection>, outcome: AuthOutcome, path: AuthPath) -> bool {
        let session = connection.session_id();
        if connection.is_closed() || connection.auth_state() != AuthState::PendingAuth {
            trace!(%session, "auth resolved after connection left pending");
            return false;
        }

        match outcome {
            AuthOutcome::Granted(user) => {
                audit("comms.auth", Some(session), Some(&user));
                if !self.admit(connection, Some(user)) {
                    return false;
                }
                counter!(COMMS_AUTH_SUCCESS_TOTAL, "method" => path.label()).increment(1);
                if path == AuthPath::Token {
                    let _ = connection.send_control(AUTH_OK_FRAME);
                }
                true
            }
            AuthOutcome::Forbidden(user) => {
                audit("comms.auth", Some(session), Some(&user));
                debug!(%session, user = %user.username, "identity lacks status.read");
                self.reject(connection, path);
                false
            }
            AuthOutcome::Unresolved => {
                audit("comms.auth.fail", Some(session), None);
                self.reject(connection, path);
                false
            }
        }
    }

    fn reject(&self, connection: &Connection, path: AuthPath) {
        if connection.deny(AUTH_FAIL_FRAME) {
            counter!(COMMS_AUTH_FAILURES_TOTAL, "method" => path.label()).increment(1);
            debug!(session = %connection.session_id(), method = path.label(), "comms auth rejected");
        }
    }

    fn admit(&self, connection: &Arc<Connection>, identity: Option<UserRecord>) -> bool {
        if !connection.authenticate(identity) {
            return false;
        }
        self.registry.add(connection);
        // A close racing the add above may have missed the membership.
        if connection.is_closed() {
            let _ = self.registry.remove(connection);
            return false;
        }
        true
    }

    fn subscribe(&self, connection: &Arc<Connection>, topic: &str) {
        debug!(session = %connection.session_id(), topic, "comms subscribe");
        let identity = connection.identity();
        self.bridge.subscribe(identity.as_ref(), connection, topic);
    }
}
