//! Per-client connection state.

use std::sync::Arc;
use std::time::Duration;

use comms_core::{SessionId, UserRecord};
use metrics::counter;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, trace, warn};

use super::registry::ConnectionRegistry;
use super::send_buffer::{COALESCE_DELAY, SendBuffer, encode_frame};
use crate::metrics::{COMMS_FRAMES_FLUSHED_TOTAL, COMMS_SEND_FAILURES_TOTAL};

/// Authentication state of a connection.
///
/// `PendingAuth` is left at most once; `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    /// Waiting for an auth frame.
    PendingAuth,
    /// Allowed to receive pushes; a registry member.
    Authenticated,
    /// Finished. Ignores inbound frames and never transmits again.
    Closed,
}

struct ConnectionState {
    auth: AuthState,
    identity: Option<UserRecord>,
    finished: bool,
}

/// A connected client.
///
/// Owns the sending half of the socket writer channel and a coalescing
/// [`SendBuffer`]. Cancelling its token tells the session loop to close the
/// socket.
pub struct Connection {
    session_id: SessionId,
    tx: mpsc::Sender<String>,
    state: Mutex<ConnectionState>,
    buffer: SendBuffer,
    cancel: CancellationToken,
    registry: Arc<ConnectionRegistry>,
    opened_at: Instant,
}

impl Connection {
    /// Create a pending connection writing into `tx`.
    pub fn new(
        tx: mpsc::Sender<String>,
        registry: Arc<ConnectionRegistry>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            session_id: SessionId::new(),
            tx,
            state: Mutex::new(ConnectionState {
                auth: AuthState::PendingAuth,
                identity: None,
                finished: false,
            }),
            buffer: SendBuffer::new(),
            cancel,
            registry,
            opened_at: Instant::now(),
        })
    }

    /// Random diagnostic label.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Current auth state.
    pub fn auth_state(&self) -> AuthState {
        self.state.lock().auth
    }

    /// The authenticated user, if any.
    pub fn identity(&self) -> Option<UserRecord> {
        self.state.lock().identity.clone()
    }

    /// Whether the connection is closed or its token was cancelled.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.auth_state() == AuthState::Closed
    }

    /// Resolves once the connection is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Time since the socket was accepted.
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// The outbound buffer.
    pub fn buffer(&self) -> &SendBuffer {
        &self.buffer
    }

    /// Move `PendingAuth → Authenticated`, recording `identity`.
    ///
    /// Returns `false` (and changes nothing) from any other state.
    pub fn authenticate(&self, identity: Option<UserRecord>) -> bool {
        let mut state = self.state.lock();
        if state.auth != AuthState::PendingAuth {
            return false;
        }
        state.auth = AuthState::Authenticated;
        state.identity = identity;
        true
    }

    /// Move `PendingAuth → Closed`, writing `notice` as the last frame.
    ///
    /// Returns `false` from any other state. The session loop flushes the
    /// notice before closing the socket.
    pub fn deny(&self, notice: &str) -> bool {
        {
            let mut state = self.state.lock();
            if state.auth != AuthState::PendingAuth {
                return false;
            }
            if let Err(error) = self.tx.try_send(notice.to_owned()) {
                debug!(session = %self.session_id, %error, "auth notice not delivered");
            }
            state.auth = AuthState::Closed;
        }
        let _ = self.buffer.take();
        self.cancel.cancel();
        true
    }

    /// Close the connection and remove it from the registry.
    ///
    /// Returns `true` if this call performed the transition. Safe to call
    /// repeatedly.
    pub fn close(&self) -> bool {
        let transitioned = {
            let mut state = self.state.lock();
            let was_open = state.auth != AuthState::Closed;
            state.auth = AuthState::Closed;
            was_open
        };
        let _ = self.buffer.take();
        self.cancel.cancel();
        let _ = self.registry.remove(self);
        transitioned
    }

    /// Close, then claim the end-of-session report.
    ///
    /// Returns `true` for the first caller only, however the connection
    /// reached `Closed`.
    pub fn finish(&self) -> bool {
        let _ = self.close();
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.finished, true)
    }

    /// Write a control frame straight to the socket, bypassing the buffer.
    pub fn send_control(&self, frame: &str) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.try_send(frame.to_owned()).is_ok()
    }

    /// Queue a push for `topic`.
    pub fn send(self: &Arc<Self>, topic: &str, payload: Value) {
        self.enqueue(Some(topic.to_owned()), Some(payload));
    }

    /// Queue `{topic, payload}` if both are present and arm a flush.
    ///
    /// Never fails; transmission problems close the connection instead.
    /// Must be called from within a tokio runtime.
    pub fn enqueue(self: &Arc<Self>, topic: Option<String>, payload: Option<Value>) {
        if self.is_closed() {
            trace!(session = %self.session_id, "enqueue on closed connection ignored");
            return;
        }
        if self.buffer.push(topic, payload) {
            self.schedule_flush();
        }
    }

    fn schedule_flush(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let _ = tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(COALESCE_DELAY) => {
                    if let Some(connection) = weak.upgrade() {
                        connection.flush();
                    }
                }
            }
        });
    }

    /// Transmit everything queued as one frame.
    ///
    /// The queue is emptied whether or not transmission succeeds.
    pub fn flush(&self) {
        let batch = self.buffer.take();
        if batch.is_empty() || self.is_closed() {
            return;
        }
        let frame = match encode_frame(&batch) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(session = %self.session_id, %error, "comms frame encoding failed");
                return;
            }
        };
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.buffer.mark_sent(Instant::now());
                counter!(COMMS_FRAMES_FLUSHED_TOTAL).increment(1);
            }
            Err(error) => {
                warn!(session = %self.session_id, %error, "comms.error-send");
                counter!(COMMS_SEND_FAILURES_TOTAL).increment(1);
                let _ = self.close();
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .field("auth_state", &self.auth_state())
            .finish_non_exhaustive()
    }
}
