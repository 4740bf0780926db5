//! Per-connection outbound coalescing.
//!
//! Messages enqueued within one [`COALESCE_DELAY`] window are delivered as a
//! single JSON array frame. At most one flush is pending per buffer.

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

/// Delay between the first enqueue of a window and its flush.
pub const COALESCE_DELAY: Duration = Duration::from_millis(50);

/// One entry of an outbound frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutboundMessage {
    /// Topic the payload was published on.
    pub topic: String,
    /// Arbitrary JSON payload, sent as `data`.
    #[serde(rename = "data")]
    pub payload: Value,
}

#[derive(Default)]
struct BufferState {
    queue: Vec<OutboundMessage>,
    flush_scheduled: bool,
    last_sent_at: Option<Instant>,
}

/// Outbound queue plus the single-pending-flush marker.
#[derive(Default)]
pub struct SendBuffer {
    state: Mutex<BufferState>,
}

impl SendBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `{topic, payload}` when both are present and the payload is
    /// not JSON `null`.
    ///
    /// Returns `true` when no flush was pending, in which case the caller
    /// must schedule one. A call with a missing topic or payload appends
    /// nothing but still arms the flush.
    pub fn push(&self, topic: Option<String>, payload: Option<Value>) -> bool {
        let mut state = self.state.lock();
        if let (Some(topic), Some(payload)) = (topic, payload.filter(|p| !p.is_null())) {
            state.queue.push(OutboundMessage { topic, payload });
        }
        if state.flush_scheduled {
            false
        } else {
            state.flush_scheduled = true;
            true
        }
    }

    /// Take every queued entry and clear the pending-flush marker.
    pub fn take(&self) -> Vec<OutboundMessage> {
        let mut state = self.state.lock();
        state.flush_scheduled = false;
        std::mem::take(&mut state.queue)
    }

    /// Record a successful transmission.
    pub fn mark_sent(&self, at: Instant) {
        self.state.lock().last_sent_at = Some(at);
    }

    /// When the last frame was handed to the transport.
    pub fn last_sent_at(&self) -> Option<Instant> {
        self.state.lock().last_sent_at
    }

    /// Entries waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether a flush is armed.
    pub fn is_flush_scheduled(&self) -> bool {
        self.state.lock().flush_scheduled
    }
}

/// Serialize a batch as one array-shaped frame.
pub fn encode_frame(messages: &[OutboundMessage]) -> Result<String, serde_json::Error> {
    serde_json::to_string(messages)
}
