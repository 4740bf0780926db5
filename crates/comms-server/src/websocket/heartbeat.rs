//! Global keep-alive heartbeat.
//!
//! When nothing has been broadcast for a full keep-alive window,
//! every registry member gets one `"hb"` entry whose payload is the
//! epoch-millisecond time of the previous broadcast.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use serde_json::json;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::registry::ConnectionRegistry;
use crate::metrics::COMMS_HEARTBEATS_TOTAL;

/// Topic of heartbeat entries.
pub const HEARTBEAT_TOPIC: &str = "hb";

#[derive(Clone, Copy, Debug)]
struct LastBroadcast {
    at: Instant,
    epoch_ms: i64,
}

impl LastBroadcast {
    fn now() -> Self {
        Self {
            at: Instant::now(),
            epoch_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Tracks the last broadcast and emits heartbeats when idle.
pub struct HeartbeatMonitor {
    keep_alive: Duration,
    last: Mutex<LastBroadcast>,
}

impl HeartbeatMonitor {
    /// Create a monitor whose window starts now.
    pub fn new(keep_alive: Duration) -> Self {
        Self {
            keep_alive,
            last: Mutex::new(LastBroadcast::now()),
        }
    }

    /// The keep-alive window.
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Restart the idle window.
    pub fn reset(&self) {
        *self.last.lock() = LastBroadcast::now();
    }

    /// Epoch milliseconds of the last broadcast.
    pub fn last_broadcast_ms(&self) -> i64 {
        self.last.lock().epoch_ms
    }

    /// One timer tick.
    ///
    /// If idle for at least the window, enqueue a heartbeat to every member
    /// and advance the last-broadcast time. The timer period equals the
    /// window, so a tick landing exactly on the boundary counts as idle.
    /// Returns the number of members pinged.
    pub fn tick(&self, registry: &ConnectionRegistry) -> usize {
        let previous_ms = {
            let mut last = self.last.lock();
            if last.at.elapsed() < self.keep_alive {
                return 0;
            }
            let previous = last.epoch_ms;
            *last = LastBroadcast::now();
            previous
        };

        let members = registry.members();
        for member in &members {
            member.enqueue(Some(HEARTBEAT_TOPIC.to_owned()), Some(json!(previous_ms)));
        }
        counter!(COMMS_HEARTBEATS_TOTAL).increment(1);
        trace!(members = members.len(), "heartbeat sent");
        members.len()
    }

    /// Tick every keep-alive window until `cancel` fires.
    pub async fn run(self: Arc<Self>, registry: Arc<ConnectionRegistry>, cancel: CancellationToken) {
        let mut interval = time::interval(self.keep_alive);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        let _ = interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let _ = self.tick(&registry);
                }
                () = cancel.cancelled() => {
                    debug!("heartbeat stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{connection, frames, recording_registry, wait_for_flush};

    const WINDOW: Duration = Duration::from_millis(15_000);

    #[tokio::test(start_paused = true)]
    async fn tick_within_window_does_nothing() {
        let (registry, _bridge) = recording_registry();
        let (conn, mut rx) = connection(&registry);
        let _ = conn.authenticate(None);
        registry.add(&conn);

        let monitor = HeartbeatMonitor::new(WINDOW);
        time::advance(WINDOW - Duration::from_millis(1)).await;
        assert_eq!(monitor.tick(&registry), 0);
        wait_for_flush().await;
        assert!(frames(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_tick_pings_every_member_once() {
        let (registry, _bridge) = recording_registry();
        let (a, mut ra) = connection(&registry);
        let (b, mut rb) = connection(&registry);
        for c in [&a, &b] {
            let _ = c.authenticate(None);
            registry.add(c);
        }

        let monitor = HeartbeatMonitor::new(WINDOW);
        let before = monitor.last_broadcast_ms();
        time::advance(WINDOW).await;
        assert_eq!(monitor.tick(&registry), 2);
        assert_eq!(monitor.tick(&registry), 0);
        wait_for_flush().await;

        for rx in [&mut ra, &mut rb] {
            let sent = frames(rx);
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0][0]["topic"], HEARTBEAT_TOPIC);
            assert_eq!(sent[0][0]["data"], json!(before));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pending_connections_are_not_pinged() {
        let (registry, _bridge) = recording_registry();
        let (_pending, mut rx) = connection(&registry);
        let monitor = HeartbeatMonitor::new(WINDOW);
        time::advance(WINDOW * 2).await;
        assert_eq!(monitor.tick(&registry), 0);
        wait_for_flush().await;
        assert!(frames(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_sends_on_first_tick_after_idle_window() {
        let (registry, _bridge) = recording_registry();
        let (conn, mut rx) = connection(&registry);
        let _ = conn.authenticate(None);
        registry.add(&conn);

        let monitor = Arc::new(HeartbeatMonitor::new(WINDOW));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&monitor).run(Arc::clone(&registry), cancel.clone()));

        time::sleep(Duration::from_millis(20_000)).await;
        let sent = frames(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0]["topic"], HEARTBEAT_TOPIC);

        // Still idle, so the next tick sends again.
        time::sleep(Duration::from_millis(10_100)).await;
        assert_eq!(frames(&mut rx).len(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restarts_window() {
        let (registry, _bridge) = recording_registry();
        let monitor = HeartbeatMonitor::new(WINDOW);
        time::advance(WINDOW * 2).await;
        monitor.reset();
        assert_eq!(monitor.tick(&registry), 0);
    }
}
