//! Set of authenticated connections.

use std::sync::Arc;

use metrics::gauge;
use parking_lot::Mutex;
use tracing::debug;

use super::connection::Connection;
use crate::bridge::SubscriptionBridge;
use crate::metrics::COMMS_REGISTRY_MEMBERS;

/// Ordered membership list, mirrored to a [`SubscriptionBridge`].
///
/// Membership is by pointer identity. Bridge notifications run after the
/// membership lock is released.
pub struct ConnectionRegistry {
    members: Mutex<Vec<Arc<Connection>>>,
    bridge: Arc<dyn SubscriptionBridge>,
}

impl ConnectionRegistry {
    /// Create an empty registry notifying `bridge`.
    pub fn new(bridge: Arc<dyn SubscriptionBridge>) -> Self {
        Self {
            members: Mutex::new(Vec::new()),
            bridge,
        }
    }

    /// Add a member and notify the bridge.
    pub fn add(&self, connection: &Arc<Connection>) {
        let count = {
            let mut members = self.members.lock();
            members.push(Arc::clone(connection));
            members.len()
        };
        #[allow(clippy::cast_precision_loss)]
        gauge!(COMMS_REGISTRY_MEMBERS).set(count as f64);
        debug!(session = %connection.session_id(), count, "connection registered");
        self.bridge.add_connection(connection);
    }

    /// Remove `connection` if present.
    ///
    /// The bridge hears about the removal only when it was a member.
    pub fn remove(&self, connection: &Connection) -> bool {
        let (removed, count) = {
            let mut members = self.members.lock();
            let removed = members
                .iter()
                .position(|m| std::ptr::eq(Arc::as_ptr(m), connection))
                .map(|i| members.remove(i));
            (removed, members.len())
        };
        let Some(removed) = removed else {
            return false;
        };
        #[allow(clippy::cast_precision_loss)]
        gauge!(COMMS_REGISTRY_MEMBERS).set(count as f64);
        debug!(session = %removed.session_id(), count, "connection deregistered");
        self.bridge.remove_connection(&removed);
        true
    }

    /// Snapshot of current members in insertion order.
    pub fn members(&self) -> Vec<Arc<Connection>> {
        self.members.lock().clone()
    }

    /// Whether `connection` is a member.
    pub fn contains(&self, connection: &Connection) -> bool {
        self.members
            .lock()
            .iter()
            .any(|m| std::ptr::eq(Arc::as_ptr(m), connection))
    }

    /// Member count.
    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    /// Whether there are no members.
    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }
}
