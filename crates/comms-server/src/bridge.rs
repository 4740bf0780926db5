//! Seam between the push channel and the runtime's pub/sub system.

use std::sync::Arc;

use comms_core::UserRecord;

use crate::websocket::connection::Connection;

/// Receives subscribe requests and registry membership changes.
///
/// Implementations route later publishes into
/// [`Connection::send`](crate::websocket::connection::Connection::send).
/// Calls are made without any registry lock held and must not block.
pub trait SubscriptionBridge: Send + Sync {
    /// An authenticated connection asked for `topic`.
    fn subscribe(&self, identity: Option<&UserRecord>, connection: &Arc<Connection>, topic: &str);

    /// A connection joined the registry.
    fn add_connection(&self, connection: &Arc<Connection>);

    /// A connection left the registry.
    fn remove_connection(&self, connection: &Arc<Connection>);
}

/// Bridge that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBridge;

impl SubscriptionBridge for NullBridge {
    fn subscribe(&self, _: Option<&UserRecord>, _: &Arc<Connection>, _: &str) {}
    fn add_connection(&self, _: &Arc<Connection>) {}
    fn remove_connection(&self, _: &Arc<Connection>) {}
}
