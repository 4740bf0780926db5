//! In-process topic broker.
//!
//! A [`SubscriptionBridge`] for single-process deployments: runtime code
//! calls [`LocalBroker::publish`] and matching subscribers receive the
//! payload through their send buffers. Topic patterns use MQTT wildcards:
//! `+` matches one level, a trailing `#` matches any remainder (including
//! none).

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use comms_core::UserRecord;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::bridge::SubscriptionBridge;
use crate::websocket::connection::Connection;

struct Subscription {
    connection: Weak<Connection>,
    pattern: String,
}

/// Routes published payloads to subscribed connections.
#[derive(Default)]
pub struct LocalBroker {
    subscriptions: Mutex<Vec<Subscription>>,
    retained: Mutex<HashMap<String, Value>>,
}

impl LocalBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `payload` on `topic`.
    ///
    /// With `retain` the payload replaces the retained value for the topic;
    /// without it any retained value is cleared. Returns how many
    /// subscriptions it was delivered to.
    pub fn publish(&self, topic: &str, payload: Value, retain: bool) -> usize {
        {
            let mut retained = self.retained.lock();
            if retain {
                let _ = retained.insert(topic.to_owned(), payload.clone());
            } else {
                let _ = retained.remove(topic);
            }
        }

        let targets: Vec<Arc<Connection>> = {
            let mut subs = self.subscriptions.lock();
            subs.retain(|s| s.connection.strong_count() > 0);
            subs.iter()
                .filter(|s| topic_matches(&s.pattern, topic))
                .filter_map(|s| s.connection.upgrade())
                .collect()
        };
        for connection in &targets {
            connection.send(topic, payload.clone());
        }
        trace!(topic, delivered = targets.len(), retain, "published");
        targets.len()
    }

    /// The retained payload for `topic`, if any.
    pub fn retained(&self, topic: &str) -> Option<Value> {
        self.retained.lock().get(topic).cloned()
    }

    /// Live subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| s.connection.strong_count() > 0)
            .count()
    }
}

impl SubscriptionBridge for LocalBroker {
    fn subscribe(&self, identity: Option<&UserRecord>, connection: &Arc<Connection>, topic: &str) {
        {
            let mut subs = self.subscriptions.lock();
            let exists = subs.iter().any(|s| {
                s.pattern == topic && std::ptr::eq(s.connection.as_ptr(), Arc::as_ptr(connection))
            });
            if !exists {
                subs.push(Subscription {
                    connection: Arc::downgrade(connection),
                    pattern: topic.to_owned(),
                });
            }
        }
        debug!(
            session = %connection.session_id(),
            user = identity.map(|u| u.username.as_str()),
            topic,
            "subscribed"
        );

        let replay: Vec<(String, Value)> = self
            .retained
            .lock()
            .iter()
            .filter(|(t, _)| topic_matches(topic, t))
            .map(|(t, v)| (t.clone(), v.clone()))
            .collect();
        for (t, v) in replay {
            connection.send(&t, v);
        }
    }

    fn add_connection(&self, connection: &Arc<Connection>) {
        trace!(session = %connection.session_id(), "broker tracking connection");
    }

    fn remove_connection(&self, connection: &Arc<Connection>) {
        let target = Arc::as_ptr(connection);
        self.subscriptions
            .lock()
            .retain(|s| !std::ptr::eq(s.connection.as_ptr(), target) && s.connection.strong_count() > 0);
    }
}

/// Whether `topic` matches the subscription `pattern`.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(level)) => {
                if level.is_empty() {
                    return false;
                }
            }
            (Some(p), Some(t)) => {
                if p != t {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}
