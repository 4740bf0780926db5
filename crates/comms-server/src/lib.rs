//! # comms-server
//!
//! Realtime push channel between a browser UI and the backend runtime.
//!
//! - `WebSocket` endpoint at `<base>/comms` with an auth handshake
//! - Per-connection coalescing send buffers (one frame per 50 ms window)
//! - Registry of authenticated connections, mirrored to a [`bridge::SubscriptionBridge`]
//! - Global keep-alive heartbeat
//! - In-process topic broker ([`broker::LocalBroker`]) for single-process deployments

#![deny(unsafe_code)]

pub mod bridge;
pub mod broker;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::SubscriptionBridge;
pub use broker::LocalBroker;
pub use config::ServerConfig;
pub use error::CommsError;
pub use server::CommsServer;
pub use service::{CommsConfig, CommsService};
pub use websocket::connection::{AuthState, Connection};
