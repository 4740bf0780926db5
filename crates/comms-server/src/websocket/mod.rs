//! Connection state machine, send buffering, registry, auth gate, heartbeat,
//! and the per-socket session loop.

pub mod auth_gate;
pub mod connection;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod send_buffer;
pub mod session;
