//! # comms-core
//!
//! Types shared by every comms crate:
//!
//! - [`ids::SessionId`]: the random per-connection diagnostics label
//! - [`identity`]: user records, resolved token grants, and permission scopes
//! - [`logging`]: `tracing` subscriber setup, audit events, and log capture for tests

#![deny(unsafe_code)]

pub mod identity;
pub mod ids;
pub mod logging;

pub use identity::{ClientRecord, Scope, UserRecord};
pub use ids::SessionId;
