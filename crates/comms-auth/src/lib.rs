//! # comms-auth
//!
//! Credential resolution for the comms auth handshake.
//!
//! - [`AuthProvider`]: the async surface the auth gate consumes (token →
//!   client, username → user, anonymous default user, capability check)
//! - [`permissions::has_permission`]: scope matching (`*`, `read`, `*.read`,
//!   exact names, lists)
//! - [`MemoryAuthProvider`]: in-process store seeded from settings

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod permissions;
pub mod provider;

pub use errors::AuthError;
pub use memory::{ANONYMOUS_USERNAME, MemoryAuthProvider};
pub use permissions::{STATUS_READ, has_permission};
pub use provider::AuthProvider;
