//! The credential-store surface consumed by the auth gate.

use async_trait::async_trait;
use comms_core::{ClientRecord, Scope, UserRecord};

use crate::errors::AuthError;
use crate::permissions::has_permission;

/// Resolves presented credentials to identities.
///
/// Every lookup may suspend; `Ok(None)` means "no such record" and is
/// treated by callers exactly like a failed attempt.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve a bearer token to the client it was issued to.
    async fn resolve_token(&self, token: &str) -> Result<Option<ClientRecord>, AuthError>;

    /// Resolve a username to its user record.
    async fn resolve_user(&self, username: &str) -> Result<Option<UserRecord>, AuthError>;

    /// The anonymous default user, if anonymous access is configured.
    async fn default_user(&self) -> Result<Option<UserRecord>, AuthError>;

    /// Whether `scope` grants `capability`.
    fn has_capability(&self, scope: &Scope, capability: &str) -> bool {
        has_permission(scope, capability)
    }
}
