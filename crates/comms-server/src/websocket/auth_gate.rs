//! Resolves auth attempts to identities.

use std::sync::Arc;

use comms_auth::{AuthError, AuthProvider, STATUS_READ};
use comms_core::UserRecord;
use parking_lot::RwLock;
use tracing::{debug, warn};

/// Result of one auth attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Identity resolved and holds `status.read`.
    Granted(UserRecord),
    /// Identity resolved but lacks `status.read`.
    Forbidden(UserRecord),
    /// No identity: unknown token, unknown user, no anonymous user, or a
    /// store error.
    Unresolved,
}

impl AuthOutcome {
    /// Whether the attempt may proceed.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// The resolved user, granted or not.
    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            Self::Granted(user) | Self::Forbidden(user) => Some(user),
            Self::Unresolved => None,
        }
    }
}

/// Token and anonymous authentication against an [`AuthProvider`].
pub struct AuthGate {
    provider: Arc<dyn AuthProvider>,
    anonymous: RwLock<Option<UserRecord>>,
}

impl AuthGate {
    /// Wrap a credential store.
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            anonymous: RwLock::new(None),
        }
    }

    /// Resolve and cache the anonymous default user.
    pub async fn load_anonymous(&self) -> Result<Option<UserRecord>, AuthError> {
        let user = self.provider.default_user().await?;
        debug!(
            anonymous = user.as_ref().map(|u| u.username.as_str()),
            "anonymous user loaded"
        );
        self.anonymous.write().clone_from(&user);
        Ok(user)
    }

    /// The cached anonymous user.
    pub fn anonymous(&self) -> Option<UserRecord> {
        self.anonymous.read().clone()
    }

    /// Token path: token → client record → user record, then check the
    /// client record's scope.
    pub async fn authenticate_token(&self, token: &str) -> AuthOutcome {
        let client = match self.provider.resolve_token(token).await {
            Ok(Some(client)) => client,
            Ok(None) => return AuthOutcome::Unresolved,
            Err(error) => {
                warn!(%error, "token resolution failed");
                return AuthOutcome::Unresolved;
            }
        };
        let user = match self.provider.resolve_user(&client.user).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(user = %client.user, "token refers to unknown user");
                return AuthOutcome::Unresolved;
            }
            Err(error) => {
                warn!(%error, "user resolution failed");
                return AuthOutcome::Unresolved;
            }
        };
        if self.provider.has_capability(&client.scope, STATUS_READ) {
            AuthOutcome::Granted(user)
        } else {
            AuthOutcome::Forbidden(user)
        }
    }

    /// Anonymous path: check the cached default user's own permissions.
    pub fn authenticate_anonymous(&self) -> AuthOutcome {
        match self.anonymous() {
            Some(user) if self.provider.has_capability(&user.permissions, STATUS_READ) => {
                AuthOutcome::Granted(user)
            }
            Some(user) => AuthOutcome::Forbidden(user),
            None => AuthOutcome::Unresolved,
        }
    }
}
