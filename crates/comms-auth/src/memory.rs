//! In-process credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use comms_core::{ClientRecord, Scope, UserRecord};
use comms_settings::AuthSettings;
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::AuthError;
use crate::provider::AuthProvider;

/// Username given to the anonymous default user.
pub const ANONYMOUS_USERNAME: &str = "anonymous";

/// Credential store held in memory, seeded from [`AuthSettings`].
///
/// Tokens can be issued and revoked at runtime; nothing is persisted.
#[derive(Default)]
pub struct MemoryAuthProvider {
    users: RwLock<HashMap<String, UserRecord>>,
    tokens: RwLock<HashMap<String, ClientRecord>>,
    default_permissions: Option<Scope>,
}

impl MemoryAuthProvider {
    /// Create an empty store with no anonymous access.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from settings.
    pub fn from_settings(settings: &AuthSettings) -> Self {
        let users = settings
            .users
            .iter()
            .map(|u| (u.username.clone(), u.clone()))
            .collect();
        let tokens = settings
            .tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    ClientRecord {
                        user: t.user.clone(),
                        scope: t.scope.clone(),
                    },
                )
            })
            .collect();
        debug!(
            users = settings.users.len(),
            tokens = settings.tokens.len(),
            anonymous = settings.default_permissions.is_some(),
            "credential store seeded"
        );
        Self {
            users: RwLock::new(users),
            tokens: RwLock::new(tokens),
            default_permissions: settings.default_permissions.clone(),
        }
    }

    /// Enable anonymous access with the given permissions.
    #[must_use]
    pub fn with_default_permissions(mut self, permissions: Scope) -> Self {
        self.default_permissions = Some(permissions);
        self
    }

    /// Add or replace a user.
    pub fn insert_user(&self, user: UserRecord) {
        let _ = self.users.write().insert(user.username.clone(), user);
    }

    /// Issue a token for `user` with `scope`.
    pub fn issue_token(&self, token: impl Into<String>, user: impl Into<String>, scope: Scope) {
        let record = ClientRecord {
            user: user.into(),
            scope,
        };
        let _ = self.tokens.write().insert(token.into(), record);
    }

    /// Revoke a token. Returns whether it existed.
    pub fn revoke_token(&self, token: &str) -> bool {
        self.tokens.write().remove(token).is_some()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn resolve_token(&self, token: &str) -> Result<Option<ClientRecord>, AuthError> {
        Ok(self.tokens.read().get(token).cloned())
    }

    async fn resolve_user(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.read().get(username).cloned())
    }

    async fn default_user(&self) -> Result<Option<UserRecord>, AuthError> {
        Ok(self
            .default_permissions
            .clone()
            .map(|permissions| UserRecord::new(ANONYMOUS_USERNAME, permissions)))
    }
}
