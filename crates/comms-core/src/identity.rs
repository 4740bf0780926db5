//! Identity records resolved during the auth handshake.

use serde::{Deserialize, Serialize};

/// Granted permission scope: one scope string or a list of them.
///
/// Serialized untagged, so both `"read"` and `["status.read", "flows.write"]`
/// are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scope {
    /// A single scope such as `"*"` or `"read"`.
    One(String),
    /// Any of several scopes.
    Many(Vec<String>),
}

impl Scope {
    /// Scope granting everything.
    #[must_use]
    pub fn all() -> Self {
        Self::One("*".into())
    }

    /// Scope granting every `*.read` permission.
    #[must_use]
    pub fn read() -> Self {
        Self::One("read".into())
    }

    /// Iterate over the individual scope strings.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            Self::One(s) => std::slice::from_ref(s),
            Self::Many(v) => v,
        };
        items.iter().map(String::as_str)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl From<&str> for Scope {
    fn from(s: &str) -> Self {
        Self::One(s.to_owned())
    }
}

impl From<Vec<String>> for Scope {
    fn from(v: Vec<String>) -> Self {
        Self::Many(v)
    }
}

/// A user known to the credential store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Login name.
    pub username: String,
    /// Permissions granted to the user.
    #[serde(default)]
    pub permissions: Scope,
}

impl UserRecord {
    /// Create a user record.
    pub fn new(username: impl Into<String>, permissions: Scope) -> Self {
        Self {
            username: username.into(),
            permissions,
        }
    }
}

/// The client a bearer token was issued to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Username the token belongs to.
    pub user: String,
    /// Scope the token was issued with.
    #[serde(default)]
    pub scope: Scope,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_deserializes_from_string() {
        let scope: Scope = serde_json::from_str(r#""read""#).unwrap();
        assert_eq!(scope, Scope::read());
    }

    #[test]
    fn scope_deserializes_from_list() {
        let scope: Scope = serde_json::from_str(r#"["status.read","flows.write"]"#).unwrap();
        assert_eq!(scope.iter().collect::<Vec<_>>(), ["status.read", "flows.write"]);
    }

    #[test]
    fn default_scope_is_empty_list() {
        assert_eq!(Scope::default().iter().count(), 0);
    }

    #[test]
    fn user_without_permissions_field() {
        let user: UserRecord = serde_json::from_str(r#"{"username":"bob"}"#).unwrap();
        assert_eq!(user.username, "bob");
        assert_eq!(user.permissions, Scope::default());
    }

    #[test]
    fn client_record_roundtrip_shape() {
        let client = ClientRecord {
            user: "alice".into(),
            scope: Scope::all(),
        };
        let value = serde_json::to_value(&client).unwrap();
        assert_eq!(value["user"], "alice");
        assert_eq!(value["scope"], "*");
    }
}
