//! Session identifiers.
//!
//! Every connection is labelled with a random 32-character string drawn from
//! the 62-symbol alphanumeric alphabet. The label only correlates audit and
//! trace output; it is never used to authorize anything, and uniqueness is
//! probabilistic.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Length of a generated session label.
pub const SESSION_ID_LEN: usize = 32;

/// Random per-connection label used for audit correlation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random label.
    #[must_use]
    pub fn new() -> Self {
        Self::with_len(SESSION_ID_LEN)
    }

    /// Generate a random label of `len` alphanumeric characters.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        let label: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Self(label)
    }

    /// Create from an existing string value.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_length_is_32() {
        assert_eq!(SessionId::new().as_str().len(), SESSION_ID_LEN);
    }

    #[test]
    fn only_alphanumeric_characters() {
        for _ in 0..50 {
            let id = SessionId::new();
            assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn consecutive_ids_differ() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn custom_length() {
        assert_eq!(SessionId::with_len(8).as_str().len(), 8);
        assert!(SessionId::with_len(0).as_str().is_empty());
    }

    #[test]
    fn display_matches_inner() {
        let id = SessionId::from_string("abc123".into());
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_ref(), "abc123");
    }

    #[test]
    fn serializes_transparently() {
        let id = SessionId::from_string("xyz".into());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""xyz""#);
    }
}
