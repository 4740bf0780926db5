//! Auth error types.

/// Errors raised while resolving credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential store could not be reached.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    /// The credential store returned a record it could not interpret.
    #[error("malformed credential record: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_display() {
        let err = AuthError::Unavailable("timeout".to_string());
        assert_eq!(err.to_string(), "credential store unavailable: timeout");
    }

    #[test]
    fn malformed_display() {
        let err = AuthError::Malformed("missing user".to_string());
        assert!(err.to_string().contains("missing user"));
    }
}
