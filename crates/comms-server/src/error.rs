//! Server error types.

use comms_auth::AuthError;

/// Errors surfaced by the comms service and server.
#[derive(Debug, thiserror::Error)]
pub enum CommsError {
    /// Binding the listen socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The heartbeat keep-alive window is zero.
    #[error("keep-alive window must be non-zero")]
    InvalidKeepAlive,

    /// The credential store failed during startup.
    #[error("credential store error: {0}")]
    Auth(#[from] AuthError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_display() {
        let err = CommsError::Bind {
            addr: "127.0.0.1:1880".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:1880: in use");
    }

    #[test]
    fn auth_error_conversion() {
        let err: CommsError = AuthError::Unavailable("down".into()).into();
        assert!(matches!(err, CommsError::Auth(_)));
        assert!(err.to_string().contains("down"));
    }
}
