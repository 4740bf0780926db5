//! Inbound client frames and outbound control frames.

use serde_json::Value;

/// Sent after a successful token handshake.
pub const AUTH_OK_FRAME: &str = r#"{"auth":"ok"}"#;

/// Sent before the server closes a connection that failed authentication.
pub const AUTH_FAIL_FRAME: &str = r#"{"auth":"fail"}"#;

/// A decoded client frame.
///
/// Only string-valued, non-empty `auth` and `subscribe` fields are
/// recognized. Anything else (including valid JSON that is not an object)
/// decodes as [`ClientMessage::Unrecognized`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    /// `{"auth": <token>}`, optionally carrying a `subscribe` field too.
    Auth {
        /// Bearer token.
        token: String,
        /// Topic pattern sent alongside the token.
        subscribe: Option<String>,
    },
    /// `{"subscribe": <topic pattern>}`.
    Subscribe(String),
    /// Parseable JSON with neither field.
    Unrecognized,
}

impl ClientMessage {
    /// Decode a text frame. Fails only when the text is not JSON.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }

    /// Classify an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        match (field("auth"), field("subscribe")) {
            (Some(token), subscribe) => Self::Auth { token, subscribe },
            (None, Some(topic)) => Self::Subscribe(topic),
            (None, None) => Self::Unrecognized,
        }
    }

    /// The topic pattern this frame asks to subscribe to, if any.
    pub fn subscribe_topic(&self) -> Option<&str> {
        match self {
            Self::Auth { subscribe, .. } => subscribe.as_deref(),
            Self::Subscribe(topic) => Some(topic),
            Self::Unrecognized => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_auth() {
        let msg = ClientMessage::decode(r#"{"auth":"tok"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Auth {
                token: "tok".into(),
                subscribe: None
            }
        );
        assert_eq!(msg.subscribe_topic(), None);
    }

    #[test]
    fn decode_auth_with_subscribe() {
        let msg = ClientMessage::decode(r#"{"auth":"tok","subscribe":"status/#"}"#).unwrap();
        assert_eq!(msg.subscribe_topic(), Some("status/#"));
        assert!(matches!(msg, ClientMessage::Auth { .. }));
    }

    #[test]
    fn decode_subscribe() {
        let msg = ClientMessage::decode(r#"{"subscribe":"debug"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Subscribe("debug".into()));
        assert_eq!(msg.subscribe_topic(), Some("debug"));
    }

    #[test]
    fn decode_unrecognized_object() {
        assert_eq!(
            ClientMessage::decode(r#"{"hello":"x"}"#).unwrap(),
            ClientMessage::Unrecognized
        );
    }

    #[test]
    fn non_object_json_is_unrecognized() {
        assert_eq!(ClientMessage::decode("42").unwrap(), ClientMessage::Unrecognized);
        assert_eq!(ClientMessage::decode("[1]").unwrap(), ClientMessage::Unrecognized);
        assert_eq!(ClientMessage::decode("null").unwrap(), ClientMessage::Unrecognized);
    }

    #[test]
    fn non_string_or_empty_fields_ignored() {
        assert_eq!(
            ClientMessage::decode(r#"{"auth":1,"subscribe":""}"#).unwrap(),
            ClientMessage::Unrecognized
        );
        assert_eq!(
            ClientMessage::decode(r#"{"auth":"","subscribe":"a"}"#).unwrap(),
            ClientMessage::Subscribe("a".into())
        );
    }

    #[test]
    fn malformed_text_is_error() {
        assert!(ClientMessage::decode("{not json").is_err());
        assert!(ClientMessage::decode("").is_err());
    }

    #[test]
    fn control_frames_are_valid_json() {
        let ok: Value = serde_json::from_str(AUTH_OK_FRAME).unwrap();
        let fail: Value = serde_json::from_str(AUTH_FAIL_FRAME).unwrap();
        assert_eq!(ok["auth"], "ok");
        assert_eq!(fail["auth"], "fail");
    }
}
