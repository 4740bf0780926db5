//! Audit trail for connection lifecycle and authentication.

use crate::identity::UserRecord;
use crate::ids::SessionId;

/// Target every audit event is emitted under.
pub const AUDIT_TARGET: &str = "comms::audit";

/// Emit an audit event such as `comms.open` or `comms.auth.fail`.
///
/// `session` and `user` are recorded as fields when known.
pub fn audit(event: &str, session: Option<&SessionId>, user: Option<&UserRecord>) {
    let session = session.map(SessionId::as_str);
    let user = user.map(|u| u.username.as_str());
    tracing::info!(target: AUDIT_TARGET, event, session, user, "audit");
}
