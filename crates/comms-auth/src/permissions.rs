//! Permission scope matching.

use comms_core::Scope;

/// Capability required to open the comms channel.
pub const STATUS_READ: &str = "status.read";

/// Whether `scope` grants `permission`.
///
/// - An empty permission is always granted.
/// - A list scope grants if any element does; an empty list grants nothing.
/// - `"*"` and an exact match grant.
/// - `"read"` / `"*.read"` grant `read` and any `<name>.read`; likewise for
///   `write`.
pub fn has_permission(scope: &Scope, permission: &str) -> bool {
    if permission.is_empty() {
        return true;
    }
    scope.iter().any(|s| single_grants(s, permission))
}

fn single_grants(scope: &str, permission: &str) -> bool {
    if scope == "*" || scope == permission {
        return true;
    }
    match scope {
        "read" | "*.read" => is_action(permission, "read"),
        "write" | "*.write" => is_action(permission, "write"),
        _ => false,
    }
}

// `read`, or `<non-empty>.read`
fn is_action(permission: &str, action: &str) -> bool {
    if permission == action {
        return true;
    }
    permission
        .strip_suffix(action)
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|prefix| !prefix.is_empty())
}
