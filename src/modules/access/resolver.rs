//! Effective permission resolution.
//!
//! A user's effective set is the union of the permissions of every assigned
//! role and the user's custom grants. Nothing can subtract from it. Unknown
//! names resolve to "not granted" rather than an error.

use std::collections::BTreeSet;

use campusdesk_core::AppError;
use campusdesk_models::access::UserAccess;

pub fn effective_permissions(user: &UserAccess) -> BTreeSet<String> {
    user.roles
        .iter()
        .flat_map(|role| role.permissions.iter())
        .chain(user.custom_permissions.iter())
        .cloned()
        .collect()
}

pub fn has_permission(user: &UserAccess, permission: &str) -> bool {
    user.custom_permissions.contains(permission)
        || user
            .roles
            .iter()
            .any(|role| role.permissions.contains(permission))
}

/// Gate used before sensitive operations.
///
/// The error names only the missing permission, never the resource the
/// caller was after, so a denied caller cannot probe for existence.
pub fn require_permission(user: &UserAccess, permission: &str) -> Result<(), AppError> {
    let allowed = has_permission(user, permission);
    crate::metrics::track_authorization_check(allowed, permission);
    if allowed {
        return Ok(());
    }

    tracing::debug!(user_id = %user.user_id, permission, "Permission denied");
    Err(AppError::forbidden(format!(
        "Access denied. Missing required permission: {}",
        permission
    )))
}
