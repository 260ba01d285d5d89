//! Role and permission models and DTOs.
//!
//! Access is modelled as three flat set-valued relations: user → roles,
//! role → permissions and user → custom permissions. There is no role
//! hierarchy and no precedence; a user's effective set is the plain union.

use std::collections::BTreeSet;

use crate::ids::{RoleId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Permission {
    /// Stable catalog name, e.g. `view_audit_log`
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
}

/// A role as seen from one user's access profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role_id: RoleId,
    pub name: String,
    pub permissions: BTreeSet<String>,
}

/// Everything the resolver needs to know about a user.
///
/// Loaded fresh from the store for every authorization decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccess {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<RoleGrant>,
    pub custom_permissions: BTreeSet<String>,
}

impl UserAccess {
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            roles: Vec::new(),
            custom_permissions: BTreeSet::new(),
        }
    }

    pub fn with_role<I, S>(mut self, name: &str, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.push(RoleGrant {
            role_id: RoleId::new(),
            name: name.to_string(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_custom<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }
}

/// Identity of the caller attached to audit entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRef {
    pub user_id: UserId,
    pub username: String,
}

impl From<&UserAccess> for ActorRef {
    fn from(access: &UserAccess) -> Self {
        Self {
            user_id: access.user_id,
            username: access.username.clone(),
        }
    }
}

fn validate_permission_names(names: &[String]) -> Result<(), ValidationError> {
    if let Some(unknown) = names
        .iter()
        .find(|n| !campusdesk_core::permissions::is_known(n))
    {
        let mut err = ValidationError::new("unknown_permission");
        err.message = Some(format!("Unknown permission: {}", unknown).into());
        return Err(err);
    }
    Ok(())
}

fn validate_permission_name(name: &str) -> Result<(), ValidationError> {
    validate_permission_names(&[name.to_string()])
}

// DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleDto {
    #[validate(length(
        min = 1,
        max = 50,
        message = "Name must be between 1 and 50 characters"
    ))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description must not exceed 500 characters"))]
    pub description: String,
    #[serde(default)]
    #[validate(custom(function = "validate_permission_names"))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetRolePermissionsDto {
    #[validate(custom(function = "validate_permission_names"))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePermissionDto {
    #[validate(length(max = 500, message = "Description must not exceed 500 characters"))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRoleDto {
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GrantPermissionDto {
    #[validate(custom(function = "validate_permission_name"))]
    pub permission: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EffectivePermissionsResponse {
    pub user_id: UserId,
    pub username: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_role_dto_validation() {
        let valid = CreateRoleDto {
            name: "Registrar".to_string(),
            description: String::new(),
            permissions: vec!["view_student".to_string()],
        };
        assert!(valid.validate().is_ok());

        let empty_name = CreateRoleDto {
            name: String::new(),
            description: String::new(),
            permissions: vec![],
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_unknown_permission_is_rejected() {
        let dto = SetRolePermissionsDto {
            permissions: vec!["view_student".to_string(), "sudo".to_string()],
        };
        let errors = dto.validate().unwrap_err();
        let message = errors.field_errors()["permissions"][0]
            .message
            .clone()
            .unwrap();
        assert_eq!(message, "Unknown permission: sudo");
    }

    #[test]
    fn test_grant_permission_dto() {
        let ok = GrantPermissionDto {
            permission: "view_audit_log".to_string(),
        };
        assert!(ok.validate().is_ok());
        let bad = GrantPermissionDto {
            permission: "view_everything".to_string(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_actor_ref_from_access() {
        let access = UserAccess::new(UserId::new(), "dean");
        let actor = ActorRef::from(&access);
        assert_eq!(actor.username, "dean");
        assert_eq!(actor.user_id, access.user_id);
    }
}
