use anyhow::anyhow;
use campusdesk_core::AppError;
use campusdesk_core::permissions::{self, CATALOG};
use campusdesk_models::access::{
    CreateRoleDto, EffectivePermissionsResponse, Permission, RoleWithPermissions,
    SetRolePermissionsDto, UpdatePermissionDto, UserAccess,
};
use campusdesk_models::audit::ActionKind;
use campusdesk_models::ids::{RoleId, UserId};
use tracing::{info, instrument};

use crate::middleware::auth::Actor;
use crate::modules::access::resolver::effective_permissions;
use crate::modules::audit::recorder::{AuditEvent, record};
use crate::store::CampusStore;

pub const ADMINISTRATOR_ROLE: &str = "Administrator";
pub const TEACHER_ROLE: &str = "Teacher";
pub const STUDENT_ROLE: &str = "Student";

pub fn my_permissions(access: &UserAccess) -> EffectivePermissionsResponse {
    EffectivePermissionsResponse {
        user_id: access.user_id,
        username: access.username.clone(),
        permissions: effective_permissions(access).into_iter().collect(),
    }
}

#[instrument(skip(store))]
pub async fn list_permissions(store: &dyn CampusStore) -> Result<Vec<Permission>, AppError> {
    store.list_permissions().await
}

#[instrument(skip(store, actor, dto))]
pub async fn update_permission(
    store: &dyn CampusStore,
    actor: &Actor,
    name: &str,
    dto: UpdatePermissionDto,
) -> Result<Permission, AppError> {
    let permission = store
        .update_permission_description(name, &dto.description)
        .await?;

    let event = AuditEvent::new(ActionKind::Update, "Permission")
        .object(&permission.name)
        .details(format!("Description changed to: {}", permission.description));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(permission)
}

#[instrument(skip(store))]
pub async fn list_roles(store: &dyn CampusStore) -> Result<Vec<RoleWithPermissions>, AppError> {
    store.list_roles().await
}

#[instrument(skip(store, actor, dto), fields(role = %dto.name))]
pub async fn create_role(
    store: &dyn CampusStore,
    actor: &Actor,
    dto: CreateRoleDto,
) -> Result<RoleWithPermissions, AppError> {
    if store.find_role_by_name(&dto.name).await?.is_some() {
        return Err(AppError::already_exists(anyhow!(
            "Role '{}' already exists",
            dto.name
        )));
    }

    let role = store
        .create_role(&dto.name, &dto.description, false, &dto.permissions)
        .await?;

    let event = AuditEvent::new(ActionKind::Create, "Role")
        .object(role.role.id)
        .details(format!(
            "Created role {} with permissions: {}",
            role.role.name,
            role.permissions.join(", ")
        ));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(role)
}

#[instrument(skip(store, actor, dto))]
pub async fn set_role_permissions(
    store: &dyn CampusStore,
    actor: &Actor,
    role_id: RoleId,
    dto: SetRolePermissionsDto,
) -> Result<RoleWithPermissions, AppError> {
    let role = store.set_role_permissions(role_id, &dto.permissions).await?;

    let event = AuditEvent::new(ActionKind::Update, "Role")
        .object(role_id)
        .details(format!(
            "Permissions of {} set to: {}",
            role.role.name,
            role.permissions.join(", ")
        ));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(role)
}

#[instrument(skip(store, actor))]
pub async fn delete_role(
    store: &dyn CampusStore,
    actor: &Actor,
    role_id: RoleId,
) -> Result<(), AppError> {
    let role = store
        .find_role(role_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))?;

    store.delete_role(role_id).await?;

    let event = AuditEvent::new(ActionKind::Delete, "Role")
        .object(role_id)
        .details(format!("Deleted role {}", role.role.name));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(())
}

#[instrument(skip(store, actor))]
pub async fn assign_role(
    store: &dyn CampusStore,
    actor: &Actor,
    user_id: UserId,
    role_id: RoleId,
) -> Result<EffectivePermissionsResponse, AppError> {
    let role = store
        .find_role(role_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))?;
    let user = find_user(store, user_id).await?;

    store.assign_role(user_id, role_id).await?;

    let event = AuditEvent::new(ActionKind::Update, "User")
        .object(user_id)
        .details(format!("Assigned role {} to {}", role.role.name, user.username));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    let updated = find_user(store, user_id).await?;
    Ok(my_permissions(&updated))
}

#[instrument(skip(store, actor))]
pub async fn grant_permission(
    store: &dyn CampusStore,
    actor: &Actor,
    user_id: UserId,
    permission: &str,
) -> Result<EffectivePermissionsResponse, AppError> {
    let user = find_user(store, user_id).await?;

    store.grant_custom_permission(user_id, permission).await?;

    let event = AuditEvent::new(ActionKind::Update, "User")
        .object(user_id)
        .details(format!(
            "Granted custom permission {} to {}",
            permission, user.username
        ));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    let updated = find_user(store, user_id).await?;
    Ok(my_permissions(&updated))
}

async fn find_user(store: &dyn CampusStore, user_id: UserId) -> Result<UserAccess, AppError> {
    store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
}

/// Installs the permission catalog and the default roles.
///
/// Safe to run repeatedly: existing permissions and roles are left as they are.
#[instrument(skip(store))]
pub async fn seed_access(store: &dyn CampusStore) -> Result<Vec<String>, AppError> {
    let catalog: Vec<Permission> = CATALOG
        .iter()
        .map(|def| Permission {
            name: def.name.to_string(),
            description: def.description.to_string(),
        })
        .collect();
    store.ensure_permissions(&catalog).await?;

    let all: Vec<&str> = CATALOG.iter().map(|def| def.name).collect();
    let defaults: [(&str, &str, &[&str]); 3] = [
        (ADMINISTRATOR_ROLE, "Full access to every feature", all.as_slice()),
        (
            TEACHER_ROLE,
            "Teaching staff: students, grades and schedules",
            permissions::TEACHER_DEFAULTS,
        ),
        (
            STUDENT_ROLE,
            "Read access to own student record",
            permissions::STUDENT_DEFAULTS,
        ),
    ];

    let mut created = Vec::new();
    for (name, description, perms) in defaults {
        if store.find_role_by_name(name).await?.is_some() {
            continue;
        }
        let perms: Vec<String> = perms.iter().map(|p| p.to_string()).collect();
        store.create_role(name, description, true, &perms).await?;
        info!(role = name, "Created default role");
        created.push(name.to_string());
    }

    Ok(created)
}
