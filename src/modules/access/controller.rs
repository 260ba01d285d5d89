use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use campusdesk_core::AppError;
use campusdesk_models::access::{
    AssignRoleDto, CreateRoleDto, EffectivePermissionsResponse, GrantPermissionDto,
    MessageResponse, Permission, RoleWithPermissions, SetRolePermissionsDto, UpdatePermissionDto,
};
use campusdesk_models::ids::{RoleId, UserId};

use crate::middleware::auth::{Actor, RequireChangeUser, RequireViewUser};
use crate::modules::audit::recorder::record_logout;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service;

#[utoipa::path(
    get,
    path = "/api/access/me/permissions",
    responses(
        (status = 200, description = "Effective permissions of the caller", body = EffectivePermissionsResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn get_my_permissions(actor: Actor) -> Json<EffectivePermissionsResponse> {
    Json(service::my_permissions(&actor.access))
}

#[utoipa::path(
    get,
    path = "/api/access/permissions",
    responses(
        (status = 200, description = "The permission catalog", body = Vec<Permission>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn get_permissions(
    State(state): State<AppState>,
    _actor: RequireViewUser,
) -> Result<Json<Vec<Permission>>, AppError> {
    let permissions = service::list_permissions(state.store.as_ref()).await?;
    Ok(Json(permissions))
}

#[utoipa::path(
    put,
    path = "/api/access/permissions/{name}",
    params(("name" = String, Path, description = "Permission name")),
    request_body = UpdatePermissionDto,
    responses(
        (status = 200, description = "Description updated", body = Permission),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Permission not found")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn update_permission(
    State(state): State<AppState>,
    RequireChangeUser(actor): RequireChangeUser,
    Path(name): Path<String>,
    ValidatedJson(dto): ValidatedJson<UpdatePermissionDto>,
) -> Result<Json<Permission>, AppError> {
    let permission = service::update_permission(state.store.as_ref(), &actor, &name, dto).await?;
    Ok(Json(permission))
}

#[utoipa::path(
    get,
    path = "/api/access/roles",
    responses(
        (status = 200, description = "All roles with their permissions", body = Vec<RoleWithPermissions>),
        (status = 403, description = "Forbidden")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn get_roles(
    State(state): State<AppState>,
    _actor: RequireViewUser,
) -> Result<Json<Vec<RoleWithPermissions>>, AppError> {
    let roles = service::list_roles(state.store.as_ref()).await?;
    Ok(Json(roles))
}

#[utoipa::path(
    post,
    path = "/api/access/roles",
    request_body = CreateRoleDto,
    responses(
        (status = 201, description = "Role created", body = RoleWithPermissions),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Role name already taken"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    RequireChangeUser(actor): RequireChangeUser,
    ValidatedJson(dto): ValidatedJson<CreateRoleDto>,
) -> Result<(StatusCode, Json<RoleWithPermissions>), AppError> {
    let role = service::create_role(state.store.as_ref(), &actor, dto).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    put,
    path = "/api/access/roles/{id}/permissions",
    params(("id" = RoleId, Path, description = "Role ID")),
    request_body = SetRolePermissionsDto,
    responses(
        (status = 200, description = "Permission set replaced", body = RoleWithPermissions),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Role not found")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn set_role_permissions(
    State(state): State<AppState>,
    RequireChangeUser(actor): RequireChangeUser,
    Path(id): Path<RoleId>,
    ValidatedJson(dto): ValidatedJson<SetRolePermissionsDto>,
) -> Result<Json<RoleWithPermissions>, AppError> {
    let role = service::set_role_permissions(state.store.as_ref(), &actor, id, dto).await?;
    Ok(Json(role))
}

#[utoipa::path(
    delete,
    path = "/api/access/roles/{id}",
    params(("id" = RoleId, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role deleted", body = MessageResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Role not found")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    RequireChangeUser(actor): RequireChangeUser,
    Path(id): Path<RoleId>,
) -> Result<Json<MessageResponse>, AppError> {
    service::delete_role(state.store.as_ref(), &actor, id).await?;
    Ok(Json(MessageResponse {
        message: "Role deleted successfully".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/access/users/{id}/roles",
    params(("id" = UserId, Path, description = "User ID")),
    request_body = AssignRoleDto,
    responses(
        (status = 200, description = "Role assigned", body = EffectivePermissionsResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User or role not found")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    RequireChangeUser(actor): RequireChangeUser,
    Path(user_id): Path<UserId>,
    ValidatedJson(dto): ValidatedJson<AssignRoleDto>,
) -> Result<Json<EffectivePermissionsResponse>, AppError> {
    let response =
        service::assign_role(state.store.as_ref(), &actor, user_id, dto.role_id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/access/users/{id}/permissions",
    params(("id" = UserId, Path, description = "User ID")),
    request_body = GrantPermissionDto,
    responses(
        (status = 200, description = "Custom permission granted", body = EffectivePermissionsResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Unknown permission")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn grant_permission(
    State(state): State<AppState>,
    RequireChangeUser(actor): RequireChangeUser,
    Path(user_id): Path<UserId>,
    ValidatedJson(dto): ValidatedJson<GrantPermissionDto>,
) -> Result<Json<EffectivePermissionsResponse>, AppError> {
    let response =
        service::grant_permission(state.store.as_ref(), &actor, user_id, &dto.permission).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/access/logout",
    responses(
        (status = 200, description = "Logout recorded", body = MessageResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Access",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    actor: Actor,
) -> Json<MessageResponse> {
    record_logout(state.store.as_ref(), &actor.actor_ref(), &actor.context).await;
    Json(MessageResponse {
        message: "Logged out".to_string(),
    })
}
