use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

use super::controller::{
    assign_role, create_role, delete_role, get_my_permissions, get_permissions, get_roles,
    grant_permission, logout, set_role_permissions, update_permission,
};

pub fn init_access_router() -> Router<AppState> {
    Router::new()
        .route("/me/permissions", get(get_my_permissions))
        .route("/logout", post(logout))
        .route("/permissions", get(get_permissions))
        .route("/permissions/{name}", put(update_permission))
        .route("/roles", get(get_roles).post(create_role))
        .route("/roles/{id}", delete(delete_role))
        .route("/roles/{id}/permissions", put(set_role_permissions))
        .route("/users/{id}/roles", post(assign_role))
        .route("/users/{id}/permissions", post(grant_permission))
}
