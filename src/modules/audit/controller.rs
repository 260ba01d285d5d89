use axum::{
    Json,
    extract::{Query, State},
};
use campusdesk_core::AppError;
use campusdesk_models::audit::{AuditLogEntry, AuditLogFilter};

use crate::middleware::auth::RequireViewAuditLog;
use crate::state::AppState;

use super::recorder;

#[utoipa::path(
    get,
    path = "/api/audit-logs",
    params(AuditLogFilter),
    responses(
        (status = 200, description = "Most recent matching entries, newest first (at most 100)", body = Vec<AuditLogEntry>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Audit",
    security(("bearer_auth" = []))
)]
pub async fn get_audit_logs(
    State(state): State<AppState>,
    _actor: RequireViewAuditLog,
    Query(filter): Query<AuditLogFilter>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let entries = recorder::recent(state.store.as_ref(), &filter).await?;
    Ok(Json(entries))
}
