use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use campusdesk_core::AppError;
use campusdesk_models::access::MessageResponse;
use campusdesk_models::ids::SessionId;
use campusdesk_models::schedules::{
    ConflictQueryParams, ConflictReport, NewSession, ScheduledSession, SessionListParams,
    UpdateSessionDto,
};

use crate::middleware::auth::{
    RequireAddSchedule, RequireChangeSchedule, RequireDeleteSchedule, RequireViewSchedule,
};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service;

#[utoipa::path(
    get,
    path = "/api/schedules",
    params(SessionListParams),
    responses(
        (status = 200, description = "Scheduled sessions", body = Vec<ScheduledSession>),
        (status = 403, description = "Forbidden")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
pub async fn get_sessions(
    State(state): State<AppState>,
    _actor: RequireViewSchedule,
    Query(params): Query<SessionListParams>,
) -> Result<Json<Vec<ScheduledSession>>, AppError> {
    let sessions = service::list_sessions(state.store.as_ref(), params.day_of_week).await?;
    Ok(Json(sessions))
}

/// Reports conflicts for a proposed slot without saving anything.
#[utoipa::path(
    get,
    path = "/api/schedules/conflicts",
    params(ConflictQueryParams),
    responses(
        (status = 200, description = "Every conflict of the proposed slot", body = ConflictReport),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "End time is not after start time")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
pub async fn get_conflicts(
    State(state): State<AppState>,
    _actor: RequireViewSchedule,
    Query(params): Query<ConflictQueryParams>,
) -> Result<Json<ConflictReport>, AppError> {
    let conflicts = service::preview_conflicts(state.store.as_ref(), params).await?;
    Ok(Json(ConflictReport { conflicts }))
}

#[utoipa::path(
    post,
    path = "/api/schedules",
    request_body = NewSession,
    responses(
        (status = 201, description = "Session scheduled", body = ScheduledSession),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Conflicts with existing sessions"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
pub async fn create_session(
    State(state): State<AppState>,
    RequireAddSchedule(actor): RequireAddSchedule,
    ValidatedJson(dto): ValidatedJson<NewSession>,
) -> Result<(StatusCode, Json<ScheduledSession>), AppError> {
    let session = service::create_session(state.store.as_ref(), &actor, dto).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    put,
    path = "/api/schedules/{id}",
    params(("id" = SessionId, Path, description = "Session ID")),
    request_body = UpdateSessionDto,
    responses(
        (status = 200, description = "Session updated", body = ScheduledSession),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Conflicts with existing sessions")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
pub async fn update_session(
    State(state): State<AppState>,
    RequireChangeSchedule(actor): RequireChangeSchedule,
    Path(id): Path<SessionId>,
    ValidatedJson(dto): ValidatedJson<UpdateSessionDto>,
) -> Result<Json<ScheduledSession>, AppError> {
    let session = service::update_session(state.store.as_ref(), &actor, id, dto).await?;
    Ok(Json(session))
}

#[utoipa::path(
    delete,
    path = "/api/schedules/{id}",
    params(("id" = SessionId, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session deleted", body = MessageResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
pub async fn delete_session(
    State(state): State<AppState>,
    RequireDeleteSchedule(actor): RequireDeleteSchedule,
    Path(id): Path<SessionId>,
) -> Result<Json<MessageResponse>, AppError> {
    service::delete_session(state.store.as_ref(), &actor, id).await?;
    Ok(Json(MessageResponse {
        message: "Schedule deleted successfully".to_string(),
    }))
}
