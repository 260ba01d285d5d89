use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use campusdesk_core::AppError;
use campusdesk_models::grades::{
    Assessment, AssessmentListParams, CalculateFinalGradesDto, CalculateFinalGradesResponse,
    CreateAssessmentDto, CreateGradeDto, FinalGrade, FinalGradeFilter, Grade, GradeStatistics,
    GridUpdateDto, GridUpdateResponse,
};

use crate::middleware::auth::{RequireAddGrade, RequireChangeGrade, RequireViewGrade};
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service;

#[utoipa::path(
    get,
    path = "/api/assessments",
    params(AssessmentListParams),
    responses(
        (status = 200, description = "Assessments", body = Vec<Assessment>),
        (status = 403, description = "Forbidden")
    ),
    tag = "Grades",
    security(("bearer_auth" = []))
)]
pub async fn get_assessments(
    State(state): State<AppState>,
    _actor: RequireViewGrade,
    Query(params): Query<AssessmentListParams>,
) -> Result<Json<Vec<Assessment>>, AppError> {
    let assessments = service::list_assessments(state.store.as_ref(), params).await?;
    Ok(Json(assessments))
}

#[utoipa::path(
    post,
    path = "/api/assessments",
    request_body = CreateAssessmentDto,
    responses(
        (status = 201, description = "Assessment created", body = Assessment),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Subject not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Grades",
    security(("bearer_auth" = []))
)]
pub async fn create_assessment(
    State(state): State<AppState>,
    RequireAddGrade(actor): RequireAddGrade,
    ValidatedJson(dto): ValidatedJson<CreateAssessmentDto>,
) -> Result<(StatusCode, Json<Assessment>), AppError> {
    let assessment = service::create_assessment(state.store.as_ref(), &actor, dto).await?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

#[utoipa::path(
    post,
    path = "/api/grades",
    request_body = CreateGradeDto,
    responses(
        (status = 201, description = "Grade recorded", body = Grade),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Student or assessment not found"),
        (status = 409, description = "A grade for this student and assessment already exists"),
        (status = 422, description = "Score out of range")
    ),
    tag = "Grades",
    security(("bearer_auth" = []))
)]
pub async fn create_grade(
    State(state): State<AppState>,
    RequireAddGrade(actor): RequireAddGrade,
    ValidatedJson(dto): ValidatedJson<CreateGradeDto>,
) -> Result<(StatusCode, Json<Grade>), AppError> {
    let grade = service::create_grade(state.store.as_ref(), &actor, dto).await?;
    Ok((StatusCode::CREATED, Json(grade)))
}

#[utoipa::path(
    post,
    path = "/api/grades/grid",
    request_body = GridUpdateDto,
    responses(
        (status = 200, description = "Saved grades and skipped entries", body = GridUpdateResponse),
        (status = 403, description = "Forbidden")
    ),
    tag = "Grades",
    security(("bearer_auth" = []))
)]
pub async fn update_grid(
    State(state): State<AppState>,
    RequireChangeGrade(actor): RequireChangeGrade,
    ValidatedJson(dto): ValidatedJson<GridUpdateDto>,
) -> Result<Json<GridUpdateResponse>, AppError> {
    let response = service::update_grid(state.store.as_ref(), &actor, dto).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/final-grades/calculate",
    request_body = CalculateFinalGradesDto,
    responses(
        (status = 200, description = "Final grades recomputed and ranked", body = CalculateFinalGradesResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Subject not found")
    ),
    tag = "Grades",
    security(("bearer_auth" = []))
)]
pub async fn calculate_final_grades(
    State(state): State<AppState>,
    RequireChangeGrade(actor): RequireChangeGrade,
    ValidatedJson(dto): ValidatedJson<CalculateFinalGradesDto>,
) -> Result<Json<CalculateFinalGradesResponse>, AppError> {
    let response = service::calculate_final_grades(state.store.as_ref(), &actor, dto).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/final-grades",
    params(FinalGradeFilter),
    responses(
        (status = 200, description = "Final grades", body = Vec<FinalGrade>),
        (status = 403, description = "Forbidden")
    ),
    tag = "Grades",
    security(("bearer_auth" = []))
)]
pub async fn get_final_grades(
    State(state): State<AppState>,
    _actor: RequireViewGrade,
    Query(filter): Query<FinalGradeFilter>,
) -> Result<Json<Vec<FinalGrade>>, AppError> {
    let grades = service::list_final_grades(state.store.as_ref(), filter).await?;
    Ok(Json(grades))
}

#[utoipa::path(
    get,
    path = "/api/final-grades/statistics",
    params(FinalGradeFilter),
    responses(
        (status = 200, description = "Cohort statistics", body = GradeStatistics),
        (status = 403, description = "Forbidden")
    ),
    tag = "Grades",
    security(("bearer_auth" = []))
)]
pub async fn get_statistics(
    State(state): State<AppState>,
    _actor: RequireViewGrade,
    Query(filter): Query<FinalGradeFilter>,
) -> Result<Json<GradeStatistics>, AppError> {
    let stats = service::statistics(state.store.as_ref(), filter).await?;
    Ok(Json(stats))
}
