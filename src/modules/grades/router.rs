use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    calculate_final_grades, create_assessment, create_grade, get_assessments, get_final_grades,
    get_statistics, update_grid,
};

pub fn init_assessments_router() -> Router<AppState> {
    Router::new().route("/", get(get_assessments).post(create_assessment))
}

pub fn init_grades_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_grade))
        .route("/grid", post(update_grid))
}

pub fn init_final_grades_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_final_grades))
        .route("/calculate", post(calculate_final_grades))
        .route("/statistics", get(get_statistics))
}
