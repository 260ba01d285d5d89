use axum::http::{HeaderValue, Method};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable as _};

use crate::docs::ApiDoc;
use crate::logging::logging_middleware;
use crate::metrics::metrics_middleware;
use crate::modules::access::router::init_access_router;
use crate::modules::audit::router::init_audit_router;
use crate::modules::grades::router::{
    init_assessments_router, init_final_grades_router, init_grades_router,
};
use crate::modules::schedules::router::init_schedules_router;
use crate::state::AppState;

pub fn init_router(state: AppState) -> Router {
    let cors = {
        let allowed_origins: Vec<HeaderValue> = state
            .cors_config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
                axum::http::header::ACCEPT,
            ])
            .allow_credentials(true)
    };

    Router::new()
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .nest(
            "/api",
            Router::new()
                .nest("/access", init_access_router())
                .nest("/audit-logs", init_audit_router())
                .nest("/schedules", init_schedules_router())
                .nest("/assessments", init_assessments_router())
                .nest("/grades", init_grades_router())
                .nest("/final-grades", init_final_grades_router()),
        )
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
}
