use axum::{
    Router,
    routing::{get, put},
};

use crate::state::AppState;

use super::controller::{
    create_session, delete_session, get_conflicts, get_sessions, update_session,
};

pub fn init_schedules_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_sessions).post(create_session))
        .route("/conflicts", get(get_conflicts))
        .route("/{id}", put(update_session).delete(delete_session))
}
