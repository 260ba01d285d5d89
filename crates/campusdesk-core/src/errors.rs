//! Application error type shared by every layer of campusdesk.
//!
//! [`AppError`] pairs an HTTP status with an [`anyhow::Error`] cause. Services
//! return `Result<T, AppError>` and propagate with `?`; handlers return it
//! directly and axum renders it through [`IntoResponse`].
//!
//! The error body is always JSON:
//!
//! ```json
//! { "error": "Teacher conflict: ...", "conflicts": ["...", "..."] }
//! ```
//!
//! `conflicts` is only present for schedule conflicts so the caller can show
//! every reason at once.

use anyhow::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: Error,
    pub conflicts: Vec<String>,
}

impl AppError {
    pub fn new<E>(status: StatusCode, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            status,
            error: err.into(),
            conflicts: Vec::new(),
        }
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    pub fn not_found<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::NOT_FOUND, err)
    }

    pub fn unprocessable<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, err)
    }

    pub fn bad_request<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::BAD_REQUEST, err)
    }

    pub fn database<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    /// The caller lacks a permission. The message never names the target.
    pub fn forbidden(message: String) -> Self {
        Self::new(StatusCode::FORBIDDEN, anyhow::anyhow!(message))
    }

    pub fn unauthorized(message: String) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, anyhow::anyhow!(message))
    }

    /// A uniqueness rule was violated. Carries no conflict list.
    pub fn already_exists<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::CONFLICT, err)
    }

    /// A schedule proposal collides with existing sessions.
    pub fn conflict(reasons: Vec<String>) -> Self {
        let summary = match reasons.as_slice() {
            [] => "Schedule conflict detected".to_string(),
            [only] => only.clone(),
            [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
        };

        Self {
            status: StatusCode::CONFLICT,
            error: anyhow::anyhow!(summary),
            conflicts: reasons,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status.as_u16(), error = ?self.error, "Request failed");
        }

        let body = if self.conflicts.is_empty() {
            json!({ "error": self.error.to_string() })
        } else {
            json!({
                "error": self.error.to_string(),
                "conflicts": self.conflicts,
            })
        };

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        AppError::internal(err)
    }
}
