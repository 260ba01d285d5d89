use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use campusdesk_auth::{Claims, verify_token};
use campusdesk_core::{AppError, permissions};
use campusdesk_models::access::{ActorRef, UserAccess};
use campusdesk_models::ids::UserId;

use crate::state::AppState;

/// Extractor that validates the bearer JWT and provides its claims.
///
/// Tokens carry identity only. Permissions are resolved from the store on
/// every request, see [`Actor`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> Result<UserId, AppError> {
        self.0
            .user_id()
            .map(UserId::from_uuid)
            .ok_or_else(|| AppError::unauthorized("Invalid user ID in token".to_string()))
    }

    pub fn username(&self) -> &str {
        &self.0.username
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authorization header".to_string()))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::unauthorized("Invalid authorization header format".to_string())
        })?;

        let claims = verify_token(token, &state.jwt_config)?;

        Ok(AuthUser(claims))
    }
}

/// Client provenance attached to audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub client_addr: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let client_addr = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            client_addr,
            user_agent,
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// An authenticated caller with freshly loaded access data.
#[derive(Debug, Clone)]
pub struct Actor {
    pub access: UserAccess,
    pub context: RequestContext,
}

impl Actor {
    pub fn actor_ref(&self) -> ActorRef {
        ActorRef::from(&self.access)
    }
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = AuthUser::from_request_parts(parts, state).await?;
        let user_id = auth_user.user_id()?;

        let access = state
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("User no longer exists".to_string()))?;

        Ok(Actor {
            access,
            context: RequestContext::from_parts(parts),
        })
    }
}

/// Declares an extractor that resolves the caller and requires one permission.
#[macro_export]
macro_rules! require_permission {
    ($name:ident, $permission:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub $crate::middleware::auth::Actor);

        impl axum::extract::FromRequestParts<$crate::state::AppState> for $name {
            type Rejection = campusdesk_core::AppError;

            async fn from_request_parts(
                parts: &mut axum::http::request::Parts,
                state: &$crate::state::AppState,
            ) -> Result<Self, Self::Rejection> {
                let actor = <$crate::middleware::auth::Actor as axum::extract::FromRequestParts<
                    $crate::state::AppState,
                >>::from_request_parts(parts, state)
                .await?;

                $crate::modules::access::resolver::require_permission(&actor.access, $permission)?;

                Ok($name(actor))
            }
        }
    };
}

// Users and roles
require_permission!(RequireViewUser, permissions::VIEW_USER);
require_permission!(RequireChangeUser, permissions::CHANGE_USER);

// Audit
require_permission!(RequireViewAuditLog, permissions::VIEW_AUDIT_LOG);

// Schedules
require_permission!(RequireViewSchedule, permissions::VIEW_SCHEDULE);
require_permission!(RequireAddSchedule, permissions::ADD_SCHEDULE);
require_permission!(RequireChangeSchedule, permissions::CHANGE_SCHEDULE);
require_permission!(RequireDeleteSchedule, permissions::DELETE_SCHEDULE);

// Grades
require_permission!(RequireViewGrade, permissions::VIEW_GRADE);
require_permission!(RequireAddGrade, permissions::ADD_GRADE);
require_permission!(RequireChangeGrade, permissions::CHANGE_GRADE);
