//! Operator commands behind `campusdesk-cli`.
//!
//! Each function works on any [`CampusStore`], so the binary runs them against
//! PostgreSQL and the tests against the in-memory store.

use anyhow::anyhow;
use campusdesk_auth::create_access_token;
use campusdesk_config::JwtConfig;
use campusdesk_core::AppError;
use campusdesk_models::academics::{Class, Student, Subject};
use campusdesk_models::access::{ActorRef, UserAccess};
use campusdesk_models::ids::{ClassId, StudentId, SubjectId};
use tracing::{info, warn};

use crate::middleware::auth::RequestContext;
use crate::modules::audit::recorder::{record_failed_login, record_login};
use crate::store::CampusStore;

pub const CLI_USER_AGENT: &str = "campusdesk-cli";

fn cli_context() -> RequestContext {
    RequestContext {
        client_addr: None,
        user_agent: Some(CLI_USER_AGENT.to_string()),
    }
}

/// Creates an account, optionally assigning one role by name.
pub async fn create_user(
    store: &dyn CampusStore,
    username: &str,
    role: Option<&str>,
) -> Result<UserAccess, AppError> {
    let user = store.create_user(username).await?;

    if let Some(role_name) = role {
        let role = store
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Role '{}' not found", role_name)))?;
        store.assign_role(user.user_id, role.id).await?;
        info!(username, role = role_name, "Role assigned");
    }

    store
        .find_user(user.user_id)
        .await?
        .ok_or_else(|| AppError::internal(anyhow!("User vanished after creation")))
}

/// Signs an access token for an existing user and records the login.
///
/// An unknown username is recorded as a failed login attempt.
pub async fn issue_token(
    store: &dyn CampusStore,
    username: &str,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let ctx = cli_context();

    let Some(user) = store.find_user_by_username(username).await? else {
        warn!(username, "Token requested for unknown user");
        record_failed_login(store, username, &ctx).await;
        return Err(AppError::unauthorized(format!(
            "Unknown username: {}",
            username
        )));
    };

    let token = create_access_token(user.user_id.into_inner(), &user.username, jwt_config)?;
    record_login(store, &ActorRef::from(&user), &ctx).await;

    Ok(token)
}

pub async fn add_class(store: &dyn CampusStore, name: &str) -> Result<Class, AppError> {
    let class = Class {
        id: ClassId::new(),
        name: name.to_string(),
    };
    store.upsert_class(&class).await?;
    Ok(class)
}

pub async fn add_subject(
    store: &dyn CampusStore,
    name: &str,
    credit: i32,
    classes: &[ClassId],
) -> Result<Subject, AppError> {
    let subject = Subject {
        id: SubjectId::new(),
        name: name.to_string(),
        credit,
    };
    store.upsert_subject(&subject, classes).await?;
    Ok(subject)
}

pub async fn add_student(
    store: &dyn CampusStore,
    full_name: &str,
    class_id: ClassId,
) -> Result<Student, AppError> {
    let student = Student {
        id: StudentId::new(),
        full_name: full_name.to_string(),
        class_id,
    };
    store.upsert_student(&student).await?;
    Ok(student)
}
