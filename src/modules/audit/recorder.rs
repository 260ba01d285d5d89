//! Audit trail recording.
//!
//! Recording is fire-and-forget from the caller's side: it is awaited inline
//! right after the state change, but a storage failure is only logged and
//! counted. The audited action has already happened and stays committed.

use campusdesk_core::AppError;
use campusdesk_models::access::ActorRef;
use campusdesk_models::audit::{
    AUDIT_PAGE_SIZE, ActionKind, AuditLogEntry, AuditLogFilter, NewAuditLogEntry,
};
use chrono::Utc;
use tracing::{error, instrument};

use crate::metrics::track_audit_write_failure;
use crate::middleware::auth::RequestContext;
use crate::store::AuditStore;

/// What happened and to which object.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub action: ActionKind,
    pub model_name: &'static str,
    pub object_id: Option<String>,
    pub details: String,
}

impl AuditEvent {
    pub fn new(action: ActionKind, model_name: &'static str) -> Self {
        Self {
            action,
            model_name,
            object_id: None,
            details: String::new(),
        }
    }

    pub fn object(mut self, id: impl ToString) -> Self {
        self.object_id = Some(id.to_string());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

pub async fn record<S>(
    store: &S,
    actor: Option<&ActorRef>,
    event: AuditEvent,
    ctx: &RequestContext,
) where
    S: AuditStore + ?Sized,
{
    let model_name = event.model_name;
    let action = event.action;
    let entry = NewAuditLogEntry {
        user_id: actor.map(|a| a.user_id),
        username: actor.map(|a| a.username.clone()),
        action: event.action,
        model_name: event.model_name.to_string(),
        object_id: event.object_id,
        details: event.details,
        ip_address: ctx.client_addr.clone(),
        user_agent: ctx.user_agent.clone(),
        timestamp: Utc::now(),
    };

    if let Err(err) = store.append(entry).await {
        error!(
            error = ?err.error,
            action = %action,
            model = model_name,
            "Failed to write audit log entry"
        );
        track_audit_write_failure(model_name);
    }
}

/// A rejected login. There is no authenticated actor, so the attempted
/// username only appears in the details.
pub async fn record_failed_login<S>(store: &S, username: &str, ctx: &RequestContext)
where
    S: AuditStore + ?Sized,
{
    let event = AuditEvent::new(ActionKind::Login, "User")
        .details(format!("Failed login attempt for username: {}", username));
    record(store, None, event, ctx).await;
}

pub async fn record_login<S>(store: &S, actor: &ActorRef, ctx: &RequestContext)
where
    S: AuditStore + ?Sized,
{
    let event = AuditEvent::new(ActionKind::Login, "User")
        .object(actor.user_id)
        .details("User logged in successfully");
    record(store, Some(actor), event, ctx).await;
}

pub async fn record_logout<S>(store: &S, actor: &ActorRef, ctx: &RequestContext)
where
    S: AuditStore + ?Sized,
{
    let event = AuditEvent::new(ActionKind::Logout, "User")
        .object(actor.user_id)
        .details("User logged out");
    record(store, Some(actor), event, ctx).await;
}

/// Filtered, newest-first view of the trail, capped at [`AUDIT_PAGE_SIZE`].
#[instrument(skip(store))]
pub async fn recent<S>(store: &S, filter: &AuditLogFilter) -> Result<Vec<AuditLogEntry>, AppError>
where
    S: AuditStore + ?Sized,
{
    store.recent(filter, AUDIT_PAGE_SIZE).await
}
