use anyhow::anyhow;
use campusdesk_core::AppError;
use campusdesk_models::audit::ActionKind;
use campusdesk_models::ids::SessionId;
use campusdesk_models::schedules::{
    ConflictDescription, ConflictQueryParams, DayOfWeek, NewSession, ScheduledSession,
    SessionProposal, UpdateSessionDto,
};
use tracing::{info, instrument};

use crate::middleware::auth::Actor;
use crate::modules::audit::recorder::{AuditEvent, record};
use crate::store::CampusStore;

use super::detector::{conflict_error, find_conflicts, validate_window};

#[instrument(skip(store))]
pub async fn list_sessions(
    store: &dyn CampusStore,
    day: Option<DayOfWeek>,
) -> Result<Vec<ScheduledSession>, AppError> {
    store.list_sessions(day).await
}

/// Runs the detector against the stored sessions of the proposal's day.
async fn check(
    store: &dyn CampusStore,
    proposal: &SessionProposal,
    exclude_id: Option<SessionId>,
) -> Result<Vec<ConflictDescription>, AppError> {
    validate_window(proposal.start_time, proposal.end_time)?;
    let existing = store.list_sessions(Some(proposal.day_of_week)).await?;
    Ok(find_conflicts(proposal, &existing, exclude_id))
}

/// The session's subject and class must exist before anything is stored.
async fn check_references(
    store: &dyn CampusStore,
    session: &NewSession,
) -> Result<(), AppError> {
    store
        .find_subject(session.subject_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Subject not found")))?;
    store
        .find_class(session.class_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Class not found")))?;
    Ok(())
}

#[instrument(skip(store))]
pub async fn preview_conflicts(
    store: &dyn CampusStore,
    params: ConflictQueryParams,
) -> Result<Vec<ConflictDescription>, AppError> {
    check(store, &params.as_proposal(), params.exclude_id).await
}

#[instrument(skip(store, actor, dto))]
pub async fn create_session(
    store: &dyn CampusStore,
    actor: &Actor,
    dto: NewSession,
) -> Result<ScheduledSession, AppError> {
    check_references(store, &dto).await?;
    let conflicts = check(store, &dto.as_proposal(), None).await?;
    if !conflicts.is_empty() {
        return Err(conflict_error(&conflicts));
    }

    let session = store.insert_session(&dto).await?;
    info!(session_id = %session.id, "Scheduled session created");

    let event = AuditEvent::new(ActionKind::Create, "Schedule")
        .object(session.id)
        .details(describe(&session));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(session)
}

#[instrument(skip(store, actor, dto))]
pub async fn update_session(
    store: &dyn CampusStore,
    actor: &Actor,
    id: SessionId,
    dto: UpdateSessionDto,
) -> Result<ScheduledSession, AppError> {
    let current = find_session(store, id).await?;
    let merged = dto.merge_into(&current);
    check_references(store, &merged).await?;

    let conflicts = check(store, &merged.as_proposal(), Some(id)).await?;
    if !conflicts.is_empty() {
        return Err(conflict_error(&conflicts));
    }

    let session = store.update_session(id, &merged).await?;

    let event = AuditEvent::new(ActionKind::Update, "Schedule")
        .object(id)
        .details(format!("{} -> {}", describe(&current), describe(&session)));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(session)
}

#[instrument(skip(store, actor))]
pub async fn delete_session(
    store: &dyn CampusStore,
    actor: &Actor,
    id: SessionId,
) -> Result<(), AppError> {
    let session = find_session(store, id).await?;
    store.delete_session(id).await?;

    let event = AuditEvent::new(ActionKind::Delete, "Schedule")
        .object(id)
        .details(describe(&session));
    record(store, Some(&actor.actor_ref()), event, &actor.context).await;

    Ok(())
}

async fn find_session(
    store: &dyn CampusStore,
    id: SessionId,
) -> Result<ScheduledSession, AppError> {
    store
        .find_session(id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Schedule not found")))
}

fn describe(session: &ScheduledSession) -> String {
    format!(
        "class {} on {} {}-{}{}",
        session.class_id,
        session.day_of_week,
        session.start_time.format("%H:%M"),
        session.end_time.format("%H:%M"),
        session
            .room
            .as_deref()
            .map(|r| format!(" in {}", r))
            .unwrap_or_default()
    )
}
