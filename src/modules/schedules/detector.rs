//! Schedule conflict detection.
//!
//! Sessions are half-open intervals `[start, end)` on a weekday, so a session
//! ending at 10:00 and one starting at 10:00 do not collide. The detector is
//! pure: it reports every collision and leaves the decision to the caller.

use campusdesk_core::AppError;
use campusdesk_models::ids::SessionId;
use campusdesk_models::schedules::{
    ConflictDescription, ConflictDimension, ScheduledSession, SessionProposal,
};
use chrono::NaiveTime;

/// Rejects empty and inverted windows before any conflict check runs.
pub fn validate_window(start: NaiveTime, end: NaiveTime) -> Result<(), AppError> {
    if start >= end {
        return Err(AppError::unprocessable(anyhow::anyhow!(
            "End time must be after start time"
        )));
    }
    Ok(())
}

pub fn overlaps(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn find_conflicts(
    candidate: &SessionProposal,
    existing: &[ScheduledSession],
    exclude_id: Option<SessionId>,
) -> Vec<ConflictDescription> {
    let mut conflicts = Vec::new();

    for session in existing {
        if Some(session.id) == exclude_id
            || session.day_of_week != candidate.day_of_week
            || !overlaps(
                candidate.start_time,
                candidate.end_time,
                session.start_time,
                session.end_time,
            )
        {
            continue;
        }

        let slot = format!(
            "{} {}-{}",
            session.day_of_week,
            session.start_time.format("%H:%M"),
            session.end_time.format("%H:%M")
        );

        if let Some(teacher) = candidate.teacher_id.filter(|t| session.teacher_id == Some(*t)) {
            conflicts.push(ConflictDescription {
                session_id: session.id,
                dimension: ConflictDimension::Teacher,
                message: format!(
                    "Teacher conflict: teacher {} already teaches session {} on {}",
                    teacher, session.id, slot
                ),
            });
        }

        if candidate.class_id == Some(session.class_id) {
            conflicts.push(ConflictDescription {
                session_id: session.id,
                dimension: ConflictDimension::Class,
                message: format!(
                    "Class conflict: class {} already has session {} on {}",
                    session.class_id, session.id, slot
                ),
            });
        }

        if let Some(room) = candidate
            .room
            .as_deref()
            .filter(|r| session.room.as_deref() == Some(*r))
        {
            conflicts.push(ConflictDescription {
                session_id: session.id,
                dimension: ConflictDimension::Room,
                message: format!(
                    "Room conflict: room {} is already booked for session {} on {}",
                    room, session.id, slot
                ),
            });
        }
    }

    conflicts
}

/// Turns detector output into the 409 error callers return.
pub fn conflict_error(conflicts: &[ConflictDescription]) -> AppError {
    for conflict in conflicts {
        let dimension = match conflict.dimension {
            ConflictDimension::Teacher => "teacher",
            ConflictDimension::Class => "class",
            ConflictDimension::Room => "room",
        };
        crate::metrics::track_schedule_conflict(dimension);
    }
    AppError::conflict(conflicts.iter().map(|c| c.message.clone()).collect())
}
