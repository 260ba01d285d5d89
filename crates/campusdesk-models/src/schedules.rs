//! Weekly class sessions and conflict descriptions.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{ClassId, SessionId, SubjectId, TeacherId};
use crate::value_types::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

text_enum!(DayOfWeek, "day of week", {
    Monday => "Monday",
    Tuesday => "Tuesday",
    Wednesday => "Wednesday",
    Thursday => "Thursday",
    Friday => "Friday",
    Saturday => "Saturday",
    Sunday => "Sunday",
});

/// A single weekly recurring, time-boxed class meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ScheduledSession {
    pub id: SessionId,
    pub subject_id: SubjectId,
    pub class_id: ClassId,
    pub teacher_id: Option<TeacherId>,
    #[sqlx(try_from = "String")]
    pub day_of_week: DayOfWeek,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:30:00")]
    pub end_time: NaiveTime,
    pub room: Option<String>,
}

impl ScheduledSession {
    pub fn from_new(id: SessionId, new: &NewSession) -> Self {
        Self {
            id,
            subject_id: new.subject_id,
            class_id: new.class_id,
            teacher_id: new.teacher_id,
            day_of_week: new.day_of_week,
            start_time: new.start_time,
            end_time: new.end_time,
            room: normalize_room(new.room.as_deref()),
        }
    }

    /// The conflict-detection view of this session.
    pub fn as_proposal(&self) -> SessionProposal {
        SessionProposal {
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            teacher_id: self.teacher_id,
            class_id: Some(self.class_id),
            room: self.room.clone(),
        }
    }
}

/// A candidate slot checked by the conflict detector.
///
/// Proposals are plain data: they never carry the session they may replace,
/// which is why updates pass an explicit `exclude_id` to the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionProposal {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub teacher_id: Option<TeacherId>,
    pub class_id: Option<ClassId>,
    pub room: Option<String>,
}

/// Blank room labels mean "no room".
pub fn normalize_room(room: Option<&str>) -> Option<String> {
    room.map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConflictDimension {
    Teacher,
    Class,
    Room,
}

/// One reason a proposal collides with an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConflictDescription {
    pub session_id: SessionId,
    pub dimension: ConflictDimension,
    pub message: String,
}

// DTOs

/// Fields of a session to be created. Also the fully merged form of an update.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewSession {
    pub subject_id: SubjectId,
    pub class_id: ClassId,
    pub teacher_id: Option<TeacherId>,
    pub day_of_week: DayOfWeek,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:30:00")]
    pub end_time: NaiveTime,
    #[validate(length(max = 50, message = "Room must not exceed 50 characters"))]
    pub room: Option<String>,
}

impl NewSession {
    pub fn as_proposal(&self) -> SessionProposal {
        SessionProposal {
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            teacher_id: self.teacher_id,
            class_id: Some(self.class_id),
            room: normalize_room(self.room.as_deref()),
        }
    }
}

/// Partial update; omitted fields keep their stored value.
///
/// `teacher_id` and `room` cannot be cleared through this DTO, only replaced.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSessionDto {
    pub subject_id: Option<SubjectId>,
    pub class_id: Option<ClassId>,
    pub teacher_id: Option<TeacherId>,
    pub day_of_week: Option<DayOfWeek>,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    #[validate(length(max = 50, message = "Room must not exceed 50 characters"))]
    pub room: Option<String>,
}

impl UpdateSessionDto {
    pub fn merge_into(self, current: &ScheduledSession) -> NewSession {
        NewSession {
            subject_id: self.subject_id.unwrap_or(current.subject_id),
            class_id: self.class_id.unwrap_or(current.class_id),
            teacher_id: self.teacher_id.or(current.teacher_id),
            day_of_week: self.day_of_week.unwrap_or(current.day_of_week),
            start_time: self.start_time.unwrap_or(current.start_time),
            end_time: self.end_time.unwrap_or(current.end_time),
            room: self.room.or_else(|| current.room.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionListParams {
    pub day_of_week: Option<DayOfWeek>,
}

/// Query form of a proposal for the conflict preview endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConflictQueryParams {
    pub day_of_week: DayOfWeek,
    #[param(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[param(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
    pub teacher_id: Option<TeacherId>,
    pub class_id: Option<ClassId>,
    pub room: Option<String>,
    /// Session to ignore, typically the one being edited
    pub exclude_id: Option<SessionId>,
}

impl ConflictQueryParams {
    pub fn as_proposal(&self) -> SessionProposal {
        SessionProposal {
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            teacher_id: self.teacher_id,
            class_id: self.class_id,
            room: normalize_room(self.room.as_deref()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConflictReport {
    pub conflicts: Vec<ConflictDescription>,
}
