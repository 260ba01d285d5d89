//! Persistence ports.
//!
//! Services talk to storage only through these traits. [`pg::PgStore`] is the
//! production adapter; [`memory::MemoryStore`] backs unit and router tests.
//!
//! Every method returns [`AppError`] so adapters can report "not found" and
//! "conflict" with the right status directly.

use async_trait::async_trait;
use campusdesk_core::AppError;
use campusdesk_models::academics::{Class, Student, Subject};
use campusdesk_models::access::{Permission, Role, RoleWithPermissions, UserAccess};
use campusdesk_models::audit::{AuditLogEntry, AuditLogFilter, NewAuditLogEntry};
use campusdesk_models::grades::{
    Assessment, CohortKey, CreateAssessmentDto, CreateGradeDto, FinalGrade, FinalGradeFilter,
    FinalGradeUpsert, Grade, GradeUpsert, LetterGrade,
};
use campusdesk_models::ids::{
    AssessmentId, ClassId, RoleId, SessionId, StudentId, SubjectId, UserId,
};
use campusdesk_models::schedules::{DayOfWeek, NewSession, ScheduledSession};

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod pg;

#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError>;

    /// Inserts catalog entries that are missing. Existing descriptions are kept.
    async fn ensure_permissions(&self, permissions: &[Permission]) -> Result<(), AppError>;

    async fn update_permission_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Permission, AppError>;

    async fn list_roles(&self) -> Result<Vec<RoleWithPermissions>, AppError>;

    async fn find_role(&self, id: RoleId) -> Result<Option<RoleWithPermissions>, AppError>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError>;

    async fn create_role(
        &self,
        name: &str,
        description: &str,
        is_default: bool,
        permissions: &[String],
    ) -> Result<RoleWithPermissions, AppError>;

    /// Replaces the role's permission set.
    async fn set_role_permissions(
        &self,
        id: RoleId,
        permissions: &[String],
    ) -> Result<RoleWithPermissions, AppError>;

    /// Removes the role and its assignments. Permissions are untouched.
    async fn delete_role(&self, id: RoleId) -> Result<(), AppError>;

    async fn create_user(&self, username: &str) -> Result<UserAccess, AppError>;

    /// Loads a user's roles and custom permissions.
    async fn find_user(&self, id: UserId) -> Result<Option<UserAccess>, AppError>;

    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<UserAccess>, AppError>;

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), AppError>;

    async fn grant_custom_permission(
        &self,
        user_id: UserId,
        permission: &str,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: NewAuditLogEntry) -> Result<AuditLogEntry, AppError>;

    /// Newest first, at most `limit` entries.
    async fn recent(
        &self,
        filter: &AuditLogFilter,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, AppError>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// All sessions, or only those on `day`, ordered by day and start time.
    async fn list_sessions(
        &self,
        day: Option<DayOfWeek>,
    ) -> Result<Vec<ScheduledSession>, AppError>;

    async fn find_session(&self, id: SessionId) -> Result<Option<ScheduledSession>, AppError>;

    /// Persists a new session. A storage-level overlap is reported as a conflict.
    async fn insert_session(&self, session: &NewSession) -> Result<ScheduledSession, AppError>;

    async fn update_session(
        &self,
        id: SessionId,
        session: &NewSession,
    ) -> Result<ScheduledSession, AppError>;

    async fn delete_session(&self, id: SessionId) -> Result<(), AppError>;
}

#[async_trait]
pub trait GradebookStore: Send + Sync {
    async fn upsert_class(&self, class: &Class) -> Result<(), AppError>;

    /// Stores the subject and the classes that take it.
    async fn upsert_subject(&self, subject: &Subject, class_ids: &[ClassId])
    -> Result<(), AppError>;

    async fn upsert_student(&self, student: &Student) -> Result<(), AppError>;

    async fn find_student(&self, id: StudentId) -> Result<Option<Student>, AppError>;

    async fn find_class(&self, id: ClassId) -> Result<Option<Class>, AppError>;

    async fn find_subject(&self, id: SubjectId) -> Result<Option<Subject>, AppError>;

    /// Students of every class associated with the subject.
    async fn students_for_subject(&self, subject_id: SubjectId)
    -> Result<Vec<Student>, AppError>;

    async fn list_assessments(
        &self,
        subject_id: Option<SubjectId>,
        class_id: Option<ClassId>,
    ) -> Result<Vec<Assessment>, AppError>;

    async fn find_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, AppError>;

    async fn insert_assessment(&self, dto: &CreateAssessmentDto) -> Result<Assessment, AppError>;

    async fn insert_grade(
        &self,
        dto: &CreateGradeDto,
        letter_grade: LetterGrade,
    ) -> Result<Grade, AppError>;

    /// Creates or replaces the grade for (student, assessment).
    async fn upsert_grade(&self, grade: &GradeUpsert) -> Result<Grade, AppError>;

    async fn grades_for_student(
        &self,
        student_id: StudentId,
        subject_id: SubjectId,
    ) -> Result<Vec<Grade>, AppError>;

    async fn list_final_grades(&self, filter: &FinalGradeFilter)
    -> Result<Vec<FinalGrade>, AppError>;

    /// Upserts the computed results for a cohort and re-ranks the whole cohort.
    ///
    /// Rows for students absent from `results` are kept and still ranked.
    /// Returns the upserted rows with their new ranks.
    async fn store_cohort_results(
        &self,
        key: &CohortKey,
        results: &[FinalGradeUpsert],
    ) -> Result<Vec<FinalGrade>, AppError>;

    /// Recomputes the ranks of the stored cohort rows without touching scores.
    /// Returns every row of the cohort ordered by rank.
    async fn rerank_cohort(&self, key: &CohortKey) -> Result<Vec<FinalGrade>, AppError>;
}

/// The full persistence surface the application state holds.
pub trait CampusStore: AccessStore + AuditStore + ScheduleStore + GradebookStore {}

impl<T> CampusStore for T where T: AccessStore + AuditStore + ScheduleStore + GradebookStore {}
