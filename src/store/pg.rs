use std::collections::{BTreeMap, HashMap};

use anyhow::anyhow;
use async_trait::async_trait;
use campusdesk_core::AppError;
use campusdesk_db::PgPool;
use campusdesk_models::academics::{Class, Student, Subject};
use campusdesk_models::access::{Permission, Role, RoleGrant, RoleWithPermissions, UserAccess};
use campusdesk_models::audit::{AuditLogEntry, AuditLogFilter, NewAuditLogEntry};
use campusdesk_models::grades::{
    Assessment, CohortKey, CreateAssessmentDto, CreateGradeDto, FinalGrade, FinalGradeFilter,
    FinalGradeUpsert, Grade, GradeUpsert, LetterGrade,
};
use campusdesk_models::ids::{
    AssessmentId, AuditLogId, ClassId, FinalGradeId, GradeId, RoleId, SessionId, StudentId,
    SubjectId, UserId,
};
use campusdesk_models::schedules::{DayOfWeek, NewSession, ScheduledSession, normalize_room};
use sqlx::{Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{AccessStore, AuditStore, GradebookStore, ScheduleStore};
use crate::metrics::track_schedule_conflict;
use crate::modules::grades::aggregation::apply_ranks;

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";
const EXCLUSION_VIOLATION: &str = "23P01";

const SESSION_COLUMNS: &str =
    "id, subject_id, class_id, teacher_id, day_of_week, start_time, end_time, room";
const ASSESSMENT_COLUMNS: &str =
    "id, name, assessment_type, subject_id, class_id, weight, max_score, date";
const GRADE_COLUMNS: &str =
    "id, student_id, subject_id, assessment_id, score, letter_grade, remark";
const FINAL_GRADE_COLUMNS: &str =
    "id, student_id, subject_id, semester, year, final_score, letter_grade, rank";
const AUDIT_COLUMNS: &str = r#"id, user_id, username, action, model_name, object_id, details,
    ip_address, user_agent, "timestamp""#;

/// Maps driver errors, turning constraint violations into 404s and 409s.
fn db_error(action: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| {
        if let Some(db_err) = err.as_database_error() {
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return AppError::already_exists(anyhow!(
                        "Cannot {}: a matching record already exists",
                        action
                    ));
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return AppError::not_found(anyhow!(
                        "Cannot {}: a referenced record does not exist",
                        action
                    ));
                }
                Some(EXCLUSION_VIOLATION) => return overlap_error(db_err.constraint()),
                _ => {}
            }
        }
        AppError::database(anyhow!("Failed to {}: {}", action, err))
    }
}

/// The exclusion constraints only fire when a concurrent write slipped past
/// the detector, so the message names the dimension but not the session.
fn overlap_error(constraint: Option<&str>) -> AppError {
    let (dimension, message) = match constraint {
        Some("scheduled_sessions_teacher_overlap") => (
            "teacher",
            "Teacher conflict: the teacher already has an overlapping session",
        ),
        Some("scheduled_sessions_class_overlap") => (
            "class",
            "Class conflict: the class already has an overlapping session",
        ),
        _ => (
            "room",
            "Room conflict: the room is already booked for an overlapping session",
        ),
    };
    track_schedule_conflict(dimension);
    AppError::conflict(vec![message.to_string()])
}

/// `ILIKE` pattern matching `needle` as a literal substring.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn role_permissions(&self, role_id: RoleId) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar(
            "SELECT permission_name FROM role_permissions WHERE role_id = $1 ORDER BY permission_name",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load role permissions"))
    }

    async fn load_access(&self, user_id: UserId, username: String) -> Result<UserAccess, AppError> {
        let rows: Vec<(RoleId, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT r.id, r.name, rp.permission_name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load user roles"))?;

        let mut grants: BTreeMap<RoleId, RoleGrant> = BTreeMap::new();
        for (role_id, name, permission) in rows {
            let grant = grants.entry(role_id).or_insert_with(|| RoleGrant {
                role_id,
                name,
                permissions: Default::default(),
            });
            if let Some(permission) = permission {
                grant.permissions.insert(permission);
            }
        }

        let custom: Vec<String> =
            sqlx::query_scalar("SELECT permission_name FROM user_permissions WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("load custom permissions"))?;

        let mut access = UserAccess::new(user_id, username);
        access.roles = grants.into_values().collect();
        access.custom_permissions = custom.into_iter().collect();
        Ok(access)
    }
}

#[async_trait]
impl AccessStore for PgStore {
    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        sqlx::query_as::<_, Permission>("SELECT name, description FROM permissions ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list permissions"))
    }

    async fn ensure_permissions(&self, permissions: &[Permission]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
        for permission in permissions {
            sqlx::query(
                "INSERT INTO permissions (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            )
            .bind(&permission.name)
            .bind(&permission.description)
            .execute(&mut *tx)
            .await
            .map_err(db_error("insert permission"))?;
        }
        tx.commit().await.map_err(db_error("commit permissions"))
    }

    async fn update_permission_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Permission, AppError> {
        sqlx::query_as::<_, Permission>(
            "UPDATE permissions SET description = $2 WHERE name = $1 RETURNING name, description",
        )
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update permission"))?
        .ok_or_else(|| AppError::not_found(anyhow!("Permission not found")))
    }

    async fn list_roles(&self) -> Result<Vec<RoleWithPermissions>, AppError> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_default, created_at, updated_at FROM roles ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list roles"))?;

        let pairs: Vec<(RoleId, String)> = sqlx::query_as(
            "SELECT role_id, permission_name FROM role_permissions ORDER BY permission_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list role permissions"))?;

        let mut by_role: HashMap<RoleId, Vec<String>> = HashMap::new();
        for (role_id, permission) in pairs {
            by_role.entry(role_id).or_default().push(permission);
        }

        Ok(roles
            .into_iter()
            .map(|role| RoleWithPermissions {
                permissions: by_role.remove(&role.id).unwrap_or_default(),
                role,
            })
            .collect())
    }

    async fn find_role(&self, id: RoleId) -> Result<Option<RoleWithPermissions>, AppError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_default, created_at, updated_at FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find role"))?;

        match role {
            Some(role) => Ok(Some(RoleWithPermissions {
                permissions: self.role_permissions(role.id).await?,
                role,
            })),
            None => Ok(None),
        }
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_default, created_at, updated_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find role"))
    }

    async fn create_role(
        &self,
        name: &str,
        description: &str,
        is_default: bool,
        permissions: &[String],
    ) -> Result<RoleWithPermissions, AppError> {
        debug!(role = name, "Creating role");
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (id, name, description, is_default)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, is_default, created_at, updated_at
            "#,
        )
        .bind(RoleId::new())
        .bind(name)
        .bind(description)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("create role"))?;

        for permission in permissions {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(role.id)
            .bind(permission)
            .execute(&mut *tx)
            .await
            .map_err(db_error("attach permission"))?;
        }

        tx.commit().await.map_err(db_error("commit role"))?;

        let mut permissions = permissions.to_vec();
        permissions.sort();
        permissions.dedup();
        Ok(RoleWithPermissions { role, permissions })
    }

    async fn set_role_permissions(
        &self,
        id: RoleId,
        permissions: &[String],
    ) -> Result<RoleWithPermissions, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles SET updated_at = NOW() WHERE id = $1
            RETURNING id, name, description, is_default, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("update role"))?
        .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("clear role permissions"))?;

        for permission in permissions {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(permission)
            .execute(&mut *tx)
            .await
            .map_err(db_error("attach permission"))?;
        }

        tx.commit().await.map_err(db_error("commit role"))?;

        let mut permissions = permissions.to_vec();
        permissions.sort();
        permissions.dedup();
        Ok(RoleWithPermissions { role, permissions })
    }

    async fn delete_role(&self, id: RoleId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete role"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Role not found")));
        }
        Ok(())
    }

    async fn create_user(&self, username: &str) -> Result<UserAccess, AppError> {
        let id: UserId =
            sqlx::query_scalar("INSERT INTO users (id, username) VALUES ($1, $2) RETURNING id")
                .bind(UserId::new())
                .bind(username)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("create user"))?;

        Ok(UserAccess::new(id, username))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserAccess>, AppError> {
        let username: Option<String> =
            sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find user"))?;

        match username {
            Some(username) => Ok(Some(self.load_access(id, username).await?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccess>, AppError> {
        let id: Option<UserId> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find user"))?;

        match id {
            Some(id) => Ok(Some(self.load_access(id, username.to_string()).await?)),
            None => Ok(None),
        }
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("assign role"))?;
        Ok(())
    }

    async fn grant_custom_permission(
        &self,
        user_id: UserId,
        permission: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_permissions (user_id, permission_name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(permission)
        .execute(&self.pool)
        .await
        .map_err(db_error("grant permission"))?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append(&self, entry: NewAuditLogEntry) -> Result<AuditLogEntry, AppError> {
        let sql = format!(
            r#"
            INSERT INTO audit_logs (id, user_id, username, action, model_name, object_id,
                                    details, ip_address, user_agent, "timestamp")
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            AUDIT_COLUMNS
        );

        sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(AuditLogId::new())
            .bind(entry.user_id)
            .bind(&entry.username)
            .bind(entry.action.as_str())
            .bind(&entry.model_name)
            .bind(&entry.object_id)
            .bind(&entry.details)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(entry.timestamp)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("write audit log"))
    }

    async fn recent(
        &self,
        filter: &AuditLogFilter,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM audit_logs
            WHERE ($1::text IS NULL OR username ILIKE $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::timestamptz IS NULL OR "timestamp" >= $3)
              AND ($4::timestamptz IS NULL OR "timestamp" <= $4)
            ORDER BY "timestamp" DESC, id DESC
            LIMIT $5
            "#,
            AUDIT_COLUMNS
        );

        let user_pattern = filter
            .user
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(contains_pattern);

        sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(user_pattern)
            .bind(filter.action.map(|a| a.as_str()))
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("read audit log"))
    }
}

#[async_trait]
impl ScheduleStore for PgStore {
    async fn list_sessions(
        &self,
        day: Option<DayOfWeek>,
    ) -> Result<Vec<ScheduledSession>, AppError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM scheduled_sessions
            WHERE ($1::text IS NULL OR day_of_week = $1)
            ORDER BY day_index, start_time
            "#,
            SESSION_COLUMNS
        );

        sqlx::query_as::<_, ScheduledSession>(&sql)
            .bind(day.map(|d| d.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list sessions"))
    }

    async fn find_session(&self, id: SessionId) -> Result<Option<ScheduledSession>, AppError> {
        let sql = format!(
            "SELECT {} FROM scheduled_sessions WHERE id = $1",
            SESSION_COLUMNS
        );
        sqlx::query_as::<_, ScheduledSession>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find session"))
    }

    async fn insert_session(&self, session: &NewSession) -> Result<ScheduledSession, AppError> {
        let sql = format!(
            r#"
            INSERT INTO scheduled_sessions
                (id, subject_id, class_id, teacher_id, day_of_week, start_time, end_time, room)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );

        sqlx::query_as::<_, ScheduledSession>(&sql)
            .bind(SessionId::new())
            .bind(session.subject_id)
            .bind(session.class_id)
            .bind(session.teacher_id)
            .bind(session.day_of_week.as_str())
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(normalize_room(session.room.as_deref()))
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("create session"))
    }

    async fn update_session(
        &self,
        id: SessionId,
        session: &NewSession,
    ) -> Result<ScheduledSession, AppError> {
        let sql = format!(
            r#"
            UPDATE scheduled_sessions
            SET subject_id = $2, class_id = $3, teacher_id = $4, day_of_week = $5,
                start_time = $6, end_time = $7, room = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );

        sqlx::query_as::<_, ScheduledSession>(&sql)
            .bind(id)
            .bind(session.subject_id)
            .bind(session.class_id)
            .bind(session.teacher_id)
            .bind(session.day_of_week.as_str())
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(normalize_room(session.room.as_deref()))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("update session"))?
            .ok_or_else(|| AppError::not_found(anyhow!("Schedule not found")))
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM scheduled_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete session"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Schedule not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl GradebookStore for PgStore {
    async fn upsert_class(&self, class: &Class) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO classes (id, name) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(class.id)
        .bind(&class.name)
        .execute(&self.pool)
        .await
        .map_err(db_error("save class"))?;
        Ok(())
    }

    async fn upsert_subject(
        &self,
        subject: &Subject,
        class_ids: &[ClassId],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        sqlx::query(
            r#"
            INSERT INTO subjects (id, name, credit) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, credit = EXCLUDED.credit
            "#,
        )
        .bind(subject.id)
        .bind(&subject.name)
        .bind(subject.credit)
        .execute(&mut *tx)
        .await
        .map_err(db_error("save subject"))?;

        for class_id in class_ids {
            sqlx::query(
                "INSERT INTO class_subjects (class_id, subject_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(class_id)
            .bind(subject.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("link subject to class"))?;
        }

        tx.commit().await.map_err(db_error("commit subject"))
    }

    async fn upsert_student(&self, student: &Student) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO students (id, full_name, class_id) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET full_name = EXCLUDED.full_name, class_id = EXCLUDED.class_id
            "#,
        )
        .bind(student.id)
        .bind(&student.full_name)
        .bind(student.class_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("save student"))?;
        Ok(())
    }

    async fn find_student(&self, id: StudentId) -> Result<Option<Student>, AppError> {
        sqlx::query_as::<_, Student>("SELECT id, full_name, class_id FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find student"))
    }

    async fn find_class(&self, id: ClassId) -> Result<Option<Class>, AppError> {
        sqlx::query_as::<_, Class>("SELECT id, name FROM classes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find class"))
    }

    async fn find_subject(&self, id: SubjectId) -> Result<Option<Subject>, AppError> {
        sqlx::query_as::<_, Subject>("SELECT id, name, credit FROM subjects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find subject"))
    }

    async fn students_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<Student>, AppError> {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT s.id, s.full_name, s.class_id
            FROM students s
            JOIN class_subjects cs ON cs.class_id = s.class_id
            WHERE cs.subject_id = $1
            ORDER BY s.full_name, s.id
            "#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list students for subject"))
    }

    async fn list_assessments(
        &self,
        subject_id: Option<SubjectId>,
        class_id: Option<ClassId>,
    ) -> Result<Vec<Assessment>, AppError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM assessments
            WHERE ($1::uuid IS NULL OR subject_id = $1)
              AND ($2::uuid IS NULL OR class_id = $2)
            ORDER BY date NULLS LAST, name
            "#,
            ASSESSMENT_COLUMNS
        );

        sqlx::query_as::<_, Assessment>(&sql)
            .bind(subject_id)
            .bind(class_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list assessments"))
    }

    async fn find_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, AppError> {
        let sql = format!("SELECT {} FROM assessments WHERE id = $1", ASSESSMENT_COLUMNS);
        sqlx::query_as::<_, Assessment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find assessment"))
    }

    async fn insert_assessment(&self, dto: &CreateAssessmentDto) -> Result<Assessment, AppError> {
        let sql = format!(
            r#"
            INSERT INTO assessments
                (id, name, assessment_type, subject_id, class_id, weight, max_score, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            ASSESSMENT_COLUMNS
        );

        sqlx::query_as::<_, Assessment>(&sql)
            .bind(AssessmentId::new())
            .bind(&dto.name)
            .bind(dto.assessment_type.as_str())
            .bind(dto.subject_id)
            .bind(dto.class_id)
            .bind(dto.weight)
            .bind(dto.max_score)
            .bind(dto.date)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("create assessment"))
    }

    async fn insert_grade(
        &self,
        dto: &CreateGradeDto,
        letter_grade: LetterGrade,
    ) -> Result<Grade, AppError> {
        let sql = format!(
            r#"
            INSERT INTO grades
                (id, student_id, subject_id, assessment_id, score, letter_grade, remark)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            GRADE_COLUMNS
        );

        sqlx::query_as::<_, Grade>(&sql)
            .bind(GradeId::new())
            .bind(dto.student_id)
            .bind(dto.subject_id)
            .bind(dto.assessment_id)
            .bind(dto.score)
            .bind(letter_grade.as_str())
            .bind(&dto.remark)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("record grade"))
    }

    async fn upsert_grade(&self, grade: &GradeUpsert) -> Result<Grade, AppError> {
        let sql = format!(
            r#"
            INSERT INTO grades
                (id, student_id, subject_id, assessment_id, score, letter_grade, remark)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (student_id, assessment_id) DO UPDATE
            SET subject_id = EXCLUDED.subject_id,
                score = EXCLUDED.score,
                letter_grade = EXCLUDED.letter_grade,
                remark = EXCLUDED.remark,
                updated_at = NOW()
            RETURNING {}
            "#,
            GRADE_COLUMNS
        );

        sqlx::query_as::<_, Grade>(&sql)
            .bind(GradeId::new())
            .bind(grade.student_id)
            .bind(grade.subject_id)
            .bind(grade.assessment_id)
            .bind(grade.score)
            .bind(grade.letter_grade.as_str())
            .bind(&grade.remark)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("save grade"))
    }

    async fn grades_for_student(
        &self,
        student_id: StudentId,
        subject_id: SubjectId,
    ) -> Result<Vec<Grade>, AppError> {
        let sql = format!(
            "SELECT {} FROM grades WHERE student_id = $1 AND subject_id = $2",
            GRADE_COLUMNS
        );
        sqlx::query_as::<_, Grade>(&sql)
            .bind(student_id)
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("load grades"))
    }

    async fn list_final_grades(
        &self,
        filter: &FinalGradeFilter,
    ) -> Result<Vec<FinalGrade>, AppError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM final_grades
            WHERE ($1::uuid IS NULL OR subject_id = $1)
              AND ($2::text IS NULL OR semester = $2)
              AND ($3::int IS NULL OR year = $3)
            ORDER BY subject_id, year, semester, rank NULLS LAST, student_id
            "#,
            FINAL_GRADE_COLUMNS
        );

        sqlx::query_as::<_, FinalGrade>(&sql)
            .bind(filter.subject_id)
            .bind(&filter.semester)
            .bind(filter.year)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list final grades"))
    }

    async fn store_cohort_results(
        &self,
        key: &CohortKey,
        results: &[FinalGradeUpsert],
    ) -> Result<Vec<FinalGrade>, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
        lock_cohort(&mut tx, key).await?;

        let mut touched = Vec::with_capacity(results.len());
        for result in results {
            let id: FinalGradeId = sqlx::query_scalar(
                r#"
                INSERT INTO final_grades
                    (id, student_id, subject_id, semester, year, final_score, letter_grade)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (student_id, subject_id, semester, year) DO UPDATE
                SET final_score = EXCLUDED.final_score,
                    letter_grade = EXCLUDED.letter_grade,
                    updated_at = NOW()
                RETURNING id
                "#,
            )
            .bind(FinalGradeId::new())
            .bind(result.student_id)
            .bind(key.subject_id)
            .bind(&key.semester)
            .bind(key.year)
            .bind(result.final_score)
            .bind(result.letter_grade.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("save final grade"))?;
            touched.push(id);
        }

        let mut cohort = rank_in_place(&mut tx, key).await?;
        tx.commit().await.map_err(db_error("commit final grades"))?;

        cohort.retain(|g| touched.contains(&g.id));
        Ok(cohort)
    }

    async fn rerank_cohort(&self, key: &CohortKey) -> Result<Vec<FinalGrade>, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
        lock_cohort(&mut tx, key).await?;
        let cohort = rank_in_place(&mut tx, key).await?;
        tx.commit().await.map_err(db_error("commit ranks"))?;
        Ok(cohort)
    }
}

/// Serialises concurrent writes to the same cohort until the transaction ends.
async fn lock_cohort(
    tx: &mut Transaction<'_, Postgres>,
    key: &CohortKey,
) -> Result<(), AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key.to_string())
        .execute(&mut **tx)
        .await
        .map_err(db_error("lock cohort"))?;
    Ok(())
}

/// Recomputes and stores the ranks of every row in the cohort.
/// Returns the cohort ordered by rank.
async fn rank_in_place(
    tx: &mut Transaction<'_, Postgres>,
    key: &CohortKey,
) -> Result<Vec<FinalGrade>, AppError> {
    let sql = format!(
        r#"
        SELECT {}
        FROM final_grades
        WHERE subject_id = $1 AND semester = $2 AND year = $3
        "#,
        FINAL_GRADE_COLUMNS
    );
    let mut cohort = sqlx::query_as::<_, FinalGrade>(&sql)
        .bind(key.subject_id)
        .bind(&key.semester)
        .bind(key.year)
        .fetch_all(&mut **tx)
        .await
        .map_err(db_error("load cohort"))?;

    apply_ranks(&mut cohort);
    let (ids, positions): (Vec<Uuid>, Vec<i32>) = cohort
        .iter()
        .filter_map(|g| g.rank.map(|rank| (g.id.into_inner(), rank)))
        .unzip();

    sqlx::query(
        r#"
        UPDATE final_grades f
        SET rank = r.rank
        FROM UNNEST($1::uuid[], $2::int[]) AS r(id, rank)
        WHERE f.id = r.id
        "#,
    )
    .bind(&ids)
    .bind(&positions)
    .execute(&mut **tx)
    .await
    .map_err(db_error("rank cohort"))?;

    cohort.sort_by_key(|g| g.rank);
    Ok(cohort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("reg"), "%reg%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_overlap_error_names_dimension() {
        let err = overlap_error(Some("scheduled_sessions_teacher_overlap"));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert!(err.conflicts[0].starts_with("Teacher conflict"));

        let err = overlap_error(Some("scheduled_sessions_room_overlap"));
        assert!(err.conflicts[0].starts_with("Room conflict"));
    }
}
