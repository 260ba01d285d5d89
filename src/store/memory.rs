//! In-process store for tests.
//!
//! Mirrors the uniqueness and overlap guarantees of the PostgreSQL schema so
//! service and router tests exercise the same failure paths without a
//! database. All state sits behind one `RwLock`, which also makes the
//! schedule re-check atomic with the write.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use campusdesk_core::AppError;
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
use campusdesk_models::schedules::{DayOfWeek, NewSession, ScheduledSession};
use chrono::Utc;
use tokio::sync::RwLock;

use super::{AccessStore, AuditStore, GradebookStore, ScheduleStore};
use crate::modules::grades::aggregation::apply_ranks;
use crate::modules::schedules::detector::{conflict_error, find_conflicts};

#[derive(Default)]
struct Inner {
    permissions: Vec<Permission>,
    roles: Vec<Role>,
    role_permissions: HashMap<RoleId, BTreeSet<String>>,
    users: Vec<(UserId, String)>,
    user_roles: HashMap<UserId, Vec<RoleId>>,
    user_permissions: HashMap<UserId, BTreeSet<String>>,
    audit: Vec<AuditLogEntry>,
    sessions: Vec<ScheduledSession>,
    classes: HashMap<ClassId, Class>,
    subjects: HashMap<SubjectId, Subject>,
    class_subjects: HashMap<SubjectId, Vec<ClassId>>,
    students: HashMap<StudentId, Student>,
    assessments: Vec<Assessment>,
    grades: Vec<Grade>,
    final_grades: Vec<FinalGrade>,
}

impl Inner {
    fn role_with_permissions(&self, role: &Role) -> RoleWithPermissions {
        RoleWithPermissions {
            role: role.clone(),
            permissions: self
                .role_permissions
                .get(&role.id)
                .map(|p| p.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    fn user_access(&self, user_id: UserId, username: &str) -> UserAccess {
        let mut access = UserAccess::new(user_id, username);
        for role_id in self.user_roles.get(&user_id).into_iter().flatten() {
            if let Some(role) = self.roles.iter().find(|r| r.id == *role_id) {
                access.roles.push(RoleGrant {
                    role_id: role.id,
                    name: role.name.clone(),
                    permissions: self
                        .role_permissions
                        .get(&role.id)
                        .cloned()
                        .unwrap_or_default(),
                });
            }
        }
        if let Some(custom) = self.user_permissions.get(&user_id) {
            access.custom_permissions = custom.clone();
        }
        access
    }

    fn same_day(&self, day: DayOfWeek) -> Vec<ScheduledSession> {
        self.sessions
            .iter()
            .filter(|s| s.day_of_week == day)
            .cloned()
            .collect()
    }
}

fn in_cohort(key: &CohortKey, grade: &FinalGrade) -> bool {
    grade.subject_id == key.subject_id && grade.semester == key.semester && grade.year == key.year
}

fn day_order(day: DayOfWeek) -> usize {
    DayOfWeek::ALL
        .iter()
        .position(|d| *d == day)
        .unwrap_or(usize::MAX)
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
    fail_audit_writes: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            fail_audit_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent audit append fail, as if the log table were down.
    pub fn set_audit_failure(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        let inner = self.inner.read().await;
        let mut permissions = inner.permissions.clone();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }

    async fn ensure_permissions(&self, permissions: &[Permission]) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        for permission in permissions {
            if !inner.permissions.iter().any(|p| p.name == permission.name) {
                inner.permissions.push(permission.clone());
            }
        }
        Ok(())
    }

    async fn update_permission_description(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Permission, AppError> {
        let mut inner = self.inner.write().await;
        let permission = inner
            .permissions
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| AppError::not_found(anyhow!("Permission not found")))?;
        permission.description = description.to_string();
        Ok(permission.clone())
    }

    async fn list_roles(&self) -> Result<Vec<RoleWithPermissions>, AppError> {
        let inner = self.inner.read().await;
        let mut roles: Vec<RoleWithPermissions> = inner
            .roles
            .iter()
            .map(|r| inner.role_with_permissions(r))
            .collect();
        roles.sort_by(|a, b| a.role.name.cmp(&b.role.name));
        Ok(roles)
    }

    async fn find_role(&self, id: RoleId) -> Result<Option<RoleWithPermissions>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .roles
            .iter()
            .find(|r| r.id == id)
            .map(|r| inner.role_with_permissions(r)))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn create_role(
        &self,
        name: &str,
        description: &str,
        is_default: bool,
        permissions: &[String],
    ) -> Result<RoleWithPermissions, AppError> {
        let mut inner = self.inner.write().await;
        if inner.roles.iter().any(|r| r.name == name) {
            return Err(AppError::already_exists(anyhow!(
                "Role '{}' already exists",
                name
            )));
        }

        let now = Utc::now();
        let role = Role {
            id: RoleId::new(),
            name: name.to_string(),
            description: description.to_string(),
            is_default,
            created_at: now,
            updated_at: now,
        };
        inner
            .role_permissions
            .insert(role.id, permissions.iter().cloned().collect());
        inner.roles.push(role.clone());
        Ok(inner.role_with_permissions(&role))
    }

    async fn set_role_permissions(
        &self,
        id: RoleId,
        permissions: &[String],
    ) -> Result<RoleWithPermissions, AppError> {
        let mut inner = self.inner.write().await;
        let role = inner
            .roles
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))?;
        role.updated_at = Utc::now();
        let role = role.clone();

        inner
            .role_permissions
            .insert(id, permissions.iter().cloned().collect());
        Ok(inner.role_with_permissions(&role))
    }

    async fn delete_role(&self, id: RoleId) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let before = inner.roles.len();
        inner.roles.retain(|r| r.id != id);
        if inner.roles.len() == before {
            return Err(AppError::not_found(anyhow!("Role not found")));
        }
        inner.role_permissions.remove(&id);
        for roles in inner.user_roles.values_mut() {
            roles.retain(|r| *r != id);
        }
        Ok(())
    }

    async fn create_user(&self, username: &str) -> Result<UserAccess, AppError> {
        let mut inner = self.inner.write().await;
        if inner.users.iter().any(|(_, name)| name == username) {
            return Err(AppError::already_exists(anyhow!(
                "User '{}' already exists",
                username
            )));
        }
        let id = UserId::new();
        inner.users.push((id, username.to_string()));
        Ok(UserAccess::new(id, username))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserAccess>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .find(|(user_id, _)| *user_id == id)
            .map(|(user_id, name)| inner.user_access(*user_id, name)))
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccess>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .find(|(_, name)| name == username)
            .map(|(user_id, name)| inner.user_access(*user_id, name)))
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let roles = inner.user_roles.entry(user_id).or_default();
        if !roles.contains(&role_id) {
            roles.push(role_id);
        }
        Ok(())
    }

    async fn grant_custom_permission(
        &self,
        user_id: UserId,
        permission: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner
            .user_permissions
            .entry(user_id)
            .or_default()
            .insert(permission.to_string());
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, entry: NewAuditLogEntry) -> Result<AuditLogEntry, AppError> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(AppError::database(anyhow!("audit log unavailable")));
        }
        let entry = entry.into_entry(AuditLogId::new());
        self.inner.write().await.audit.push(entry.clone());
        Ok(entry)
    }

    async fn recent(
        &self,
        filter: &AuditLogFilter,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .audit
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn list_sessions(
        &self,
        day: Option<DayOfWeek>,
    ) -> Result<Vec<ScheduledSession>, AppError> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<ScheduledSession> = inner
            .sessions
            .iter()
            .filter(|s| day.is_none_or(|d| d == s.day_of_week))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| (day_order(s.day_of_week), s.start_time));
        Ok(sessions)
    }

    async fn find_session(&self, id: SessionId) -> Result<Option<ScheduledSession>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_session(&self, session: &NewSession) -> Result<ScheduledSession, AppError> {
        let mut inner = self.inner.write().await;
        let conflicts = find_conflicts(
            &session.as_proposal(),
            &inner.same_day(session.day_of_week),
            None,
        );
        if !conflicts.is_empty() {
            return Err(conflict_error(&conflicts));
        }

        let stored = ScheduledSession::from_new(SessionId::new(), session);
        inner.sessions.push(stored.clone());
        Ok(stored)
    }

    async fn update_session(
        &self,
        id: SessionId,
        session: &NewSession,
    ) -> Result<ScheduledSession, AppError> {
        let mut inner = self.inner.write().await;
        let conflicts = find_conflicts(
            &session.as_proposal(),
            &inner.same_day(session.day_of_week),
            Some(id),
        );
        if !conflicts.is_empty() {
            return Err(conflict_error(&conflicts));
        }

        let slot = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::not_found(anyhow!("Schedule not found")))?;
        *slot = ScheduledSession::from_new(id, session);
        Ok(slot.clone())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|s| s.id != id);
        if inner.sessions.len() == before {
            return Err(AppError::not_found(anyhow!("Schedule not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl GradebookStore for MemoryStore {
    async fn upsert_class(&self, class: &Class) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .classes
            .insert(class.id, class.clone());
        Ok(())
    }

    async fn upsert_subject(
        &self,
        subject: &Subject,
        class_ids: &[ClassId],
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.subjects.insert(subject.id, subject.clone());
        let classes = inner.class_subjects.entry(subject.id).or_default();
        for class_id in class_ids {
            if !classes.contains(class_id) {
                classes.push(*class_id);
            }
        }
        Ok(())
    }

    async fn upsert_student(&self, student: &Student) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .students
            .insert(student.id, student.clone());
        Ok(())
    }

    async fn find_student(&self, id: StudentId) -> Result<Option<Student>, AppError> {
        Ok(self.inner.read().await.students.get(&id).cloned())
    }

    async fn find_class(&self, id: ClassId) -> Result<Option<Class>, AppError> {
        Ok(self.inner.read().await.classes.get(&id).cloned())
    }

    async fn find_subject(&self, id: SubjectId) -> Result<Option<Subject>, AppError> {
        Ok(self.inner.read().await.subjects.get(&id).cloned())
    }

    async fn students_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<Student>, AppError> {
        let inner = self.inner.read().await;
        let classes = inner
            .class_subjects
            .get(&subject_id)
            .cloned()
            .unwrap_or_default();
        let mut students: Vec<Student> = inner
            .students
            .values()
            .filter(|s| classes.contains(&s.class_id))
            .cloned()
            .collect();
        students.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(students)
    }

    async fn list_assessments(
        &self,
        subject_id: Option<SubjectId>,
        class_id: Option<ClassId>,
    ) -> Result<Vec<Assessment>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .assessments
            .iter()
            .filter(|a| subject_id.is_none_or(|s| s == a.subject_id))
            .filter(|a| class_id.is_none_or(|c| c == a.class_id))
            .cloned()
            .collect())
    }

    async fn find_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.assessments.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_assessment(&self, dto: &CreateAssessmentDto) -> Result<Assessment, AppError> {
        let assessment = Assessment {
            id: AssessmentId::new(),
            name: dto.name.clone(),
            assessment_type: dto.assessment_type,
            subject_id: dto.subject_id,
            class_id: dto.class_id,
            weight: dto.weight,
            max_score: dto.max_score,
            date: dto.date,
        };
        self.inner
            .write()
            .await
            .assessments
            .push(assessment.clone());
        Ok(assessment)
    }

    async fn insert_grade(
        &self,
        dto: &CreateGradeDto,
        letter_grade: LetterGrade,
    ) -> Result<Grade, AppError> {
        let mut inner = self.inner.write().await;
        if let Some(assessment_id) = dto.assessment_id {
            if inner
                .grades
                .iter()
                .any(|g| g.student_id == dto.student_id && g.assessment_id == Some(assessment_id))
            {
                return Err(AppError::already_exists(anyhow!(
                    "Grade already exists for this student and assessment"
                )));
            }
        }

        let grade = Grade {
            id: GradeId::new(),
            student_id: dto.student_id,
            subject_id: dto.subject_id,
            assessment_id: dto.assessment_id,
            score: dto.score,
            letter_grade,
            remark: dto.remark.clone(),
        };
        inner.grades.push(grade.clone());
        Ok(grade)
    }

    async fn upsert_grade(&self, upsert: &GradeUpsert) -> Result<Grade, AppError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.grades.iter_mut().find(|g| {
            g.student_id == upsert.student_id && g.assessment_id == Some(upsert.assessment_id)
        }) {
            existing.subject_id = upsert.subject_id;
            existing.score = upsert.score;
            existing.letter_grade = upsert.letter_grade;
            existing.remark = upsert.remark.clone();
            return Ok(existing.clone());
        }

        let grade = Grade {
            id: GradeId::new(),
            student_id: upsert.student_id,
            subject_id: upsert.subject_id,
            assessment_id: Some(upsert.assessment_id),
            score: upsert.score,
            letter_grade: upsert.letter_grade,
            remark: upsert.remark.clone(),
        };
        inner.grades.push(grade.clone());
        Ok(grade)
    }

    async fn grades_for_student(
        &self,
        student_id: StudentId,
        subject_id: SubjectId,
    ) -> Result<Vec<Grade>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .grades
            .iter()
            .filter(|g| g.student_id == student_id && g.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn list_final_grades(
        &self,
        filter: &FinalGradeFilter,
    ) -> Result<Vec<FinalGrade>, AppError> {
        let inner = self.inner.read().await;
        let mut grades: Vec<FinalGrade> = inner
            .final_grades
            .iter()
            .filter(|g| filter.matches(g))
            .cloned()
            .collect();
        grades.sort_by(|a, b| {
            (a.subject_id, a.year, &a.semester)
                .cmp(&(b.subject_id, b.year, &b.semester))
                .then_with(|| a.rank.unwrap_or(i32::MAX).cmp(&b.rank.unwrap_or(i32::MAX)))
                .then_with(|| a.student_id.cmp(&b.student_id))
        });
        Ok(grades)
    }

    async fn store_cohort_results(
        &self,
        key: &CohortKey,
        results: &[FinalGradeUpsert],
    ) -> Result<Vec<FinalGrade>, AppError> {
        let mut inner = self.inner.write().await;

        let mut touched = Vec::with_capacity(results.len());
        for result in results {
            let existing = inner
                .final_grades
                .iter_mut()
                .find(|g| in_cohort(key, g) && g.student_id == result.student_id);
            let id = match existing {
                Some(grade) => {
                    grade.final_score = result.final_score;
                    grade.letter_grade = result.letter_grade;
                    grade.id
                }
                None => {
                    let id = FinalGradeId::new();
                    inner.final_grades.push(FinalGrade {
                        id,
                        student_id: result.student_id,
                        subject_id: key.subject_id,
                        semester: key.semester.clone(),
                        year: key.year,
                        final_score: result.final_score,
                        letter_grade: result.letter_grade,
                        rank: None,
                    });
                    id
                }
            };
            touched.push(id);
        }

        let mut stored = rerank(&mut inner, key);
        stored.retain(|g| touched.contains(&g.id));
        Ok(stored)
    }

    async fn rerank_cohort(&self, key: &CohortKey) -> Result<Vec<FinalGrade>, AppError> {
        let mut inner = self.inner.write().await;
        Ok(rerank(&mut inner, key))
    }
}

/// Rewrites the ranks of one cohort and returns its rows ordered by rank.
fn rerank(inner: &mut Inner, key: &CohortKey) -> Vec<FinalGrade> {
    let mut cohort: Vec<FinalGrade> = inner
        .final_grades
        .iter()
        .filter(|g| in_cohort(key, g))
        .cloned()
        .collect();
    apply_ranks(&mut cohort);

    for grade in inner.final_grades.iter_mut() {
        if let Some(ranked) = cohort.iter().find(|g| g.id == grade.id) {
            grade.rank = ranked.rank;
        }
    }

    cohort.sort_by_key(|g| g.rank);
    cohort
}
