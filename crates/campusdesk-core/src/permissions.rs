//! The closed permission catalog.
//!
//! Every permission name the system recognises is declared here, once. Roles
//! and per-user grants can only reference names from [`CATALOG`]; anything
//! else is treated as "not granted" by the resolver.
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_core::permissions;
//!
//! if resolver::has_permission(&user, permissions::VIEW_AUDIT_LOG) {
//!     // show the audit trail
//! }
//! ```

/// A catalog entry: the stable name and its default description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionDef {
    pub name: &'static str,
    pub description: &'static str,
}

// =============================================================================
// Students permissions
// =============================================================================

/// Permission to view student records
pub const VIEW_STUDENT: &str = "view_student";
/// Permission to create student records
pub const ADD_STUDENT: &str = "add_student";
/// Permission to modify student records
pub const CHANGE_STUDENT: &str = "change_student";
/// Permission to delete student records
pub const DELETE_STUDENT: &str = "delete_student";

// =============================================================================
// Teachers permissions
// =============================================================================

pub const VIEW_TEACHER: &str = "view_teacher";
pub const ADD_TEACHER: &str = "add_teacher";
pub const CHANGE_TEACHER: &str = "change_teacher";
pub const DELETE_TEACHER: &str = "delete_teacher";

// =============================================================================
// Classes permissions
// =============================================================================

pub const VIEW_CLASS: &str = "view_class";
pub const ADD_CLASS: &str = "add_class";
pub const CHANGE_CLASS: &str = "change_class";
pub const DELETE_CLASS: &str = "delete_class";

// =============================================================================
// Subjects permissions
// =============================================================================

pub const VIEW_SUBJECT: &str = "view_subject";
pub const ADD_SUBJECT: &str = "add_subject";
pub const CHANGE_SUBJECT: &str = "change_subject";
pub const DELETE_SUBJECT: &str = "delete_subject";

// =============================================================================
// Grades permissions
// =============================================================================

/// Permission to view grades, final grades and cohort statistics
pub const VIEW_GRADE: &str = "view_grade";
/// Permission to record grades and define assessments
pub const ADD_GRADE: &str = "add_grade";
/// Permission to edit grades and run final grade recalculation
pub const CHANGE_GRADE: &str = "change_grade";
pub const DELETE_GRADE: &str = "delete_grade";

// =============================================================================
// Payments permissions
// =============================================================================

pub const VIEW_PAYMENT: &str = "view_payment";
pub const ADD_PAYMENT: &str = "add_payment";
pub const CHANGE_PAYMENT: &str = "change_payment";
pub const DELETE_PAYMENT: &str = "delete_payment";

// =============================================================================
// Schedules permissions
// =============================================================================

pub const VIEW_SCHEDULE: &str = "view_schedule";
pub const ADD_SCHEDULE: &str = "add_schedule";
pub const CHANGE_SCHEDULE: &str = "change_schedule";
pub const DELETE_SCHEDULE: &str = "delete_schedule";

// =============================================================================
// Users permissions
// =============================================================================

/// Permission to view users and roles
pub const VIEW_USER: &str = "view_user";
pub const ADD_USER: &str = "add_user";
/// Permission to edit users, roles and their grants
pub const CHANGE_USER: &str = "change_user";
pub const DELETE_USER: &str = "delete_user";

// =============================================================================
// Audit permissions
// =============================================================================

/// Permission to read the audit trail
pub const VIEW_AUDIT_LOG: &str = "view_audit_log";

macro_rules! catalog {
    ($(($name:expr, $description:literal)),* $(,)?) => {
        &[$(PermissionDef { name: $name, description: $description }),*]
    };
}

/// Every recognised permission, in display order.
pub const CATALOG: &[PermissionDef] = catalog![
    (VIEW_STUDENT, "View Student"),
    (ADD_STUDENT, "Add Student"),
    (CHANGE_STUDENT, "Change Student"),
    (DELETE_STUDENT, "Delete Student"),
    (VIEW_TEACHER, "View Teacher"),
    (ADD_TEACHER, "Add Teacher"),
    (CHANGE_TEACHER, "Change Teacher"),
    (DELETE_TEACHER, "Delete Teacher"),
    (VIEW_CLASS, "View Class"),
    (ADD_CLASS, "Add Class"),
    (CHANGE_CLASS, "Change Class"),
    (DELETE_CLASS, "Delete Class"),
    (VIEW_SUBJECT, "View Subject"),
    (ADD_SUBJECT, "Add Subject"),
    (CHANGE_SUBJECT, "Change Subject"),
    (DELETE_SUBJECT, "Delete Subject"),
    (VIEW_GRADE, "View Grade"),
    (ADD_GRADE, "Add Grade"),
    (CHANGE_GRADE, "Change Grade"),
    (DELETE_GRADE, "Delete Grade"),
    (VIEW_PAYMENT, "View Payment"),
    (ADD_PAYMENT, "Add Payment"),
    (CHANGE_PAYMENT, "Change Payment"),
    (DELETE_PAYMENT, "Delete Payment"),
    (VIEW_SCHEDULE, "View Schedule"),
    (ADD_SCHEDULE, "Add Schedule"),
    (CHANGE_SCHEDULE, "Change Schedule"),
    (DELETE_SCHEDULE, "Delete Schedule"),
    (VIEW_USER, "View User"),
    (ADD_USER, "Add User"),
    (CHANGE_USER, "Change User"),
    (DELETE_USER, "Delete User"),
    (VIEW_AUDIT_LOG, "View Audit Log"),
];

/// Whether `name` belongs to the catalog.
pub fn is_known(name: &str) -> bool {
    CATALOG.iter().any(|def| def.name == name)
}

/// Looks up a catalog entry by name.
pub fn find(name: &str) -> Option<&'static PermissionDef> {
    CATALOG.iter().find(|def| def.name == name)
}

/// Permissions granted to the default Teacher role.
pub const TEACHER_DEFAULTS: &[&str] = &[
    VIEW_STUDENT,
    ADD_STUDENT,
    CHANGE_STUDENT,
    VIEW_TEACHER,
    VIEW_CLASS,
    VIEW_SUBJECT,
    VIEW_GRADE,
    ADD_GRADE,
    CHANGE_GRADE,
    VIEW_SCHEDULE,
];

/// Permissions granted to the default Student role.
pub const STUDENT_DEFAULTS: &[&str] = &[VIEW_STUDENT];
