use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use campusdesk_models::access::{
    AssignRoleDto, CreateRoleDto, EffectivePermissionsResponse, GrantPermissionDto,
    MessageResponse, Permission, Role, RoleWithPermissions, SetRolePermissionsDto,
    UpdatePermissionDto,
};
use campusdesk_models::audit::{ActionKind, AuditLogEntry};
use campusdesk_models::grades::{
    Assessment, AssessmentType, CalculateFinalGradesDto, CalculateFinalGradesResponse,
    CreateAssessmentDto, CreateGradeDto, FinalGrade, Grade, GradeStatistics, GridEntry,
    GridUpdateDto, GridUpdateResponse, LetterGrade, SkippedEntry,
};
use campusdesk_models::schedules::{
    ConflictDescription, ConflictDimension, ConflictReport, DayOfWeek, NewSession,
    ScheduledSession, UpdateSessionDto,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::access::controller::get_my_permissions,
        crate::modules::access::controller::logout,
        crate::modules::access::controller::get_permissions,
        crate::modules::access::controller::update_permission,
        crate::modules::access::controller::get_roles,
        crate::modules::access::controller::create_role,
        crate::modules::access::controller::set_role_permissions,
        crate::modules::access::controller::delete_role,
        crate::modules::access::controller::assign_role,
        crate::modules::access::controller::grant_permission,
        crate::modules::audit::controller::get_audit_logs,
        crate::modules::schedules::controller::get_sessions,
        crate::modules::schedules::controller::get_conflicts,
        crate::modules::schedules::controller::create_session,
        crate::modules::schedules::controller::update_session,
        crate::modules::schedules::controller::delete_session,
        crate::modules::grades::controller::get_assessments,
        crate::modules::grades::controller::create_assessment,
        crate::modules::grades::controller::create_grade,
        crate::modules::grades::controller::update_grid,
        crate::modules::grades::controller::calculate_final_grades,
        crate::modules::grades::controller::get_final_grades,
        crate::modules::grades::controller::get_statistics,
    ),
    components(
        schemas(
            Permission,
            Role,
            RoleWithPermissions,
            CreateRoleDto,
            SetRolePermissionsDto,
            UpdatePermissionDto,
            AssignRoleDto,
            GrantPermissionDto,
            EffectivePermissionsResponse,
            MessageResponse,
            ActionKind,
            AuditLogEntry,
            DayOfWeek,
            ScheduledSession,
            NewSession,
            UpdateSessionDto,
            ConflictDimension,
            ConflictDescription,
            ConflictReport,
            AssessmentType,
            Assessment,
            CreateAssessmentDto,
            LetterGrade,
            Grade,
            CreateGradeDto,
            GridEntry,
            GridUpdateDto,
            SkippedEntry,
            GridUpdateResponse,
            FinalGrade,
            CalculateFinalGradesDto,
            CalculateFinalGradesResponse,
            GradeStatistics,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Access", description = "Roles, permissions and effective access"),
        (name = "Audit", description = "Audit trail"),
        (name = "Schedules", description = "Weekly class sessions and conflict checks"),
        (name = "Grades", description = "Assessments, grades, final grades and rankings")
    ),
    info(
        title = "campusdesk API",
        version = "0.1.0",
        description = "University administration backend: access control, audit trail, scheduling and grading.",
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_is_documented() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/api/access/me/permissions",
            "/api/access/roles/{id}/permissions",
            "/api/audit-logs",
            "/api/schedules/conflicts",
            "/api/schedules/{id}",
            "/api/grades/grid",
            "/api/final-grades/statistics",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {}",
                expected
            );
        }
        assert!(
            doc.components
                .as_ref()
                .unwrap()
                .security_schemes
                .contains_key("bearer_auth")
        );
    }
}
