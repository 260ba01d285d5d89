mod common;

use axum::http::{Method, StatusCode};
use campusdesk::modules::access::service::{ADMINISTRATOR_ROLE, STUDENT_ROLE, TEACHER_ROLE};
use common::setup_test_app;
use serde_json::json;

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = setup_test_app().await;
    let (status, body) = app
        .request(Method::GET, "/api/access/me/permissions", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_token_for_deleted_user_is_rejected() {
    let app = setup_test_app().await;
    let token = campusdesk::campusdesk_auth::create_access_token(
        uuid::Uuid::new_v4(),
        "ghost",
        &app.jwt_config,
    )
    .unwrap();
    let (status, body) = app.get("/api/access/me/permissions", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "User no longer exists");
}

#[tokio::test]
async fn test_my_permissions_reflect_role() {
    let app = setup_test_app().await;
    let (_, token) = app.login_as("s.adeyemi", Some(STUDENT_ROLE)).await;

    let (status, body) = app.get("/api/access/me/permissions", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "s.adeyemi");
    assert_eq!(body["permissions"], json!(["view_student"]));
}

#[tokio::test]
async fn test_student_cannot_list_roles() {
    let app = setup_test_app().await;
    let (_, token) = app.login_as("student", Some(STUDENT_ROLE)).await;

    let (status, body) = app.get("/api/access/roles", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "Access denied. Missing required permission: view_user"
    );
}

#[tokio::test]
async fn test_admin_creates_role_and_assigns_it() {
    let app = setup_test_app().await;
    let (_, admin) = app.login_as("admin", Some(ADMINISTRATOR_ROLE)).await;
    let (clerk, clerk_token) = app.login_as("clerk", None).await;

    let (status, _) = app.get("/api/audit-logs", &clerk_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, role) = app
        .post(
            "/api/access/roles",
            &admin,
            json!({
                "name": "Auditor",
                "description": "Reads the audit trail",
                "permissions": ["view_audit_log"]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(role["permissions"], json!(["view_audit_log"]));
    assert_eq!(role["is_default"], false);

    let (status, effective) = app
        .post(
            &format!("/api/access/users/{}/roles", clerk.user_id),
            &admin,
            json!({ "role_id": role["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(effective["permissions"], json!(["view_audit_log"]));

    // Takes effect on the very next request with the same token.
    let (status, _) = app.get("/api/audit-logs", &clerk_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_role_name_conflicts() {
    let app = setup_test_app().await;
    let (_, admin) = app.login_as("admin", Some(ADMINISTRATOR_ROLE)).await;

    let (status, body) = app
        .post("/api/access/roles", &admin, json!({ "name": TEACHER_ROLE }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Role 'Teacher' already exists");
}

#[tokio::test]
async fn test_unknown_permission_is_rejected() {
    let app = setup_test_app().await;
    let (_, admin) = app.login_as("admin", Some(ADMINISTRATOR_ROLE)).await;
    let (clerk, _) = app.login_as("clerk", None).await;

    let (status, body) = app
        .post(
            &format!("/api/access/users/{}/permissions", clerk.user_id),
            &admin,
            json!({ "permission": "launch_rockets" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Unknown permission: launch_rockets");
}

#[tokio::test]
async fn test_custom_grant_unions_with_roles() {
    let app = setup_test_app().await;
    let (_, admin) = app.login_as("admin", Some(ADMINISTRATOR_ROLE)).await;
    let (teacher, teacher_token) = app.login_as("teacher", Some(TEACHER_ROLE)).await;

    let (status, body) = app
        .post(
            &format!("/api/access/users/{}/permissions", teacher.user_id),
            &admin,
            json!({ "permission": "add_schedule" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let permissions: Vec<String> = serde_json::from_value(body["permissions"].clone()).unwrap();
    assert!(permissions.contains(&"add_schedule".to_string()));
    assert!(permissions.contains(&"view_grade".to_string()));

    let (_, mine) = app.get("/api/access/me/permissions", &teacher_token).await;
    assert_eq!(mine["permissions"], body["permissions"]);
}

#[tokio::test]
async fn test_deleting_role_revokes_its_permissions() {
    let app = setup_test_app().await;
    let (_, admin) = app.login_as("admin", Some(ADMINISTRATOR_ROLE)).await;
    let (_, teacher_token) = app.login_as("teacher", Some(TEACHER_ROLE)).await;

    let (_, roles) = app.get("/api/access/roles", &admin).await;
    let teacher_role = roles
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == TEACHER_ROLE)
        .unwrap()
        .clone();

    let (status, _) = app
        .delete(&format!("/api/access/roles/{}", teacher_role["id"].as_str().unwrap()), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, mine) = app.get("/api/access/me/permissions", &teacher_token).await;
    assert_eq!(mine["permissions"], json!([]));

    let (status, _) = app
        .delete(&format!("/api/access/roles/{}", teacher_role["id"].as_str().unwrap()), &admin)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_permission_description_update() {
    let app = setup_test_app().await;
    let (_, admin) = app.login_as("admin", Some(ADMINISTRATOR_ROLE)).await;

    let (status, body) = app
        .put(
            "/api/access/permissions/view_audit_log",
            &admin,
            json!({ "description": "Read the audit trail" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Read the audit trail");

    let (status, _) = app
        .put(
            "/api/access/permissions/not_a_permission",
            &admin,
            json!({ "description": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_body_field_is_bad_request() {
    let app = setup_test_app().await;
    let (_, admin) = app.login_as("admin", Some(ADMINISTRATOR_ROLE)).await;

    let (status, body) = app
        .post("/api/access/roles", &admin, json!({ "permissions": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name is required");
}
