mod common;

use axum::http::StatusCode;
use campusdesk::cli::{add_class, add_subject};
use campusdesk::modules::access::service::{ADMINISTRATOR_ROLE, TEACHER_ROLE};
use common::{TestApp, setup_test_app};
use serde_json::{Value, json};
use uuid::Uuid;

struct Fixture {
    app: TestApp,
    admin: String,
    subject_id: Uuid,
    class_id: Uuid,
    other_class_id: Uuid,
    teacher_id: Uuid,
}

/// Two classes sharing one subject, seeded through the operator commands.
async fn fixture() -> Fixture {
    let app = setup_test_app().await;
    let (_, admin) = app.login_as("scheduler", Some(ADMINISTRATOR_ROLE)).await;

    let store = app.store.as_ref();
    let class = add_class(store, "EE-2026").await.unwrap();
    let other_class = add_class(store, "ME-2026").await.unwrap();
    let subject = add_subject(store, "Circuits", 4, &[class.id, other_class.id])
        .await
        .unwrap();

    Fixture {
        app,
        admin,
        subject_id: subject.id.into_inner(),
        class_id: class.id.into_inner(),
        other_class_id: other_class.id.into_inner(),
        teacher_id: Uuid::new_v4(),
    }
}

fn session(
    subject_id: Uuid,
    class_id: Uuid,
    teacher_id: Option<Uuid>,
    day: &str,
    start: &str,
    end: &str,
    room: Option<&str>,
) -> Value {
    json!({
        "subject_id": subject_id,
        "class_id": class_id,
        "teacher_id": teacher_id,
        "day_of_week": day,
        "start_time": start,
        "end_time": end,
        "room": room,
    })
}

#[tokio::test]
async fn test_create_and_list_sessions() {
    let f = fixture().await;

    let (status, created) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(
                f.subject_id,
                f.class_id,
                Some(f.teacher_id),
                "Monday",
                "09:00:00",
                "10:00:00",
                Some("B-101"),
            ),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["day_of_week"], "Monday");
    assert_eq!(created["room"], "B-101");

    let (status, _) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(f.subject_id, f.other_class_id, None, "Tuesday", "08:00:00", "09:00:00", None),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, all) = f.app.get("/api/schedules", &f.admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["id"], created["id"]);

    let (_, tuesday) = f.app.get("/api/schedules?day_of_week=Tuesday", &f.admin).await;
    assert_eq!(tuesday.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_overlap_reports_every_dimension() {
    let f = fixture().await;

    let (status, _) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(
                f.subject_id,
                f.class_id,
                Some(f.teacher_id),
                "Monday",
                "09:00:00",
                "10:00:00",
                Some("B-101"),
            ),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(
                f.subject_id,
                f.class_id,
                Some(f.teacher_id),
                "Monday",
                "09:30:00",
                "10:30:00",
                Some("B-101"),
            ),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let conflicts = body["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 3);
    assert!(conflicts[0].as_str().unwrap().starts_with("Teacher conflict"));
    assert!(conflicts[1].as_str().unwrap().starts_with("Class conflict"));
    assert!(conflicts[2].as_str().unwrap().starts_with("Room conflict"));
    assert!(body["error"].as_str().unwrap().ends_with("(and 2 more)"));

    let (_, all) = f.app.get("/api/schedules", &f.admin).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_touching_sessions_do_not_conflict() {
    let f = fixture().await;

    for (start, end) in [("09:00:00", "10:00:00"), ("10:00:00", "11:00:00")] {
        let (status, _) = f
            .app
            .post(
                "/api/schedules",
                &f.admin,
                session(
                    f.subject_id,
                    f.class_id,
                    Some(f.teacher_id),
                    "Wednesday",
                    start,
                    end,
                    Some("Lab 2"),
                ),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_same_slot_on_another_day_is_fine() {
    let f = fixture().await;

    for day in ["Thursday", "Friday"] {
        let (status, _) = f
            .app
            .post(
                "/api/schedules",
                &f.admin,
                session(
                    f.subject_id,
                    f.class_id,
                    Some(f.teacher_id),
                    day,
                    "13:00:00",
                    "14:00:00",
                    Some("C-3"),
                ),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_inverted_window_is_unprocessable() {
    let f = fixture().await;

    let (status, body) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(f.subject_id, f.class_id, None, "Monday", "11:00:00", "11:00:00", None),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "End time must be after start time");
}

#[tokio::test]
async fn test_update_excludes_the_session_itself() {
    let f = fixture().await;

    let (_, created) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(
                f.subject_id,
                f.class_id,
                Some(f.teacher_id),
                "Monday",
                "09:00:00",
                "10:00:00",
                Some("B-101"),
            ),
        )
        .await;
    let id = created["id"].as_str().unwrap();

    let (status, updated) = f
        .app
        .put(
            &format!("/api/schedules/{}", id),
            &f.admin,
            json!({ "start_time": "09:30:00", "end_time": "10:30:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["start_time"], "09:30:00");
    assert_eq!(updated["room"], "B-101");
}

#[tokio::test]
async fn test_update_into_another_session_conflicts() {
    let f = fixture().await;

    let (_, _first) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(f.subject_id, f.class_id, None, "Monday", "09:00:00", "10:00:00", None),
        )
        .await;
    let (_, second) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(f.subject_id, f.class_id, None, "Monday", "11:00:00", "12:00:00", None),
        )
        .await;

    let (status, body) = f
        .app
        .put(
            &format!("/api/schedules/{}", second["id"].as_str().unwrap()),
            &f.admin,
            json!({ "start_time": "09:45:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let conflicts = body["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].as_str().unwrap().starts_with("Class conflict"));
}

#[tokio::test]
async fn test_conflict_preview() {
    let f = fixture().await;

    let (_, created) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(
                f.subject_id,
                f.class_id,
                Some(f.teacher_id),
                "Monday",
                "09:00:00",
                "10:00:00",
                Some("B-101"),
            ),
        )
        .await;
    let id = created["id"].as_str().unwrap();

    let uri = format!(
        "/api/schedules/conflicts?day_of_week=Monday&start_time=09:15:00&end_time=09:45:00&room=B-101&teacher_id={}",
        f.teacher_id
    );
    let (status, report) = f.app.get(&uri, &f.admin).await;
    assert_eq!(status, StatusCode::OK);
    let conflicts = report["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 2);
    assert_eq!(conflicts[0]["dimension"], "teacher");
    assert_eq!(conflicts[0]["session_id"], id);
    assert_eq!(conflicts[1]["dimension"], "room");

    let (_, excluded) = f
        .app
        .get(&format!("{}&exclude_id={}", uri, id), &f.admin)
        .await;
    assert_eq!(excluded["conflicts"], json!([]));

    // Preview never stores anything.
    let (_, all) = f.app.get("/api/schedules", &f.admin).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_teacher_can_view_but_not_schedule() {
    let f = fixture().await;
    let (_, teacher) = f.app.login_as("lecturer", Some(TEACHER_ROLE)).await;

    let (status, _) = f.app.get("/api/schedules", &teacher).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = f
        .app
        .post(
            "/api/schedules",
            &teacher,
            session(f.subject_id, f.class_id, None, "Monday", "09:00:00", "10:00:00", None),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "Access denied. Missing required permission: add_schedule"
    );
}

#[tokio::test]
async fn test_delete_session() {
    let f = fixture().await;

    let (_, created) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(f.subject_id, f.class_id, None, "Saturday", "10:00:00", "12:00:00", None),
        )
        .await;
    let uri = format!("/api/schedules/{}", created["id"].as_str().unwrap());

    let (status, _) = f.app.delete(&uri, &f.admin).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = f.app.delete(&uri, &f.admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Schedule not found");

    let (status, _) = f
        .app
        .put(&uri, &f.admin, json!({ "room": "A-1" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_subject_or_class_is_not_found() {
    let f = fixture().await;

    let (status, body) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(Uuid::new_v4(), f.class_id, None, "Monday", "09:00:00", "10:00:00", None),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Subject not found");

    let (status, body) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(f.subject_id, Uuid::new_v4(), None, "Monday", "09:00:00", "10:00:00", None),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Class not found");

    let (_, created) = f
        .app
        .post(
            "/api/schedules",
            &f.admin,
            session(f.subject_id, f.class_id, None, "Monday", "09:00:00", "10:00:00", None),
        )
        .await;
    let (status, body) = f
        .app
        .put(
            &format!("/api/schedules/{}", created["id"].as_str().unwrap()),
            &f.admin,
            json!({ "class_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Class not found");

    let (_, all) = f.app.get("/api/schedules", &f.admin).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
    assert_eq!(all[0]["class_id"], json!(f.class_id));
}
