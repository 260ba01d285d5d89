mod common;

use axum::http::StatusCode;
use campusdesk::campusdesk_models::academics::{Class, Student, Subject};
use campusdesk::campusdesk_models::grades::CohortKey;
use campusdesk::cli::{add_class, add_student, add_subject};
use campusdesk::modules::access::service::{ADMINISTRATOR_ROLE, STUDENT_ROLE, TEACHER_ROLE};
use campusdesk::modules::grades::service::rerank_cohort;
use common::{TestApp, setup_test_app};
use serde_json::{Value, json};

struct Cohort {
    app: TestApp,
    admin: String,
    class: Class,
    subject: Subject,
    alice: Student,
    bob: Student,
    carol: Student,
    quiz: Value,
    exam: Value,
}

fn close(value: &Value, expected: f64) -> bool {
    (value.as_f64().unwrap() - expected).abs() < 1e-9
}

/// Three graded students and one without grades in a single class.
async fn cohort() -> Cohort {
    let app = setup_test_app().await;
    let (_, admin) = app.login_as("registrar", Some(ADMINISTRATOR_ROLE)).await;

    let store = app.store.as_ref();
    let class = add_class(store, "CS-2026").await.unwrap();
    let subject = add_subject(store, "Algorithms", 3, &[class.id]).await.unwrap();
    let alice = add_student(store, "Alice Okafor", class.id).await.unwrap();
    let bob = add_student(store, "Bob Mensah", class.id).await.unwrap();
    let carol = add_student(store, "Carol Nwosu", class.id).await.unwrap();
    add_student(store, "Dave Idris", class.id).await.unwrap();

    let (status, quiz) = app
        .post(
            "/api/assessments",
            &admin,
            json!({
                "name": "Quiz 1",
                "assessment_type": "Quiz",
                "subject_id": subject.id,
                "class_id": class.id,
                "weight": 40.0,
                "max_score": 50.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, exam) = app
        .post(
            "/api/assessments",
            &admin,
            json!({
                "name": "Final exam",
                "subject_id": subject.id,
                "class_id": class.id,
                "weight": 60.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(exam["assessment_type"], "Exam");
    assert!(close(&exam["max_score"], 100.0));

    let (status, grid) = app
        .post(
            "/api/grades/grid",
            &admin,
            json!({
                "updates": [
                    { "student_id": alice.id, "assessment_id": quiz["id"], "score": 40.0 },
                    { "student_id": alice.id, "assessment_id": exam["id"], "score": 80.0 },
                    { "student_id": bob.id, "assessment_id": quiz["id"], "score": 45.0 },
                    { "student_id": bob.id, "assessment_id": exam["id"], "score": 90.0 },
                    { "student_id": carol.id, "assessment_id": quiz["id"], "score": 30.0 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grid["updated"].as_array().unwrap().len(), 5);
    assert_eq!(grid["skipped"], json!([]));

    Cohort {
        app,
        admin,
        class,
        subject,
        alice,
        bob,
        carol,
        quiz,
        exam,
    }
}

async fn calculate(c: &Cohort, token: &str) -> (StatusCode, Value) {
    c.app
        .post(
            "/api/final-grades/calculate",
            token,
            json!({ "subject_id": c.subject.id, "semester": "Fall", "year": 2026 }),
        )
        .await
}

#[tokio::test]
async fn test_calculate_weights_and_ranks() {
    let c = cohort().await;

    let (status, body) = calculate(&c, &c.admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Calculated final grades for 3 students");

    let grades = body["grades"].as_array().unwrap();
    assert_eq!(grades.len(), 3);

    assert_eq!(grades[0]["student_id"], json!(c.bob.id));
    assert!(close(&grades[0]["final_score"], 90.0));
    assert_eq!(grades[0]["letter_grade"], "A");
    assert_eq!(grades[0]["rank"], 1);

    assert_eq!(grades[1]["student_id"], json!(c.alice.id));
    assert!(close(&grades[1]["final_score"], 80.0));
    assert_eq!(grades[1]["letter_grade"], "B");
    assert_eq!(grades[1]["rank"], 2);

    // Only the quiz is graded, so it carries the whole weight.
    assert_eq!(grades[2]["student_id"], json!(c.carol.id));
    assert!(close(&grades[2]["final_score"], 60.0));
    assert_eq!(grades[2]["letter_grade"], "D");
    assert_eq!(grades[2]["rank"], 3);
}

#[tokio::test]
async fn test_recalculation_reranks_the_cohort() {
    let c = cohort().await;
    calculate(&c, &c.admin).await;

    let (status, _) = c
        .app
        .post(
            "/api/grades/grid",
            &c.admin,
            json!({
                "updates": [
                    { "student_id": c.carol.id, "assessment_id": c.exam["id"], "score": 100.0 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = calculate(&c, &c.admin).await;
    let grades = body["grades"].as_array().unwrap();
    assert_eq!(grades.len(), 3);
    assert_eq!(grades[1]["student_id"], json!(c.carol.id));
    assert!(close(&grades[1]["final_score"], 84.0));
    assert_eq!(grades[1]["rank"], 2);
    assert_eq!(grades[2]["student_id"], json!(c.alice.id));
    assert_eq!(grades[2]["rank"], 3);

    let uri = format!("/api/final-grades?subject_id={}", c.subject.id);
    let (status, listed) = c.app.get(&uri, &c.admin).await;
    assert_eq!(status, StatusCode::OK);
    let ranks: Vec<i64> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["rank"].as_i64().unwrap())
        .collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_recalculation_on_unchanged_data_is_stable() {
    let c = cohort().await;

    let (status, first) = calculate(&c, &c.admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = calculate(&c, &c.admin).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first["grades"].as_array().unwrap().len(), 3);
    assert_eq!(first["grades"], second["grades"]);

    let uri = format!("/api/final-grades?subject_id={}", c.subject.id);
    let (_, listed) = c.app.get(&uri, &c.admin).await;
    assert_eq!(listed, second["grades"]);
}

#[tokio::test]
async fn test_rerank_keeps_scores_and_ranks() {
    let c = cohort().await;
    let (_, calculated) = calculate(&c, &c.admin).await;

    let key = CohortKey::new(c.subject.id, "Fall", 2026);
    let ranked = rerank_cohort(c.app.store.as_ref(), &key).await.unwrap();
    assert_eq!(serde_json::to_value(&ranked).unwrap(), calculated["grades"]);
}

#[tokio::test]
async fn test_statistics() {
    let c = cohort().await;
    calculate(&c, &c.admin).await;

    let uri = format!(
        "/api/final-grades/statistics?subject_id={}&semester=Fall&year=2026",
        c.subject.id
    );
    let (status, stats) = c.app.get(&uri, &c.admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_students"], 3);
    assert!(close(&stats["average_score"], 76.67));
    assert!(close(&stats["highest_score"], 90.0));
    assert!(close(&stats["lowest_score"], 60.0));
    assert!(close(&stats["pass_rate"], 100.0));

    let (_, empty) = c
        .app
        .get("/api/final-grades/statistics?semester=Spring", &c.admin)
        .await;
    assert_eq!(empty["total_students"], 0);
    assert_eq!(empty["average_score"], Value::Null);
}

#[tokio::test]
async fn test_grid_skips_bad_entries_and_keeps_the_rest() {
    let c = cohort().await;

    let (status, body) = c
        .app
        .post(
            "/api/grades/grid",
            &c.admin,
            json!({
                "updates": [
                    { "student_id": c.alice.id, "assessment_id": c.quiz["id"], "score": 50.0, "remark": "Perfect" },
                    { "student_id": c.alice.id, "assessment_id": c.quiz["id"], "score": 51.0 },
                    { "student_id": uuid::Uuid::new_v4(), "assessment_id": c.quiz["id"], "score": 10.0 },
                    { "student_id": c.bob.id, "assessment_id": uuid::Uuid::new_v4(), "score": 10.0 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let updated = body["updated"].as_array().unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0]["letter_grade"], "A");
    assert_eq!(updated[0]["remark"], "Perfect");

    let reasons: Vec<&str> = body["skipped"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["reason"].as_str().unwrap())
        .collect();
    assert_eq!(
        reasons,
        vec![
            "Score must be between 0 and 50",
            "Student not found",
            "Assessment not found"
        ]
    );
}

#[tokio::test]
async fn test_create_grade_bounds_and_duplicates() {
    let c = cohort().await;

    let (status, body) = c
        .app
        .post(
            "/api/grades",
            &c.admin,
            json!({
                "student_id": c.alice.id,
                "subject_id": c.subject.id,
                "assessment_id": c.quiz["id"],
                "score": 60.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Score must be between 0 and 50");

    let (status, _) = c
        .app
        .post(
            "/api/grades",
            &c.admin,
            json!({
                "student_id": c.alice.id,
                "subject_id": c.subject.id,
                "assessment_id": c.quiz["id"],
                "score": 20.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, unlinked) = c
        .app
        .post(
            "/api/grades",
            &c.admin,
            json!({
                "student_id": c.bob.id,
                "subject_id": c.subject.id,
                "score": 72.5,
                "remark": "Participation"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(unlinked["letter_grade"], "C");
    assert_eq!(unlinked["assessment_id"], Value::Null);
}

#[tokio::test]
async fn test_assessment_for_unknown_subject() {
    let c = cohort().await;

    let (status, body) = c
        .app
        .post(
            "/api/assessments",
            &c.admin,
            json!({
                "name": "Orphan",
                "subject_id": uuid::Uuid::new_v4(),
                "class_id": uuid::Uuid::new_v4(),
                "weight": 10.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Subject not found");

    let (status, body) = c
        .app
        .post(
            "/api/assessments",
            &c.admin,
            json!({
                "name": "Heavy",
                "subject_id": c.subject.id,
                "class_id": c.class.id,
                "weight": 120.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Weight must be between 0 and 100");
}

#[tokio::test]
async fn test_assessment_for_unknown_class() {
    let c = cohort().await;

    let (status, body) = c
        .app
        .post(
            "/api/assessments",
            &c.admin,
            json!({
                "name": "Lab report",
                "subject_id": c.subject.id,
                "class_id": uuid::Uuid::new_v4(),
                "weight": 10.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Class not found");

    let (_, assessments) = c
        .app
        .get(&format!("/api/assessments?subject_id={}", c.subject.id), &c.admin)
        .await;
    assert_eq!(assessments.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unlinked_grade_for_unknown_subject() {
    let c = cohort().await;

    let (status, body) = c
        .app
        .post(
            "/api/grades",
            &c.admin,
            json!({
                "student_id": c.alice.id,
                "subject_id": uuid::Uuid::new_v4(),
                "score": 70.0
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Subject not found");
}

#[tokio::test]
async fn test_grade_permissions() {
    let c = cohort().await;
    let (_, teacher) = c.app.login_as("lecturer", Some(TEACHER_ROLE)).await;
    let (_, student) = c.app.login_as("pupil", Some(STUDENT_ROLE)).await;

    let (status, _) = calculate(&c, &teacher).await;
    assert_eq!(status, StatusCode::OK);

    let (status, assessments) = c
        .app
        .get(&format!("/api/assessments?subject_id={}", c.subject.id), &teacher)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assessments.as_array().unwrap().len(), 2);

    let (status, body) = c.app.get("/api/final-grades", &student).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "Access denied. Missing required permission: view_grade"
    );
}
