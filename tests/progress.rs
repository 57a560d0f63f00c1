mod common;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{
    Action, Flow, FlowContext, book_outline_steps, id_of, login_as, register_action, setup_accounts, setup_server,
    setup_test_db,
};

fn student_id(ctx: &FlowContext) -> String {
    ctx.get("student")["user"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn route_progress_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    let flow = Flow::new().step(login_as("giaovien@truong.vn"));
    book_outline_steps(flow)
        .step(
            Action::new("text_block", "POST", "/api/v1/page-blocks")
                .with_dyn_body(|ctx| {
                    json!({
                        "pageId": id_of(ctx, "page"),
                        "blockType": "TEXT",
                        "title": "Đọc",
                        "textContent": "Bé đọc chữ a.",
                    })
                })
                .with_expect(StatusCode::CREATED)
                .with_save_as("block"),
        )
        .step(login_as("hocsinh@truong.vn").with_save_as("student"))
        // not yet enrolled in a class that has the book
        .step(
            Action::new("progress_outside_class", "POST", "/api/v1/student-progress")
                .with_dyn_body(|ctx| json!({ "userId": student_id(ctx), "pageBlockId": id_of(ctx, "block") }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("giaovien@truong.vn"))
        .step(
            Action::new("enroll", "POST", "/")
                .with_dyn_path(|ctx| format!("/api/v1/classes/{}/students", id_of(ctx, "class")))
                .with_dyn_body(|ctx| json!({ "userId": student_id(ctx) }))
                .with_expect(StatusCode::CREATED),
        )
        .step(login_as("hocsinh@truong.vn"))
        .step(
            Action::new("progress_started", "POST", "/api/v1/student-progress")
                .with_dyn_body(|ctx| json!({ "userId": student_id(ctx), "pageBlockId": id_of(ctx, "block") }))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["status"], "IN_PROGRESS");
                }),
        )
        // same pair again updates the existing row
        .step(
            Action::new("progress_completed", "POST", "/api/v1/student-progress")
                .with_dyn_body(|ctx| {
                    json!({
                        "userId": student_id(ctx),
                        "pageBlockId": id_of(ctx, "block"),
                        "status": "COMPLETED",
                    })
                })
                .with_save_as("progress"),
        )
        .step(
            Action::new("my_progress", "GET", "/api/v1/student-progress/my-progress").assert_body(|body| {
                let body: Value = serde_json::from_str(body).unwrap();
                let rows = body.as_array().unwrap();
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0]["status"], "COMPLETED");
            }),
        )
        .step(
            Action::new("summary", "GET", "/api/v1/student-progress/summary").assert_body(|body| {
                let body: Value = serde_json::from_str(body).unwrap();
                assert_eq!(body["totalProgress"], 1);
                assert_eq!(body["completionRate"], 100.0);
            }),
        )
        .step(
            Action::new("record_attempt", "POST", "/api/v1/student-progress/quiz-attempt")
                .with_dyn_body(|ctx| {
                    json!({ "studentProgressId": id_of(ctx, "progress"), "score": 80.0, "isPass": true })
                })
                .with_expect(StatusCode::CREATED),
        )
        .step(
            Action::new("attempts_of_progress", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/student-progress/{}/quiz-attempts", id_of(ctx, "progress")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body.as_array().unwrap().len(), 1);
                }),
        )
        // another student sees nothing of it
        .step(register_action("khac@truong.vn").with_clear_cookies(true))
        .step(
            Action::new("foreign_progress", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/student-progress/{}", id_of(ctx, "progress")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("foreign_user_progress", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/student-progress/user/{}", student_id(ctx)))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("giaovien@truong.vn"))
        .step(
            Action::new("lesson_progress", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/student-progress/lesson/{}", id_of(ctx, "lesson")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body.as_array().unwrap().len(), 1);
                }),
        )
        .step(
            Action::new("teacher_deletes", "DELETE", "/")
                .with_dyn_path(|ctx| format!("/api/v1/student-progress/{}", id_of(ctx, "progress")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("admin@truong.vn"))
        .step(
            Action::new("admin_deletes", "DELETE", "/")
                .with_dyn_path(|ctx| format!("/api/v1/student-progress/{}", id_of(ctx, "progress")))
                .with_expect(StatusCode::NO_CONTENT),
        )
        .step(
            Action::new("deleted", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/student-progress/{}", id_of(ctx, "progress")))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut server, pool)
        .await;
}
