mod common;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{Action, Flow, FlowContext, id_of, login_as, setup_accounts, setup_server, setup_test_db};

fn statement(ctx: &FlowContext, verb: &str) -> Value {
    json!({
        "verb": verb,
        "objectId": "bai-tap-1",
        "contentId": id_of(ctx, "content"),
        "statement": {
            "actor": { "mbox": "mailto:hocsinh@truong.vn" },
            "verb": { "id": format!("http://adlnet.gov/expapi/verbs/{verb}") },
            "object": { "id": "bai-tap-1" },
        },
    })
}

#[tokio::test]
async fn route_tracking_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    Flow::new()
        .step(login_as("giaovien@truong.vn"))
        .step(
            Action::new("create_content", "POST", "/api/v1/h5p/content")
                .with_body(json!({
                    "title": "Đếm số",
                    "library": "H5P.MultiChoice 1.16",
                    "params": { "question": "1 + 1 = ?" },
                    "isPublic": true,
                }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("content"),
        )
        .step(login_as("hocsinh@truong.vn").with_save_as("student"))
        .step(
            Action::new("statement_without_object", "POST", "/api/v1/tracking")
                .with_dyn_body(|ctx| {
                    let mut body = statement(ctx, "answered");
                    body["statement"].as_object_mut().unwrap().remove("object");
                    body
                })
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("answered", "POST", "/api/v1/tracking")
                .with_dyn_body(|ctx| statement(ctx, "answered"))
                .with_expect(StatusCode::CREATED)
                .with_save_as("event"),
        )
        .step(
            Action::new("completed", "POST", "/api/v1/tracking")
                .with_dyn_body(|ctx| statement(ctx, "completed"))
                .with_expect(StatusCode::CREATED),
        )
        .step(
            Action::new("own_events", "GET", "/api/v1/tracking").assert_body(|body| {
                let body: Value = serde_json::from_str(body).unwrap();
                assert_eq!(body.as_array().unwrap().len(), 2);
            }),
        )
        .step(
            Action::new("own_progress", "GET", "/")
                .with_dyn_path(|ctx| {
                    format!("/api/v1/tracking/progress/{}", ctx.get("student")["user"]["id"].as_str().unwrap())
                })
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    let rows = body.as_array().unwrap();
                    assert_eq!(rows.len(), 1);
                    assert_eq!(rows[0]["contentTitle"], "Đếm số");
                    assert_eq!(rows[0]["totalInteractions"], 2);
                    assert_eq!(rows[0]["completedSections"], 1);
                }),
        )
        .step(Action::new("student_analytics", "GET", "/api/v1/tracking/analytics").with_expect(StatusCode::FORBIDDEN))
        .step(login_as("giaovien@truong.vn"))
        .step(
            Action::new("teacher_analytics", "GET", "/api/v1/tracking/analytics").assert_body(|body| {
                let body: Value = serde_json::from_str(body).unwrap();
                assert_eq!(body["totalEvents"], 2);
                assert_eq!(body["activeUsers"], 1);
            }),
        )
        .step(
            Action::new("event_on_own_content", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/tracking/{}", id_of(ctx, "event")))
                .assert_body(|body| assert!(body.contains("answered"))),
        )
        .step(
            Action::new("teacher_deletes", "DELETE", "/")
                .with_dyn_path(|ctx| format!("/api/v1/tracking/{}", id_of(ctx, "event")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("admin@truong.vn"))
        .step(
            Action::new("admin_deletes", "DELETE", "/")
                .with_dyn_path(|ctx| format!("/api/v1/tracking/{}", id_of(ctx, "event")))
                .with_expect(StatusCode::NO_CONTENT),
        )
        .step(
            Action::new("deleted", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/tracking/{}", id_of(ctx, "event")))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut server, pool)
        .await;
}
