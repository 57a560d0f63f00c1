mod common;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{Action, Flow, book_outline_steps, id_of, login_as, setup_accounts, setup_server, setup_test_db};

#[tokio::test]
async fn route_book_outline_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    let flow = Flow::new().step(login_as("giaovien@truong.vn"));
    book_outline_steps(flow)
        // one class per grade
        .step(
            Action::new("duplicate_grade", "POST", "/api/v1/classes")
                .with_body(json!({ "name": "Lớp 1B", "gradeLevel": 1 }))
                .with_expect(StatusCode::CONFLICT),
        )
        .step(
            Action::new("grade_out_of_range", "POST", "/api/v1/classes")
                .with_body(json!({ "name": "Lớp 13", "gradeLevel": 13 }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        // lesson orders are unique within a chapter
        .step(
            Action::new("duplicate_order", "POST", "/api/v1/lessons")
                .with_dyn_body(|ctx| {
                    json!({
                        "bookId": id_of(ctx, "book"),
                        "chapterId": id_of(ctx, "chapter"),
                        "title": "Chữ b",
                        "order": 1,
                    })
                })
                .with_expect(StatusCode::CONFLICT),
        )
        .step(
            Action::new("text_block", "POST", "/api/v1/page-blocks")
                .with_dyn_body(|ctx| {
                    json!({
                        "pageId": id_of(ctx, "page"),
                        "blockType": "TEXT",
                        "title": "Đọc",
                        "textContent": "Chữ a như quả táo.",
                    })
                })
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["blockType"], "TEXT");
                    assert_eq!(body["content"]["text"], "Chữ a như quả táo.");
                    assert_eq!(body["order"], 1);
                }),
        )
        .step(
            Action::new("text_block_without_text", "POST", "/api/v1/page-blocks")
                .with_dyn_body(|ctx| {
                    json!({
                        "pageId": id_of(ctx, "page"),
                        "blockType": "TEXT",
                        "title": "Trống",
                    })
                })
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("unknown_block_type", "POST", "/api/v1/page-blocks")
                .with_dyn_body(|ctx| {
                    json!({
                        "pageId": id_of(ctx, "page"),
                        "blockType": "AUDIO",
                        "title": "Nghe",
                    })
                })
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("book_content", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/books/{}/content", id_of(ctx, "book")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["book"]["title"], "Tiếng Việt 1");
                    let chapters = body["chapters"].as_array().unwrap();
                    assert_eq!(chapters.len(), 1);
                    assert_eq!(chapters[0]["lessons"][0]["title"], "Chữ a");
                }),
        )
        .step(
            Action::new("blocks_of_page", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/page-blocks/page/{}", id_of(ctx, "page")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body.as_array().unwrap().len(), 1);
                }),
        )
        // a chapter with lessons cannot be removed
        .step(
            Action::new("delete_busy_chapter", "DELETE", "/")
                .with_dyn_path(|ctx| format!("/api/v1/chapters/{}", id_of(ctx, "chapter")))
                .with_expect(StatusCode::CONFLICT),
        )
        .step(login_as("hocsinh@truong.vn"))
        .step(
            Action::new("student_reads_book", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/books/{}", id_of(ctx, "book")))
                .assert_body(|body| assert!(body.contains("Tiếng Việt 1"))),
        )
        .step(
            Action::new("student_creates_book", "POST", "/api/v1/books")
                .with_body(json!({ "title": "Sách lạ", "subject": "Toán", "grade": 2 }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .run(&mut server, pool)
        .await;
}

#[tokio::test]
async fn route_content_requires_session_test() {
    let pool = setup_test_db().await;
    let mut server = setup_server(&pool).await;

    Flow::new()
        .step(
            Action::new("anonymous_books", "GET", "/api/v1/books")
                .with_clear_cookies(true)
                .with_expect(StatusCode::UNAUTHORIZED),
        )
        .run(&mut server, pool)
        .await;
}

/// TEXT block creation on the page stored under `page_key`.
fn text_block(name: &'static str, page_key: &'static str, title: &'static str) -> Action {
    Action::new(name, "POST", "/api/v1/page-blocks")
        .with_dyn_body(move |ctx| {
            json!({
                "pageId": id_of(ctx, page_key),
                "blockType": "TEXT",
                "title": title,
                "textContent": title,
            })
        })
        .with_expect(StatusCode::CREATED)
}

fn orders(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|b| b["order"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn route_lesson_ordering_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    let flow = Flow::new().step(login_as("giaovien@truong.vn"));
    book_outline_steps(flow)
        .step(
            Action::new("second_lesson", "POST", "/api/v1/lessons")
                .with_dyn_body(|ctx| {
                    json!({
                        "bookId": id_of(ctx, "book"),
                        "chapterId": id_of(ctx, "chapter"),
                        "title": "Chữ b",
                        "order": 2,
                    })
                })
                .with_expect(StatusCode::CREATED)
                .with_save_as("lesson2"),
        )
        .step(
            Action::new("navigation", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/lessons/{}/navigation", id_of(ctx, "lesson")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["scopeTitle"], "Làm quen với chữ cái");
                    assert_eq!(body["totalLessons"], 2);
                    assert!(body["previous"].is_null());
                    assert_eq!(body["next"]["title"], "Chữ b");
                }),
        )
        .step(
            Action::new("reorder_lessons", "PATCH", "/api/v1/lessons/reorder")
                .with_dyn_body(|ctx| json!({ "lessonIds": [id_of(ctx, "lesson2"), id_of(ctx, "lesson")] }))
                .with_expect(StatusCode::NO_CONTENT),
        )
        .step(
            Action::new("navigation_after_reorder", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/lessons/{}/navigation", id_of(ctx, "lesson")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["current"]["order"], 2);
                    assert_eq!(body["previous"]["title"], "Chữ b");
                    assert!(body["next"].is_null());
                }),
        )
        .step(
            Action::new("reorder_unknown_lesson", "PATCH", "/api/v1/lessons/reorder")
                .with_dyn_body(|ctx| json!({ "lessonIds": [id_of(ctx, "lesson"), uuid::Uuid::new_v4()] }))
                .with_expect(StatusCode::NOT_FOUND)
                .assert_body(|body| assert!(body.contains("lessons not found"))),
        )
        .run(&mut server, pool)
        .await;
}

#[tokio::test]
async fn route_page_block_ordering_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    let flow = Flow::new().step(login_as("giaovien@truong.vn"));
    book_outline_steps(flow)
        .step(
            Action::new("second_page", "POST", "/api/v1/pages")
                .with_dyn_body(|ctx| json!({ "lessonId": id_of(ctx, "lesson"), "title": "Trang 2" }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("page2"),
        )
        .step(text_block("first", "page", "Một").with_save_as("b1"))
        .step(text_block("second", "page", "Hai").with_save_as("b2"))
        .step(text_block("third", "page", "Ba").with_save_as("b3"))
        .step(text_block("elsewhere", "page2", "Khác").with_save_as("foreign"))
        // every id must belong to the page
        .step(
            Action::new("reorder_with_foreign_block", "POST", "/")
                .with_dyn_path(|ctx| format!("/api/v1/page-blocks/page/{}/reorder", id_of(ctx, "page")))
                .with_dyn_body(|ctx| json!({ "blockIds": [id_of(ctx, "b3"), id_of(ctx, "foreign")] }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("reorder_blocks", "POST", "/")
                .with_dyn_path(|ctx| format!("/api/v1/page-blocks/page/{}/reorder", id_of(ctx, "page")))
                .with_dyn_body(|ctx| {
                    json!({ "blockIds": [id_of(ctx, "b3"), id_of(ctx, "b1"), id_of(ctx, "b2")] })
                })
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    let titles: Vec<&str> = body
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|b| b["title"].as_str().unwrap())
                        .collect();
                    assert_eq!(titles, vec!["Ba", "Một", "Hai"]);
                    assert_eq!(orders(&body), vec![1, 2, 3]);
                }),
        )
        // the copy goes to the end of the page
        .step(
            Action::new("duplicate_block", "POST", "/")
                .with_dyn_path(|ctx| format!("/api/v1/page-blocks/{}/duplicate", id_of(ctx, "b1")))
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["order"], 4);
                    assert_eq!(body["title"], "Một (Bản sao)");
                    assert_eq!(body["content"]["text"], "Một");
                }),
        )
        .step(
            Action::new("delete_first_block", "DELETE", "/")
                .with_dyn_path(|ctx| format!("/api/v1/page-blocks/{}", id_of(ctx, "b3")))
                .with_expect(StatusCode::NO_CONTENT),
        )
        .step(
            Action::new("orders_close_the_gap", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/page-blocks/page/{}", id_of(ctx, "page")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(orders(&body), vec![1, 2, 3]);
                    assert_eq!(body[0]["title"], "Một");
                }),
        )
        .step(
            Action::new("statistics", "GET", "/api/v1/page-blocks/statistics").assert_body(|body| {
                let body: Value = serde_json::from_str(body).unwrap();
                assert_eq!(body["total"], 4);
                assert_eq!(body["byType"]["TEXT"], 4);
                assert_eq!(body["withProgress"], 0);
                assert_eq!(body["withoutProgress"], 4);
            }),
        )
        .run(&mut server, pool)
        .await;
}

#[tokio::test]
async fn route_class_management_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    let flow = Flow::new().step(login_as("giaovien@truong.vn"));
    book_outline_steps(flow)
        .step(
            Action::new("second_class", "POST", "/api/v1/classes")
                .with_body(json!({ "name": "Lớp 2A", "gradeLevel": 2 }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("class2"),
        )
        .step(
            Action::new("available_students", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/classes/{}/available-students", id_of(ctx, "class")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    let students = body.as_array().unwrap();
                    assert_eq!(students.len(), 1);
                    assert_eq!(students[0]["email"], "hocsinh@truong.vn");
                }),
        )
        // grade 1 already has a class
        .step(
            Action::new("move_to_taken_grade", "PUT", "/")
                .with_dyn_path(|ctx| format!("/api/v1/classes/{}", id_of(ctx, "class2")))
                .with_body(json!({ "name": "Lớp 2A", "gradeLevel": 1 }))
                .with_expect(StatusCode::CONFLICT),
        )
        .step(
            Action::new("rename_class", "PUT", "/")
                .with_dyn_path(|ctx| format!("/api/v1/classes/{}", id_of(ctx, "class2")))
                .with_body(json!({ "name": "Lớp 2B", "gradeLevel": 2 }))
                .assert_body(|body| assert!(body.contains("Lớp 2B"))),
        )
        .step(
            Action::new("teacher_deletes_class", "DELETE", "/")
                .with_dyn_path(|ctx| format!("/api/v1/classes/{}", id_of(ctx, "class2")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("admin@truong.vn"))
        .step(
            Action::new("delete_class_with_books", "DELETE", "/")
                .with_dyn_path(|ctx| format!("/api/v1/classes/{}", id_of(ctx, "class")))
                .with_expect(StatusCode::CONFLICT),
        )
        .step(
            Action::new("delete_empty_class", "DELETE", "/")
                .with_dyn_path(|ctx| format!("/api/v1/classes/{}", id_of(ctx, "class2")))
                .with_expect(StatusCode::NO_CONTENT),
        )
        .run(&mut server, pool)
        .await;
}

#[tokio::test]
async fn route_user_update_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    Flow::new()
        .step(login_as("giaovien@truong.vn"))
        .step(Action::new("teacher_me", "GET", "/api/v1/auth/me").with_save_as("teacher"))
        .step(login_as("hocsinh@truong.vn"))
        .step(Action::new("student_me", "GET", "/api/v1/auth/me").with_save_as("student"))
        .step(
            Action::new("update_own_name", "PATCH", "/")
                .with_dyn_path(|ctx| format!("/api/v1/users/{}", id_of(ctx, "student")))
                .with_body(json!({ "firstName": "Lan" }))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["firstName"], "Lan");
                    assert_eq!(body["role"], "STUDENT");
                }),
        )
        // role and activation are reserved for admins
        .step(
            Action::new("promote_self", "PATCH", "/")
                .with_dyn_path(|ctx| format!("/api/v1/users/{}", id_of(ctx, "student")))
                .with_body(json!({ "role": "ADMIN" }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("update_someone_else", "PATCH", "/")
                .with_dyn_path(|ctx| format!("/api/v1/users/{}", id_of(ctx, "teacher")))
                .with_body(json!({ "firstName": "Hack" }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("email_of_another_account", "PATCH", "/")
                .with_dyn_path(|ctx| format!("/api/v1/users/{}", id_of(ctx, "student")))
                .with_body(json!({ "email": "giaovien@truong.vn" }))
                .with_expect(StatusCode::CONFLICT),
        )
        .step(login_as("admin@truong.vn"))
        .step(
            Action::new("admin_changes_role", "PATCH", "/")
                .with_dyn_path(|ctx| format!("/api/v1/users/{}", id_of(ctx, "student")))
                .with_body(json!({ "role": "TEACHER", "isActive": false }))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["role"], "TEACHER");
                    assert_eq!(body["isActive"], false);
                    assert_eq!(body["firstName"], "Lan");
                }),
        )
        .run(&mut server, pool)
        .await;
}

#[tokio::test]
async fn route_tts_without_provider_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    let flow = Flow::new().step(login_as("giaovien@truong.vn"));
    book_outline_steps(flow)
        .step(text_block("read_aloud", "page", "Xin chào").with_save_as("block"))
        .step(
            Action::new("no_audio_yet", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/tts/{}", id_of(ctx, "block")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert!(body["audioUrl"].is_null());
                }),
        )
        // the checked-in config.toml has no [tts] section
        .step(
            Action::new("generate_without_provider", "POST", "/")
                .with_dyn_path(|ctx| format!("/api/v1/tts/{}", id_of(ctx, "block")))
                .with_body(json!({ "text": "Xin chào các em" }))
                .with_expect(StatusCode::INTERNAL_SERVER_ERROR),
        )
        .step(
            Action::new("generate_for_missing_block", "POST", "/")
                .with_dyn_path(|_| format!("/api/v1/tts/{}", uuid::Uuid::new_v4()))
                .with_body(json!({ "text": "Xin chào" }))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut server, pool)
        .await;
}
