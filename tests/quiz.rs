mod common;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{
    Action, Flow, FlowContext, book_outline_steps, id_of, login_as, setup_accounts, setup_server, setup_test_db,
};

/// Id of the first question of `question_type` in a stored start response.
fn question_id(ctx: &FlowContext, attempt: &str, question_type: &str) -> String {
    ctx.get(attempt)["questions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["questionType"] == question_type)
        .and_then(|q| q["id"].as_str())
        .unwrap()
        .to_string()
}

/// Quiz block with two questions and two allowed attempts, stored as `block` and `config`.
fn quiz_steps(flow: Flow) -> Flow {
    book_outline_steps(flow)
        .step(
            Action::new("quiz_block", "POST", "/api/v1/page-blocks")
                .with_dyn_body(|ctx| {
                    json!({ "pageId": id_of(ctx, "page"), "blockType": "QUIZ", "title": "Kiểm tra" })
                })
                .with_expect(StatusCode::CREATED)
                .with_save_as("block"),
        )
        .step(
            Action::new("quiz_config", "POST", "/api/v1/quiz/config")
                .with_dyn_body(|ctx| {
                    json!({
                        "pageBlockId": id_of(ctx, "block"),
                        "title": "Bài kiểm tra chữ a",
                        "passingScore": 60.0,
                        "maxAttempts": 2,
                        "showCorrectAnswers": true,
                    })
                })
                .with_expect(StatusCode::CREATED)
                .with_save_as("config"),
        )
        .step(
            Action::new("second_config", "POST", "/api/v1/quiz/config")
                .with_dyn_body(|ctx| json!({ "pageBlockId": id_of(ctx, "block"), "title": "Lặp" }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("mc_question", "POST", "/api/v1/quiz/question")
                .with_dyn_body(|ctx| {
                    json!({
                        "quizConfigId": id_of(ctx, "config"),
                        "questionText": "Chữ nào là chữ a?",
                        "questionType": "multiple-choice",
                        "order": 1,
                        "metadata": { "options": [
                            { "id": "x", "text": "b", "isCorrect": false },
                            { "id": "y", "text": "a", "isCorrect": true },
                        ]},
                    })
                })
                .with_expect(StatusCode::CREATED),
        )
        .step(
            Action::new("tf_question", "POST", "/api/v1/quiz/question")
                .with_dyn_body(|ctx| {
                    json!({
                        "quizConfigId": id_of(ctx, "config"),
                        "questionText": "Chữ a là nguyên âm.",
                        "questionType": "true-false",
                        "order": 2,
                        "metadata": { "correctAnswer": true },
                    })
                })
                .with_expect(StatusCode::CREATED),
        )
}

#[tokio::test]
async fn route_quiz_attempts_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    let flow = Flow::new().step(login_as("giaovien@truong.vn"));
    quiz_steps(flow)
        .step(
            Action::new("other_block", "POST", "/api/v1/page-blocks")
                .with_dyn_body(|ctx| {
                    json!({ "pageId": id_of(ctx, "page"), "blockType": "QUIZ", "title": "Ôn tập" })
                })
                .with_expect(StatusCode::CREATED)
                .with_save_as("other_block"),
        )
        .step(
            Action::new("other_config", "POST", "/api/v1/quiz/config")
                .with_dyn_body(|ctx| json!({ "pageBlockId": id_of(ctx, "other_block"), "title": "Ôn tập chữ b" }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("other_config"),
        )
        .step(
            Action::new("other_question", "POST", "/api/v1/quiz/question")
                .with_dyn_body(|ctx| {
                    json!({
                        "quizConfigId": id_of(ctx, "other_config"),
                        "questionText": "Chữ b là phụ âm.",
                        "questionType": "true-false",
                        "order": 1,
                        "metadata": { "correctAnswer": true },
                    })
                })
                .with_expect(StatusCode::CREATED)
                .with_save_as("other_question"),
        )
        .step(
            Action::new("config_of_block", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/quiz/config/page-block/{}", id_of(ctx, "block")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["maxAttempts"], 2);
                    assert_eq!(body["questions"].as_array().unwrap().len(), 2);
                }),
        )
        .step(login_as("hocsinh@truong.vn"))
        .step(
            Action::new("student_adds_question", "POST", "/api/v1/quiz/question")
                .with_dyn_body(|ctx| {
                    json!({
                        "quizConfigId": id_of(ctx, "config"),
                        "questionText": "?",
                        "questionType": "true-false",
                        "order": 3,
                    })
                })
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("start_first", "POST", "/api/v1/quiz/attempt/start")
                .with_dyn_body(|ctx| json!({ "pageBlockId": id_of(ctx, "block") }))
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| {
                    assert!(!body.contains("isCorrect"));
                    assert!(!body.contains("correctAnswer"));
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["attemptNumber"], 1);
                    assert_eq!(body["totalPoints"], 2.0);
                })
                .with_save_as("attempt1"),
        )
        .step(
            Action::new("answer_mc", "POST", "/api/v1/quiz/attempt/submit-answer")
                .with_dyn_body(|ctx| {
                    json!({
                        "attemptId": ctx.get("attempt1")["attemptId"],
                        "questionId": question_id(ctx, "attempt1", "multiple-choice"),
                        "userAnswer": { "selectedOption": "y" },
                        "timeSpent": 12,
                    })
                })
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["isCorrect"], true);
                    assert_eq!(body["pointsEarned"], 1.0);
                }),
        )
        .step(
            Action::new("complete_first", "POST", "/api/v1/quiz/attempt/complete")
                .with_dyn_body(|ctx| {
                    json!({
                        "attemptId": ctx.get("attempt1")["attemptId"],
                        "answers": [{
                            "questionId": question_id(ctx, "attempt1", "true-false"),
                            "userAnswer": { "answer": true },
                        }],
                    })
                })
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["score"], 100.0);
                    assert_eq!(body["isPass"], true);
                    assert_eq!(body["questionResults"].as_array().unwrap().len(), 2);
                    assert!(body["questionResults"][0]["correctAnswer"].is_string());
                }),
        )
        // a submitted attempt is closed
        .step(
            Action::new("answer_after_complete", "POST", "/api/v1/quiz/attempt/submit-answer")
                .with_dyn_body(|ctx| {
                    json!({
                        "attemptId": ctx.get("attempt1")["attemptId"],
                        "questionId": question_id(ctx, "attempt1", "true-false"),
                        "userAnswer": { "answer": false },
                    })
                })
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("start_second", "POST", "/api/v1/quiz/attempt/start")
                .with_dyn_body(|ctx| json!({ "pageBlockId": id_of(ctx, "block") }))
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["attemptNumber"], 2);
                })
                .with_save_as("attempt2"),
        )
        // a new attempt reopens the block without losing the first completion
        .step(
            Action::new("progress_keeps_completion", "GET", "/api/v1/student-progress/my-progress").assert_body(
                |body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    let rows = body.as_array().unwrap();
                    assert_eq!(rows.len(), 1);
                    assert_eq!(rows[0]["status"], "IN_PROGRESS");
                    assert!(rows[0]["completedAt"].is_string());
                },
            ),
        )
        .step(
            Action::new("answer_from_other_quiz", "POST", "/api/v1/quiz/attempt/submit-answer")
                .with_dyn_body(|ctx| {
                    json!({
                        "attemptId": ctx.get("attempt2")["attemptId"],
                        "questionId": id_of(ctx, "other_question"),
                        "userAnswer": { "answer": true },
                    })
                })
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(login_as("admin@truong.vn"))
        .step(
            Action::new("admin_answers_foreign_attempt", "POST", "/api/v1/quiz/attempt/submit-answer")
                .with_dyn_body(|ctx| {
                    json!({
                        "attemptId": ctx.get("attempt2")["attemptId"],
                        "questionId": question_id(ctx, "attempt2", "true-false"),
                        "userAnswer": { "answer": true },
                    })
                })
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("admin_completes_foreign_attempt", "POST", "/api/v1/quiz/attempt/complete")
                .with_dyn_body(|ctx| json!({ "attemptId": ctx.get("attempt2")["attemptId"], "answers": [] }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("hocsinh@truong.vn"))
        .step(
            Action::new("complete_second", "POST", "/api/v1/quiz/attempt/complete")
                .with_dyn_body(|ctx| {
                    json!({
                        "attemptId": ctx.get("attempt2")["attemptId"],
                        "answers": [
                            {
                                "questionId": question_id(ctx, "attempt2", "multiple-choice"),
                                "userAnswer": { "selectedOption": "x" },
                            },
                            {
                                "questionId": question_id(ctx, "attempt2", "true-false"),
                                "userAnswer": { "answer": true },
                            },
                        ],
                    })
                })
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["score"], 50.0);
                    assert_eq!(body["isPass"], false);
                }),
        )
        .step(
            Action::new("progress_after_fail", "GET", "/api/v1/student-progress/my-progress").assert_body(|body| {
                let body: Value = serde_json::from_str(body).unwrap();
                assert_eq!(body[0]["status"], "IN_PROGRESS");
                assert!(body[0]["completedAt"].is_null());
            }),
        )
        .step(
            Action::new("start_third", "POST", "/api/v1/quiz/attempt/start")
                .with_dyn_body(|ctx| json!({ "pageBlockId": id_of(ctx, "block") }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("history", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/quiz/attempt/history/{}", id_of(ctx, "block")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body.as_array().unwrap().len(), 2);
                }),
        )
        .step(
            Action::new("student_analytics", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/quiz-analytics/students/{}", id_of(ctx, "config")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("giaovien@truong.vn"))
        .step(
            Action::new("student_performances", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/quiz-analytics/students/{}", id_of(ctx, "config")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    let rows = body.as_array().unwrap();
                    assert_eq!(rows.len(), 1);
                    assert_eq!(rows[0]["totalAttempts"], 2);
                    assert_eq!(rows[0]["bestScore"], 100.0);
                    // the latest attempt decides, the best score stays
                    assert_eq!(rows[0]["isPassed"], false);
                }),
        )
        .step(
            Action::new("analytics_before_calculation", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/quiz-analytics/quiz/{}", id_of(ctx, "block")))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .step(
            Action::new("calculate", "POST", "/")
                .with_dyn_path(|ctx| format!("/api/v1/quiz-analytics/calculate/{}", id_of(ctx, "block")))
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["totalAttempts"], 2);
                    assert_eq!(body["averageScore"], 75.0);
                    assert_eq!(body["passRate"], 50.0);
                }),
        )
        .run(&mut server, pool)
        .await;
}
