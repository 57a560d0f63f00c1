mod common;
use axum::http::StatusCode;
use serde_json::Value;
use tieuhoc::web::middlewares::AUTH_TOKEN;
use tower_cookies::cookie::SameSite;

use crate::common::{
    Action, Flow, PASSWORD, login_action, login_as, register_action, setup_accounts, setup_server, setup_test_db,
};

#[tokio::test]
async fn route_register_test() {
    let pool = setup_test_db().await;
    let mut server = setup_server(&pool).await;

    Flow::new()
        .step(
            register_action("an.nguyen@truong.vn")
                .assert_cookie(AUTH_TOKEN, |cookie| {
                    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
                    assert_eq!(cookie.path(), Some("/"));
                    assert_eq!(cookie.http_only(), Some(true));
                })
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).expect("Invalid body format");
                    assert!(body["accessToken"].as_str().is_some_and(|t| !t.is_empty()));
                    assert_eq!(body["user"]["email"], "an.nguyen@truong.vn");
                    assert_eq!(body["user"]["role"], "STUDENT");
                    assert!(body["user"].get("passwordHash").is_none());
                }),
        )
        // the same email twice
        .step(register_action("an.nguyen@truong.vn").with_expect(StatusCode::CONFLICT))
        // invalid email
        .step(
            Action::new("register_invalid", "POST", "/api/v1/auth/register")
                .with_body(serde_json::json!({ "email": "not-an-email", "password": PASSWORD }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .run(&mut server, pool)
        .await;
}

#[tokio::test]
async fn route_login_test() {
    let pool = setup_test_db().await;
    let mut server = setup_server(&pool).await;

    Flow::new()
        .step(register_action("binh@truong.vn").with_save_cookies(false))
        .step(
            login_as("binh@truong.vn")
                .assert_cookie(AUTH_TOKEN, |cookie| {
                    assert_eq!(cookie.http_only(), Some(true));
                })
                .assert_body(|body| assert!(body.contains("binh@truong.vn"))),
        )
        .step(
            Action::new("me", "GET", "/api/v1/auth/me")
                .assert_body(|body| assert!(body.contains("binh@truong.vn"))),
        )
        // wrong credentials
        .step(
            login_action("binh@truong.vn", "WRONGPASSWORD")
                .with_save_cookies(false)
                .with_expect(StatusCode::UNAUTHORIZED),
        )
        // non-existing account
        .step(
            login_action("nobody@truong.vn", PASSWORD)
                .with_save_cookies(false)
                .with_expect(StatusCode::UNAUTHORIZED),
        )
        // no session at all
        .step(
            Action::new("me_anonymous", "GET", "/api/v1/auth/me")
                .with_clear_cookies(true)
                .with_expect(StatusCode::UNAUTHORIZED),
        )
        .run(&mut server, pool)
        .await;
}

#[tokio::test]
async fn route_users_by_role_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    Flow::new()
        .step(login_as("hocsinh@truong.vn"))
        .step(Action::new("users_as_student", "GET", "/api/v1/users").with_expect(StatusCode::FORBIDDEN))
        .step(login_as("giaovien@truong.vn"))
        .step(
            Action::new("users_as_teacher", "GET", "/api/v1/users")
                .with_param("limit", "10")
                .assert_body(|body| {
                    assert!(body.contains("admin@truong.vn"));
                    assert!(body.contains("hocsinh@truong.vn"));
                }),
        )
        .step(
            Action::new("students", "GET", "/api/v1/users/role/STUDENT").assert_body(|body| {
                assert!(body.contains("hocsinh@truong.vn"));
                assert!(!body.contains("giaovien@truong.vn"));
            }),
        )
        // teachers cannot create accounts
        .step(
            Action::new("create_user_as_teacher", "POST", "/api/v1/users")
                .with_body(serde_json::json!({
                    "email": "moi@truong.vn",
                    "password": PASSWORD,
                    "role": "TEACHER",
                }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("admin@truong.vn"))
        .step(
            Action::new("create_user_as_admin", "POST", "/api/v1/users")
                .with_body(serde_json::json!({
                    "email": "moi@truong.vn",
                    "password": PASSWORD,
                    "role": "TEACHER",
                }))
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| assert!(body.contains("TEACHER"))),
        )
        .run(&mut server, pool)
        .await;
}
