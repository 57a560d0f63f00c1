mod common;
use std::io::{Cursor, Write};

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{Value, json};
use zip::{ZipWriter, write::SimpleFileOptions};

use crate::common::{Action, Flow, PASSWORD, id_of, login_as, setup_accounts, setup_server, setup_test_db};

fn package(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer.into_inner()
}

fn true_false_package() -> Vec<u8> {
    let manifest = json!({
        "title": "Đúng hay sai",
        "mainLibrary": "H5P.TrueFalse",
        "language": "vi",
        "preloadedDependencies": [
            { "machineName": "H5P.TrueFalse", "majorVersion": 1, "minorVersion": 8 }
        ]
    })
    .to_string();
    let library = json!({
        "title": "True/False Question",
        "machineName": "H5P.TrueFalse",
        "majorVersion": 1,
        "minorVersion": 8,
        "patchVersion": 2,
        "runnable": 1
    })
    .to_string();

    package(&[
        ("h5p.json", manifest.as_bytes()),
        ("content/content.json", r#"{"question":"Mặt trời mọc ở hướng đông."}"#.as_bytes()),
        ("H5P.TrueFalse-1.8/library.json", library.as_bytes()),
        ("H5P.TrueFalse-1.8/truefalse.js", b"var H5P;"),
    ])
}

fn upload_form(bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes)
            .file_name("dung-sai.h5p")
            .mime_type("application/zip"),
    )
}

#[tokio::test]
async fn route_h5p_content_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;

    Flow::new()
        .step(
            Action::new("health", "GET", "/api/v1/h5p/health")
                .with_clear_cookies(true)
                .assert_body(|body| {
                    let body: Value = serde_json::from_str(body).unwrap();
                    assert_eq!(body["status"], "ok");
                    assert_eq!(body["contents"], 0);
                }),
        )
        .step(login_as("giaovien@truong.vn"))
        .step(
            Action::new("create_private", "POST", "/api/v1/h5p/content")
                .with_body(json!({
                    "title": "Bài riêng",
                    "library": "H5P.MultiChoice 1.16",
                    "params": {},
                }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("content"),
        )
        .step(
            Action::new("teacher_reads", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/h5p/content/{}", id_of(ctx, "content")))
                .assert_body(|body| assert!(body.contains("Bài riêng"))),
        )
        .step(
            Action::new("teacher_lists", "GET", "/api/v1/h5p/content").assert_body(|body| {
                let body: Value = serde_json::from_str(body).unwrap();
                assert_eq!(body["total"], 1);
                assert_eq!(body["items"][0]["title"], "Bài riêng");
            }),
        )
        .step(login_as("hocsinh@truong.vn"))
        // private content of others is left out of the page
        .step(
            Action::new("student_lists", "GET", "/api/v1/h5p/content").assert_body(|body| {
                let body: Value = serde_json::from_str(body).unwrap();
                assert_eq!(body["total"], 0);
                assert!(body["items"].as_array().unwrap().is_empty());
            }),
        )
        .step(
            Action::new("student_reads_private", "GET", "/")
                .with_dyn_path(|ctx| format!("/api/v1/h5p/content/{}", id_of(ctx, "content")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("student_creates", "POST", "/api/v1/h5p/content")
                .with_body(json!({ "title": "Của em", "library": "H5P.TrueFalse 1.8", "params": {} }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .run(&mut server, pool)
        .await;
}

#[tokio::test]
async fn route_h5p_upload_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;
    server.save_cookies();

    server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "giaovien@truong.vn", "password": PASSWORD }))
        .await
        .assert_status_ok();

    let validation = server
        .post("/api/v1/h5p/validate")
        .multipart(upload_form(package(&[("content/content.json", b"{}")])))
        .await;
    validation.assert_status_ok();
    let validation: Value = validation.json();
    assert_eq!(validation["valid"], false);
    assert!(!validation["errors"].as_array().unwrap().is_empty());

    let info = server
        .post("/api/v1/h5p/package-info")
        .multipart(upload_form(true_false_package()))
        .await;
    info.assert_status_ok();
    assert!(info.text().contains("H5P.TrueFalse"));

    let upload = server
        .post("/api/v1/h5p/upload")
        .multipart(upload_form(true_false_package()))
        .await;
    upload.assert_status(StatusCode::CREATED);
    let report: Value = upload.json();
    assert_eq!(report["success"], true);
    assert_eq!(report["librariesInstalled"], 1);
    let content_id = report["contentId"].as_str().unwrap().to_string();

    let content = server.get(&format!("/api/v1/h5p/content/{content_id}")).await;
    content.assert_status_ok();
    assert!(content.text().contains("Đúng hay sai"));

    let libraries = server.get("/api/v1/h5p/libraries").await;
    libraries.assert_status_ok();
    assert!(libraries.text().contains("H5P.TrueFalse"));

    let export = server.get(&format!("/api/v1/h5p/export/{content_id}")).await;
    export.assert_status_ok();
    assert!(export.as_bytes().starts_with(b"PK"));

    server
        .post("/api/v1/h5p/upload")
        .multipart(upload_form(b"not a zip".to_vec()))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

fn note_form() -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(b"xin chao".to_vec())
            .file_name("ghi-chu.txt")
            .mime_type("text/plain"),
    )
}

#[tokio::test]
async fn route_h5p_temporary_files_test() {
    let pool = setup_test_db().await;
    setup_accounts(&pool).await;
    let mut server = setup_server(&pool).await;
    server.save_cookies();

    let login = |email: &str| json!({ "email": email, "password": PASSWORD });
    server
        .post("/api/v1/auth/login")
        .json(&login("giaovien@truong.vn"))
        .await
        .assert_status_ok();

    let upload = server.post("/api/v1/h5p/files").multipart(note_form()).await;
    upload.assert_status(StatusCode::CREATED);
    let file: Value = upload.json();
    assert_eq!(file["filename"], "ghi-chu.txt");
    assert_eq!(file["size"], 8);
    assert!(file.get("path").is_none());
    let file_id = file["id"].as_str().unwrap().to_string();

    let download = server.get(&format!("/api/v1/h5p/files/{file_id}")).await;
    download.assert_status_ok();
    assert_eq!(&download.as_bytes()[..], b"xin chao");

    let own: Value = server.get("/api/v1/h5p/files").await.json();
    assert_eq!(own.as_array().unwrap().len(), 1);

    server
        .get("/api/v1/h5p/files-stats")
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // an expired file is gone for readers but can still be extended by its owner
    pool.execute("UPDATE h5p_temporary_files SET expires_at = NOW() - INTERVAL '1 hour'")
        .await;
    server
        .get(&format!("/api/v1/h5p/files/{file_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let own: Value = server.get("/api/v1/h5p/files").await.json();
    assert!(own.as_array().unwrap().is_empty());

    server
        .patch(&format!("/api/v1/h5p/files/{file_id}/extend"))
        .add_query_param("hours", 48)
        .await
        .assert_status_ok();
    server
        .get(&format!("/api/v1/h5p/files/{file_id}"))
        .await
        .assert_status_ok();

    server
        .patch(&format!("/api/v1/h5p/files/{file_id}/extend"))
        .add_query_param("hours", 0)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    pool.execute("UPDATE h5p_temporary_files SET expires_at = NOW() - INTERVAL '1 hour'")
        .await;

    server.clear_cookies();
    server
        .post("/api/v1/auth/login")
        .json(&login("admin@truong.vn"))
        .await
        .assert_status_ok();

    let stats: Value = server.get("/api/v1/h5p/files-stats").await.json();
    assert_eq!(stats["totalFiles"], 1);
    assert_eq!(stats["expiredFiles"], 1);
    assert_eq!(stats["totalSize"], 8);

    let cleanup = server.post("/api/v1/h5p/files/cleanup").await;
    cleanup.assert_status_ok();
    let cleanup: Value = cleanup.json();
    assert_eq!(cleanup["removedFiles"], 1);

    let stats: Value = server.get("/api/v1/h5p/files-stats").await.json();
    assert_eq!(stats["totalFiles"], 0);
}
