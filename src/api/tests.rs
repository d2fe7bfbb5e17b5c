// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Router-level scenarios driven through `tower::ServiceExt::oneshot`.

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    Extension,
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Method, Request, StatusCode,
    },
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use super::router;
use crate::config::Config;
use crate::state::AppState;

const OWNER: [u8; 4] = [10, 0, 0, 5];
const STRANGER: [u8; 4] = [10, 0, 0, 6];
const FOLDER: &str = "10.0.0.5";
const BOUNDARY: &str = "filedrop-test-boundary";

struct TestApp {
    dir: TempDir,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let state = AppState::new(&Config::for_tests(dir.path())).unwrap();
        Self { dir, state }
    }

    fn as_peer(&self, peer: [u8; 4]) -> Router {
        router(self.state.clone()).layer(Extension(ConnectInfo(SocketAddr::from((peer, 40_000)))))
    }

    async fn send(&self, peer: [u8; 4], request: Request<Body>) -> Response {
        self.as_peer(peer).oneshot(request).await.unwrap()
    }

    async fn upload(&self, peer: [u8; 4], name: &str, contents: &str) -> Response {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {contents}\r\n\
             --{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(peer, request).await
    }

    async fn set_pin(&self, peer: [u8; 4], body: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/uploads/{FOLDER}/set-pin"))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(peer, request).await
    }

    async fn submit_pin(&self, form: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/uploads/{FOLDER}/pin"))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        self.send(STRANGER, request).await
    }

    fn folder_path(&self) -> std::path::PathBuf {
        self.dir.path().join(FOLDER)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn location(response: &Response) -> String {
    response.headers()[LOCATION].to_str().unwrap().to_string()
}

/// `name=value` of the cookie `name` set by the response.
fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

#[tokio::test]
async fn plaintext_upload_and_download() {
    let app = TestApp::new();

    let response = app.upload(OWNER, "my notes.txt", "hello drop").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(set_cookie(&response, "ft_session").is_some());

    let on_disk = std::fs::read(app.folder_path().join("my_notes.txt")).unwrap();
    assert_eq!(on_disk, b"hello drop");

    let response = app
        .send(STRANGER, get(&format!("/uploads/{FOLDER}/my_notes.txt")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        "attachment; filename=\"my_notes.txt\""
    );
    assert_eq!(body_bytes(response).await, b"hello drop");

    let response = app
        .send(STRANGER, get(&format!("/uploads/{FOLDER}/my_notes.txt?preview=1")))
        .await;
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        "inline; filename=\"my_notes.txt\""
    );
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );

    let listing = body_text(app.send(STRANGER, get("/uploads")).await).await;
    assert!(listing.contains(FOLDER));
    let files = body_text(app.send(STRANGER, get(&format!("/uploads/{FOLDER}"))).await).await;
    assert!(files.contains("my_notes.txt"));
}

#[tokio::test]
async fn uploader_endpoints_report_callers_folder() {
    let app = TestApp::new();

    let body = body_json(app.send(OWNER, get("/api/uploader-folder")).await).await;
    assert_eq!(body, json!({ "folder": FOLDER }));

    let body = body_json(app.send(OWNER, get("/api/uploader-has-folder")).await).await;
    assert_eq!(body, json!({ "has_folder": false }));

    app.upload(OWNER, "a.txt", "a").await;
    let body = body_json(app.send(OWNER, get("/api/uploader-has-folder")).await).await;
    assert_eq!(body, json!({ "has_folder": true }));
}

#[tokio::test]
async fn protected_download_redirects_then_unlocks() {
    let app = TestApp::new();
    app.upload(OWNER, "secret.txt", "top secret").await;

    let response = app.set_pin(OWNER, r#"{"pin": "1234"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true, "has_pin": true }));

    let on_disk = std::fs::read(app.folder_path().join("secret.txt")).unwrap();
    assert_ne!(on_disk, b"top secret");

    let file_uri = format!("/uploads/{FOLDER}/secret.txt");
    let response = app.send(STRANGER, get(&file_uri)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let pin_page = location(&response);
    assert!(pin_page.starts_with(&format!("/uploads/{FOLDER}/pin?next=")));

    let page = body_text(app.send(STRANGER, get(&pin_page)).await).await;
    assert!(page.contains("is protected"));

    let response = app
        .submit_pin("pin=1234&next=%2Fuploads%2F10.0.0.5%2Fsecret.txt")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), file_uri);
    let unlock = set_cookie(&response, "FT_UNLOCKS").expect("unlock cookie");
    let session = set_cookie(&response, "ft_session").expect("session cookie");

    // Either credential alone opens the file.
    for cookie in [&unlock, &session] {
        let response = app.send(STRANGER, get_with_cookie(&file_uri, cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"top secret");
    }
}

#[tokio::test]
async fn locked_listing_redirects_to_pin_entry() {
    let app = TestApp::new();
    app.upload(OWNER, "a.txt", "a").await;
    app.set_pin(OWNER, r#"{"pin": "1234"}"#).await;

    let response = app.send(STRANGER, get(&format!("/uploads/{FOLDER}"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(&format!("/uploads/{FOLDER}/pin?next=")));

    // Uploading into a locked encrypted folder needs the PIN first.
    let response = app.upload(OWNER, "b.txt", "b").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(&format!("/uploads/{FOLDER}/pin?next=")));
    assert!(!app.folder_path().join("b.txt").exists());
}

#[tokio::test]
async fn removing_the_pin_restores_plaintext() {
    let app = TestApp::new();
    app.upload(OWNER, "doc.txt", "plain words").await;
    app.set_pin(OWNER, r#"{"pin": "1234"}"#).await;

    let response = app.set_pin(OWNER, r#"{"remove": true, "pin": "0000"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);

    let response = app.set_pin(OWNER, r#"{"remove": true, "pin": "1234"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true, "has_pin": false }));

    let on_disk = std::fs::read(app.folder_path().join("doc.txt")).unwrap();
    assert_eq!(on_disk, b"plain words");
}

#[tokio::test]
async fn malformed_set_pin_body_is_treated_as_empty() {
    let app = TestApp::new();
    app.upload(OWNER, "a.txt", "a").await;

    let response = app.set_pin(OWNER, "not json at all").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true, "has_pin": false }));
}

#[tokio::test]
async fn short_pin_is_rejected() {
    let app = TestApp::new();
    app.upload(OWNER, "a.txt", "a").await;

    let response = app.set_pin(OWNER, r#"{"pin": "12"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "PIN must be at least 4 characters" })
    );
}

#[tokio::test]
async fn foreign_ip_is_refused_by_owner_endpoints() {
    let app = TestApp::new();
    app.upload(OWNER, "keep.txt", "keep").await;

    let response = app.set_pin(STRANGER, r#"{"pin": "1234"}"#).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "You can only set a PIN for your own folder." })
    );

    let response = app
        .send(STRANGER, get(&format!("/uploads/{FOLDER}/pin-status")))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "has_pin": false }));

    let response = app
        .send(STRANGER, post(&format!("/uploads/{FOLDER}/keep.txt/delete")))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(STRANGER, post(&format!("/uploads/{FOLDER}/delete-folder")))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert!(app.folder_path().join("keep.txt").exists());
}

#[tokio::test]
async fn owner_can_query_status_and_delete() {
    let app = TestApp::new();
    app.upload(OWNER, "a.txt", "a").await;
    app.upload(OWNER, "b.txt", "b").await;

    let response = app
        .send(OWNER, get(&format!("/uploads/{FOLDER}/pin-status")))
        .await;
    assert_eq!(body_json(response).await, json!({ "has_pin": false }));

    let response = app
        .send(OWNER, post(&format!("/uploads/{FOLDER}/a.txt/delete")))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/uploads/{FOLDER}"));
    assert!(!app.folder_path().join("a.txt").exists());

    let response = app
        .send(OWNER, post(&format!("/uploads/{FOLDER}/missing.txt/delete")))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(OWNER, post(&format!("/uploads/{FOLDER}/delete-folder")))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/uploads");
    assert!(!app.folder_path().exists());
}

#[tokio::test]
async fn wrong_pins_lead_to_confirmed_deletion() {
    let app = TestApp::new();
    app.upload(OWNER, "a.txt", "a").await;
    app.set_pin(OWNER, r#"{"pin": "1234"}"#).await;

    let response = app.submit_pin("pin=0000").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("Wrong PIN. 9 attempts left."));

    for _ in 2..9 {
        let response = app.submit_pin("pin=0000").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Ninth failure: final warning with the confirmation checkbox.
    let response = app.submit_pin("pin=0000").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("confirm_final_attempt"));

    // Unconfirmed tenth attempt is held back, even with the right PIN.
    let response = app.submit_pin("pin=1234").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.folder_path().exists());

    let response = app.submit_pin("pin=0000&confirm_final_attempt=1").await;
    assert_eq!(response.status(), StatusCode::GONE);
    assert!(body_text(response).await.contains("Folder deleted"));
    assert!(!app.folder_path().exists());

    let response = app
        .send(STRANGER, get(&format!("/uploads/{FOLDER}/pin")))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_record_cleanup_after_lockout_is_a_server_error() {
    let app = TestApp::new();
    app.upload(OWNER, "a.txt", "a").await;
    app.set_pin(OWNER, r#"{"pin": "1234"}"#).await;

    // A directory at the temp path makes the next record write fail.
    let pins_file = app.state.storage.paths().pins_file();
    let name = pins_file.file_name().unwrap().to_string_lossy().into_owned();
    std::fs::create_dir(pins_file.with_file_name(format!(".{name}.tmp"))).unwrap();

    for _ in 0..9 {
        app.submit_pin("pin=0000").await;
    }
    let response = app.submit_pin("pin=0000&confirm_final_attempt=1").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(body_text(response)
        .await
        .contains("Folder deleted, but failed to remove PIN details."));
    assert!(!app.folder_path().exists());
}

#[tokio::test]
async fn empty_pin_submission_is_not_counted() {
    let app = TestApp::new();
    app.upload(OWNER, "a.txt", "a").await;
    app.set_pin(OWNER, r#"{"pin": "1234"}"#).await;

    let response = app.submit_pin("pin=").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("Please enter the PIN."));
    assert_eq!(app.state.pins.failed_attempts(FOLDER), 0);
}

#[tokio::test]
async fn unsafe_next_falls_back_to_folder() {
    let app = TestApp::new();
    app.upload(OWNER, "a.txt", "a").await;
    app.set_pin(OWNER, r#"{"pin": "1234"}"#).await;

    let response = app
        .submit_pin("pin=1234&next=%2F%2Fevil.example%2F")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/uploads/{FOLDER}"));
}

#[tokio::test]
async fn path_escapes_are_not_found() {
    let app = TestApp::new();
    app.upload(OWNER, "a.txt", "a").await;

    let response = app
        .send(STRANGER, get(&format!("/uploads/{FOLDER}/..%2F..%2Fetc")))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send(STRANGER, get("/uploads/..%2Fsecret")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_probes() {
    let app = TestApp::new();

    let response = app.send(OWNER, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["storage"], "ok");

    let response = app.send(OWNER, get("/health/live")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, "ft_session").is_none());
}
