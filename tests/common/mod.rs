#![allow(dead_code)]

use std::{collections::HashMap, io::Cursor, path::Path};

use image::{ImageBuffer, ImageFormat, Rgb};
use recipe_api::{config::Config, routes, AppState};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tempfile::{tempdir, TempDir};
use uuid::Uuid;
use warp::http::StatusCode;

pub const BOUNDARY: &str = "recipe-api-test-boundary";

pub fn config(database_url: &str, media_root: &Path) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("DATABASE_URL", database_url.to_string()),
        ("JWT_SECRET", "integration-test-secret".to_string()),
        ("MEDIA_ROOT", media_root.display().to_string()),
        ("MEDIA_URL", "/media/".to_string()),
    ]);

    Config::from_lookup(move |key: &str| vars.get(key).cloned()).expect("test config")
}

/// A running state plus the media directory it writes into.
pub struct TestApp {
    pub state: AppState,
    pub media: TempDir,
}

/// Connects to `TEST_DATABASE_URL`, or returns `None` when it is unset.
pub async fn app() -> Option<TestApp> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL is not set, skipping");
            return None;
        }
    };

    let media = tempdir().expect("media dir");
    let state = AppState::connect(config(&url, media.path()))
        .await
        .expect("connect to test database");

    Some(TestApp { state, media })
}

/// A state whose pool never connects; good for requests refused before any query.
pub fn offline_state(media_root: &Path) -> AppState {
    let url = "postgres://postgres@localhost:5432/unused";
    let pool = PgPoolOptions::new()
        .connect_lazy(url)
        .expect("lazy pool");

    AppState::new(pool, config(url, media_root))
}

pub async fn send(
    state: &AppState,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let filter = routes(state.clone());

    let mut request = warp::test::request().method(method).path(path);
    if let Some(token) = token {
        request = request.header("authorization", format!("Token {token}"));
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.reply(&filter).await;
    let body = if response.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(response.body()).expect("json body")
    };
    (response.status(), body)
}

pub fn unique_email() -> String {
    format!("user-{}@example.com", Uuid::new_v4())
}

/// Registers a fresh user and returns its token.
pub async fn sign_up(state: &AppState) -> String {
    let email = unique_email();
    let (status, _) = send(
        state,
        "POST",
        "/api/user/create",
        None,
        Some(json!({"email": email, "password": "testpass123", "name": "Test Name"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        state,
        "POST",
        "/api/user/token",
        None,
        Some(json!({"email": email, "password": "testpass123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    body["token"].as_str().expect("token").to_string()
}

pub async fn create_attribute(state: &AppState, token: &str, kind: &str, name: &str) -> i64 {
    let (status, body) = send(
        state,
        "POST",
        &format!("/api/recipe/{kind}"),
        Some(token),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    body["id"].as_i64().expect("attribute id")
}

pub async fn create_recipe(state: &AppState, token: &str, payload: Value) -> Value {
    let (status, body) = send(state, "POST", "/api/recipe/recipes", Some(token), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    body
}

pub fn sample_recipe(title: &str) -> Value {
    json!({"title": title, "time_minutes": 10, "price": "5.00"})
}

pub fn jpeg() -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(10, 10);
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Jpeg).expect("encode jpeg");
    bytes.into_inner()
}

pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn upload(state: &AppState, token: &str, recipe_id: i64, body: Vec<u8>) -> (StatusCode, Value) {
    let filter = routes(state.clone());
    let response = warp::test::request()
        .method("POST")
        .path(&format!("/api/recipe/recipes/{recipe_id}/upload-image"))
        .header("authorization", format!("Token {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .reply(&filter)
        .await;

    let body = serde_json::from_slice(response.body()).expect("json body");
    (response.status(), body)
}
