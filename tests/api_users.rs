mod common;

use common::{app, send, sign_up, unique_email};
use serde_json::json;
use warp::http::StatusCode;

#[tokio::test]
async fn users_register_without_echoing_the_password() {
    let Some(app) = app().await else { return };
    let email = unique_email();

    let (status, body) = send(
        &app.state,
        "POST",
        "/api/user/create",
        None,
        Some(json!({"email": email, "password": "testpass123", "name": "Test Name"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"email": email, "name": "Test Name"}));
}

#[tokio::test]
async fn duplicate_emails_and_short_passwords_are_rejected() {
    let Some(app) = app().await else { return };
    let email = unique_email();
    let payload = json!({"email": email, "password": "testpass123", "name": "Test"});

    let (status, _) = send(&app.state, "POST", "/api/user/create", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app.state, "POST", "/api/user/create", None, Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());

    let (status, body) = send(
        &app.state,
        "POST",
        "/api/user/create",
        None,
        Some(json!({"email": unique_email(), "password": "pw", "name": "Test"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("password").is_some());
}

#[tokio::test]
async fn tokens_need_matching_credentials() {
    let Some(app) = app().await else { return };
    let email = unique_email();
    send(
        &app.state,
        "POST",
        "/api/user/create",
        None,
        Some(json!({"email": email, "password": "testpass123", "name": "Test"})),
    )
    .await;

    let (status, body) = send(
        &app.state,
        "POST",
        "/api/user/token",
        None,
        Some(json!({"email": email, "password": "wrong-password"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"non_field_errors": ["Unable to authenticate with provided credentials"]})
    );
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn profiles_update_name_but_keep_email() {
    let Some(app) = app().await else { return };
    let token = sign_up(&app.state).await;

    let (status, before) = send(&app.state, "GET", "/api/user/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["name"], "Test Name");

    let (status, after) = send(
        &app.state,
        "PATCH",
        "/api/user/me",
        Some(&token),
        Some(json!({"name": "New Name", "email": "changed@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["name"], "New Name");
    assert_eq!(after["email"], before["email"]);
}
