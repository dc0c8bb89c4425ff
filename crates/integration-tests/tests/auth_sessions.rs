//! Session issuing, verification and revocation over HTTP.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use shopfront_core::Role;
use shopfront_integration_tests::{PASSWORD, TestApp};

#[tokio::test]
async fn test_login_token_carries_stored_role() {
    let app = TestApp::spawn().await;

    for (email, role) in [
        ("shopper@example.com", Role::Shopper),
        ("admin@example.com", Role::Admin),
    ] {
        let client = TestApp::client();
        let user = app.register_and_login(&client, email, role).await;

        let resp = client
            .get(app.url("/api/auth/check-auth"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["id"], user.id.as_i32());
        assert_eq!(body["data"]["role"], role.to_string());
    }
}

#[tokio::test]
async fn test_bearer_token_works_without_cookie() {
    let app = TestApp::spawn().await;
    app.create_user("jane@example.com", Role::Shopper).await;

    let login = app.login(&TestApp::client(), "jane@example.com").await;
    let token = login["data"]["token"].as_str().unwrap();

    let resp = reqwest::Client::new()
        .get(app.url("/api/auth/check-auth"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_the_same() {
    let app = TestApp::spawn().await;
    app.create_user("jane@example.com", Role::Shopper).await;
    let client = TestApp::client();

    let wrong_password = client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "jane@example.com", "password": "not-the-password" }))
        .send()
        .await
        .unwrap();
    let unknown_email = client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_email.json().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = TestApp::spawn().await;
    app.create_user("jane@example.com", Role::Shopper).await;

    let client = TestApp::client();
    let login = app.login(&client, "jane@example.com").await;
    let token = login["data"]["token"].as_str().unwrap().to_string();

    let resp = client
        .post(app.url("/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // The cookie is gone and the token itself is on the deny-list
    let resp = client
        .get(app.url("/api/auth/check-auth"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = reqwest::Client::new()
        .get(app.url("/api/auth/check-auth"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tampered_token_is_rejected() {
    let app = TestApp::spawn().await;
    app.create_user("jane@example.com", Role::Shopper).await;

    let login = app.login(&TestApp::client(), "jane@example.com").await;
    let token = login["data"]["token"].as_str().unwrap();

    // Swap the payload for one claiming the admin role
    let mut parts: Vec<&str> = token.split('.').collect();
    let forged_payload = "eyJzdWIiOjEsInJvbGUiOiJhZG1pbiJ9";
    parts[1] = forged_payload;
    let forged = parts.join(".");

    let resp = reqwest::Client::new()
        .get(app.url("/api/auth/check-auth"))
        .bearer_auth(&forged)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    let register = |body: Value| {
        client
            .post(app.url("/api/auth/register"))
            .json(&body)
            .send()
    };

    let resp = register(json!({ "userName": "Jane", "email": "jane@example.com", "password": PASSWORD }))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "shopper");
    assert!(body["data"].get("passwordHash").is_none());

    let resp = register(json!({ "userName": "Jane", "email": "JANE@example.com", "password": PASSWORD }))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = register(json!({ "userName": "Short", "email": "short@example.com", "password": "short" }))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = register(json!({ "userName": "Bad", "email": "not-an-email", "password": PASSWORD }))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register_and_login(&client, "jane@example.com", Role::Shopper)
        .await;

    let resp = client
        .put(app.url("/api/auth/password"))
        .json(&json!({ "currentPassword": "wrong-password", "newPassword": "brand-new-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .put(app.url("/api/auth/password"))
        .json(&json!({ "currentPassword": PASSWORD, "newPassword": "brand-new-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = TestApp::client()
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "jane@example.com", "password": "brand-new-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
