mod common;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use notnatty_backend::{mailer::MailKind, store::UserStore};
use serde_json::json;

use common::{fields, test_config, TestApp, PASSWORD};

#[tokio::test]
async fn register_returns_a_token_and_the_normalised_user() {
    let app = TestApp::new();

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": " Lifter@Example.com ", "username": "Lifter_1", "password": PASSWORD, "fullName": "Big Lifter" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User registered successfully");
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["email"], "lifter@example.com");
    assert_eq!(body["user"]["username"], "lifter_1");
    assert_eq!(body["user"]["emailVerified"], false);
    assert!(body["user"].get("passwordHash").is_none());
    assert_eq!(app.mails.count(MailKind::Verification), 1);

    let token = body["token"].as_str().unwrap();
    let (status, profile) = app.get("/users/profile", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["settings"]["privacy"]["cycleVisibility"], "followers");
}

#[tokio::test]
async fn taken_email_or_username_is_a_conflict() {
    let app = TestApp::new();
    app.register("first").await;

    for (email, username) in [("first@example.com", "second"), ("other@example.com", "first")] {
        let (status, body) = app
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "email": email, "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "User already exists");
    }

    assert!(app.store.find_credentials("other@example.com").await.unwrap().is_none());
    assert_eq!(app.mails.count(MailKind::Verification), 1);
}

#[tokio::test]
async fn registration_reports_every_bad_field() {
    let app = TestApp::new();

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "username": "ab", "password": "short" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    let mut bad = fields(&body);
    bad.sort();
    assert_eq!(bad, ["email", "password", "username"]);
}

#[tokio::test]
async fn login_checks_the_password() {
    let app = TestApp::new();
    let user = app.register("squatter").await;

    let (status, body) = app
        .request(Method::POST, "/auth/login", None, Some(json!({ "email": "SQUATTER@example.com", "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert!(body["user"]["lastLoginAt"].is_string());

    for (email, password) in [(user.email.as_str(), "wrong-password"), ("nobody@example.com", PASSWORD)] {
        let (status, body) = app
            .request(Method::POST, "/auth/login", None, Some(json!({ "email": email, "password": password })))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }
}

#[tokio::test]
async fn protected_routes_need_a_valid_bearer_token() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/users/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing token");

    let (status, body) = app.get("/users/profile", "not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn deactivated_account_tokens_stop_working() {
    let app = TestApp::new();
    let user = app.register("quitter").await;

    let (status, body) = app.delete("/users/profile", &user.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Account deactivated");

    let (status, body) = app.get("/users/profile", &user.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account disabled");

    let (status, _) = app.post("/posts", &user.token, json!({ "content": "still here?" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .request(Method::POST, "/auth/login", None, Some(json!({ "email": user.email, "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account disabled");

    assert!(app.store.set_active(user.id, true).await.unwrap());
    let (status, _) = app.get("/users/profile", &user.token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn verification_token_is_single_use() {
    let app = TestApp::new();
    let user = app.register("bencher").await;
    let token = app.mails.last_token(MailKind::Verification, &user.email).unwrap();

    let uri = format!("/auth/verify-email?token={token}");
    let (status, body) = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["emailVerified"], true);

    let (status, body) = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid token");

    // Already verified: nothing new goes out.
    let (status, _) = app
        .request(Method::POST, "/auth/resend-verification", None, Some(json!({ "email": user.email })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.mails.count(MailKind::Verification), 1);
}

#[tokio::test]
async fn expired_verification_token_is_refused() {
    let app = TestApp::with_config(test_config_with_ttl(Duration::hours(-1)));
    let user = app.register("latecomer").await;
    let token = app.mails.last_token(MailKind::Verification, &user.email).unwrap();

    let (status, _) = app
        .request(Method::GET, &format!("/auth/verify-email?token={token}"), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn test_config_with_ttl(ttl: Duration) -> notnatty_backend::config::Config {
    notnatty_backend::config::Config { verification_ttl: ttl, reset_ttl: ttl, ..test_config() }
}

#[tokio::test]
async fn password_reset_swaps_the_credentials() {
    let app = TestApp::new();
    let user = app.register("deadlifter").await;

    let (status, _) = app
        .request(Method::POST, "/auth/forgot-password", None, Some(json!({ "email": "ghost@example.com" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.mails.count(MailKind::PasswordReset), 0);

    let (status, _) = app
        .request(Method::POST, "/auth/forgot-password", None, Some(json!({ "email": user.email })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = app.mails.last_token(MailKind::PasswordReset, &user.email).unwrap();

    let (status, body) = app
        .request(Method::POST, "/auth/reset-password", None, Some(json!({ "token": token, "newPassword": "short" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fields(&body), ["newPassword"]);

    let (status, _) = app
        .request(Method::POST, "/auth/reset-password", None, Some(json!({ "token": token, "newPassword": "brand-new-pass" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(Method::POST, "/auth/login", None, Some(json!({ "email": user.email, "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::POST, "/auth/login", None, Some(json!({ "email": user.email, "password": "brand-new-pass" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(Method::POST, "/auth/reset-password", None, Some(json!({ "token": token, "newPassword": "another-pass" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
