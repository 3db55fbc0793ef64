mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::json;
use tower::ServiceExt;

use common::{TestApp, test_config};

#[tokio::test]
async fn health_needs_no_credentials() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_then_me_returns_profile() {
    let app = TestApp::new();
    let alice = app.register("alice").await;

    let (status, me) = app.get("/api/auth/me", &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], alice.id.as_str());
    assert_eq!(me["email"], "alice@example.test");
    assert_eq!(me["nickname"], "alice");
}

#[tokio::test]
async fn duplicate_email_and_nickname_conflict() {
    let app = TestApp::new();
    app.register("alice").await;

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "ALICE@example.test",
                "password": "another-pass",
                "nickname": "alice2",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "other@example.test",
                "password": "another-pass",
                "nickname": "alice",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_rejects_short_password() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "a@b.c", "password": "short", "nickname": "shorty" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("password"));
}

#[tokio::test]
async fn closed_registration_is_forbidden() {
    let mut config = test_config();
    config.auth.registration_open = false;
    let app = TestApp::with_config(config);
    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "a@b.c", "password": "long-enough", "nickname": "a" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn login_checks_password() {
    let app = TestApp::new();
    app.register("bob").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "bob@example.test", "password": "correct-horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "bob@example.test", "password": "wrong-horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, _) = app.call("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/auth/me", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_authenticates() {
    let app = TestApp::new();
    let carol = app.register("carol").await;
    let req = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, format!("taskboard_session={}", carol.token))
        .body(Body::empty())
        .expect("request");
    let (status, me) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["nickname"], "carol");
}

#[tokio::test]
async fn refresh_token_rotates() {
    let app = TestApp::new();
    let (_, login) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "dave@example.test",
                "password": "correct-horse",
                "nickname": "dave",
            })),
        )
        .await;
    let refresh = login["refresh_token"].as_str().expect("refresh").to_string();

    let (status, rotated) = app
        .call(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh_token"], refresh.as_str());

    // The old token was consumed by the first refresh.
    let (status, _) = app
        .call(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_refresh_token_and_clears_cookies() {
    let app = TestApp::new();
    let (_, login) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "erin@example.test",
                "password": "correct-horse",
                "nickname": "erin",
            })),
        )
        .await;
    let access = login["access_token"].as_str().expect("access").to_string();
    let refresh = login["refresh_token"].as_str().expect("refresh").to_string();

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "refresh_token": refresh }).to_string()))
        .expect("request");
    let resp = app.router.clone().oneshot(req).await.expect("logout");
    assert_eq!(resp.status(), StatusCode::OK);
    let cookies: Vec<String> = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().expect("ascii cookie").to_string())
        .collect();
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("taskboard_session=;") && c.contains("Max-Age=0")),
        "{cookies:?}"
    );
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("taskboard_refresh=;") && c.contains("Max-Age=0")),
        "{cookies:?}"
    );

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_without_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, _) = app.call("POST", "/api/auth/refresh", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_profile_and_nickname_conflict() {
    let app = TestApp::new();
    let erin = app.register("erin").await;
    app.register("frank").await;

    let (status, me) = app
        .put(
            "/api/auth/me",
            &erin.token,
            json!({ "nickname": "erin2", "avatar_url": "https://img.example/e.png" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["nickname"], "erin2");
    assert_eq!(me["avatar_url"], "https://img.example/e.png");

    let (status, _) = app
        .put("/api/auth/me", &erin.token, json!({ "nickname": "frank" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn change_password_requires_current_one() {
    let app = TestApp::new();
    let gus = app.register("gus").await;

    let (status, _) = app
        .put(
            "/api/auth/password",
            &gus.token,
            json!({ "current_password": "nope-nope", "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .put(
            "/api/auth/password",
            &gus.token,
            json!({ "current_password": "correct-horse", "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "gus@example.test", "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn delete_account_removes_owned_boards() {
    let app = TestApp::new();
    let hal = app.register("hal").await;
    let board_id = app.create_board(&hal, "Doomed").await;

    let (status, _) = app
        .call(
            "DELETE",
            "/api/auth/me",
            Some(&hal.token),
            Some(json!({ "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(
            "DELETE",
            "/api/auth/me",
            Some(&hal.token),
            Some(json!({ "password": "correct-horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/api/boards/{board_id}"), &hal.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The email is free again.
    app.register("hal").await;
}
