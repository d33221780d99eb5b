//! API Integration Tests
//!
//! Drive the full router over in-memory stores.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use warden_api::{create_router, state::AppState};
use warden_core::{
    AppConfig, CredentialStore, InMemoryCredentialStore, InMemorySessionStore,
    PasswordHashConfig, SessionStore,
};

const PASSWORD: &str = "Str0ng!Pass";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    credentials: Arc<InMemoryCredentialStore>,
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.token.secret = "integration-test-secret".to_string();
    config.security.max_login_attempts = 3;
    config.security.password_hash = PasswordHashConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    };
    config
}

fn create_test_app() -> TestApp {
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let store: Arc<dyn CredentialStore> = credentials.clone();
    let state = Arc::new(AppState::new(test_config(), store, sessions).unwrap());

    TestApp {
        router: create_router(state.clone()),
        state,
        credentials,
    }
}

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn register(app: &TestApp, email: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({
                "email": email,
                "password": PASSWORD,
                "confirm_password": PASSWORD,
                "full_name": "Test User"
            })),
        ),
    )
    .await
}

async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": email, "password": password })),
        ),
    )
    .await
}

async fn refresh(app: &TestApp, token: &str) -> (StatusCode, Value) {
    send(
        app,
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": token })),
        ),
    )
    .await
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();

    let (status, json) = send(&app, create_json_request("GET", "/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = create_test_app();

    let (status, json) = send(&app, create_json_request("GET", "/ready", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);

    app.state.set_ready(false);
    let (status, json) = send(&app, create_json_request("GET", "/ready", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["ready"], false);
}

#[tokio::test]
async fn test_openapi_spec() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        create_json_request("GET", "/api-docs/openapi.json", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["openapi"].is_string());
    assert!(json["paths"]["/api/v1/auth/login"].is_object());
}

// =============================================================================
// Registration Tests
// =============================================================================

#[tokio::test]
async fn test_register_success() {
    let app = create_test_app();

    let (status, json) = register(&app, "alice@example.com").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "User registered successfully");
    assert!(json["user_id"].is_string());
    assert_eq!(app.credentials.len().await, 1);
}

#[tokio::test]
async fn test_register_weak_password() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({
                "email": "weak@example.com",
                "password": "weak",
                "confirm_password": "weak"
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("at least 8 characters"));
    assert!(message.contains("uppercase"));
    assert!(app.credentials.is_empty().await);

    // Long enough, but every other category is missing
    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({
                "email": "weak@example.com",
                "password": "password",
                "confirm_password": "password"
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = json["error"].as_str().unwrap();
    assert!(!message.contains("at least 8 characters"));
    assert!(message.contains("uppercase"));
    assert!(message.contains("digit"));
    assert!(message.contains("special character"));
}

#[tokio::test]
async fn test_register_duplicate() {
    let app = create_test_app();

    assert_eq!(register(&app, "dup@example.com").await.0, StatusCode::CREATED);
    let (status, json) = register(&app, "dup@example.com").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_register_invalid_body() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(json!({
                "email": "not-an-email",
                "password": PASSWORD,
                "confirm_password": PASSWORD
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("email"));
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_success() {
    let app = create_test_app();
    register(&app, "bob@example.com").await;

    let (status, json) = login(&app, "bob@example.com", PASSWORD).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["email"], "bob@example.com");
    assert!(json["user"]["last_login"].is_string());
    assert!(json["user"].get("password_hash").is_none());
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert!(json["expires_at"].is_i64());
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_email_look_alike() {
    let app = create_test_app();
    register(&app, "carol@example.com").await;

    let (wrong_status, wrong) = login(&app, "carol@example.com", "Wr0ng!Pass").await;
    let (unknown_status, unknown) = login(&app, "nobody@example.com", PASSWORD).await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
    assert_eq!(wrong["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_lockout() {
    let app = create_test_app();
    register(&app, "dave@example.com").await;

    for _ in 0..3 {
        let (status, _) = login(&app, "dave@example.com", "Wr0ng!Pass").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Correct password is refused while locked
    let (status, json) = login(&app, "dave@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(json["error"], "Account is locked");
}

// =============================================================================
// Token Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let app = create_test_app();
    register(&app, "erin@example.com").await;
    let (_, session) = login(&app, "erin@example.com", PASSWORD).await;
    let original = session["refresh_token"].as_str().unwrap().to_string();

    let (status, rotated) = refresh(&app, &original).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refresh_token"], session["refresh_token"]);
    assert!(rotated["access_token"].is_string());

    // The consumed token cannot be replayed
    let (status, json) = refresh(&app, &original).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Invalid refresh token");

    let (status, _) = refresh(&app, rotated["refresh_token"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_unknown_token() {
    let app = create_test_app();

    let (status, json) = refresh(&app, "never-issued").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Invalid refresh token");
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = create_test_app();
    register(&app, "frank@example.com").await;
    let (_, session) = login(&app, "frank@example.com", PASSWORD).await;
    let token = session["refresh_token"].as_str().unwrap();

    for _ in 0..2 {
        let (status, json) = send(
            &app,
            create_json_request(
                "POST",
                "/api/v1/auth/logout",
                Some(json!({ "refresh_token": token })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Logged out successfully");
    }

    let (status, _) = refresh(&app, token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Protected Route Tests
// =============================================================================

#[tokio::test]
async fn test_me_requires_auth() {
    let app = create_test_app();

    let (status, json) = send(&app, create_json_request("GET", "/api/v1/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "no auth header");

    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid format");

    let (status, json) = send(&app, bearer_request("GET", "/api/v1/auth/me", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid or expired token");
}

#[tokio::test]
async fn test_me_and_profile_with_token() {
    let app = create_test_app();
    register(&app, "grace@example.com").await;
    let (_, session) = login(&app, "grace@example.com", PASSWORD).await;
    let access = session["access_token"].as_str().unwrap();

    let (status, me) = send(&app, bearer_request("GET", "/api/v1/auth/me", access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "grace@example.com");

    let (status, profile) =
        send(&app, bearer_request("GET", "/api/v1/auth/profile", access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "grace@example.com");
    assert_eq!(profile["full_name"], "Test User");
}

#[tokio::test]
async fn test_inactive_account_rejected() {
    let app = create_test_app();
    let (_, registered) = register(&app, "heidi@example.com").await;
    let (_, session) = login(&app, "heidi@example.com", PASSWORD).await;
    let access = session["access_token"].as_str().unwrap();

    let user_id = registered["user_id"].as_str().unwrap().parse().unwrap();
    app.credentials.set_active(user_id, false).await.unwrap();

    let (status, json) = send(&app, bearer_request("GET", "/api/v1/auth/me", access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "user not found or inactive");
}

#[tokio::test]
async fn test_placeholder_endpoints() {
    let app = create_test_app();
    register(&app, "ivan@example.com").await;
    let (_, session) = login(&app, "ivan@example.com", PASSWORD).await;
    let access = session["access_token"].as_str().unwrap();

    for (method, uri) in [
        ("PUT", "/api/v1/auth/profile"),
        ("POST", "/api/v1/auth/change-password"),
        ("POST", "/api/v1/auth/enable-2fa"),
    ] {
        let (status, json) = send(&app, bearer_request(method, uri, access)).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED, "{method} {uri}");
        assert_eq!(json["error"], "not implemented");
    }

    // Placeholders stay behind authentication
    let (status, _) = send(
        &app,
        create_json_request("POST", "/api/v1/auth/change-password", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_responses_are_not_cacheable() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(create_json_request("GET", "/health", None))
        .await
        .unwrap();

    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
}
