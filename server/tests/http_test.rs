//! HTTP Surface Tests
//!
//! Requests that never reach the database: health, authentication
//! rejections, static endpoints and the API document.
//!
//! Run with: `cargo test --test http_test`

mod helpers;

use axum::http::{header, Method, StatusCode};
use helpers::{body_to_json, TestApp};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_check() {
    let app = TestApp::new();
    let resp = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_to_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["email"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_token_is_rejected() {
    let app = TestApp::new();
    let resp = app
        .send(Method::GET, "/api/clubs", Some("not-a-jwt"), None)
        .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_non_bearer_header_is_rejected() {
    let app = TestApp::new();
    let req = TestApp::request(Method::GET, "/api/clubs")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_token_signed_with_other_secret_is_rejected() {
    let app = TestApp::new();
    let mut other = clubhub_server::config::Config::default_for_test();
    other.jwt_secret = "another-secret".into();
    let token = helpers::generate_access_token(&other, uuid::Uuid::now_v7());

    let resp = app.send(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_anonymous_club_creation_requires_auth() {
    let app = TestApp::new();
    let resp = app
        .send(
            Method::POST,
            "/api/clubs",
            None,
            Some(serde_json::json!({"name": "Chess Club"})),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_to_json(resp).await;
    assert_eq!(body["error"], "MISSING_AUTH");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_profile_requires_auth() {
    let app = TestApp::new();
    let resp = app.send(Method::GET, "/auth/me", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_club_fields_listing() {
    let app = TestApp::new();
    let resp = app.send(Method::GET, "/api/clubs/fields", None, None).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_to_json(resp).await;
    assert_eq!(body["Name"], "name");
    assert_eq!(body["Application Required"], "application_required");
    assert_eq!(body.as_object().map(serde_json::Map::len), Some(12));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_openapi_document_is_served() {
    let app = TestApp::new();
    let resp = app
        .send(Method::GET, "/api/docs/openapi.json", None, None)
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_to_json(resp).await;
    assert!(body["paths"]["/api/clubs/{code}/invite"]["post"].is_object());
    assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_register_reports_invalid_fields() {
    let app = TestApp::new();
    let resp = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(serde_json::json!({
                "username": "Not Valid",
                "email": "nope",
                "password": "longenough"
            })),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_to_json(resp).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["fields"]["username"].is_array());
    assert_eq!(body["fields"]["email"][0], "Enter a valid email address.");
    assert!(body["fields"].get("password").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bookmarks_require_auth() {
    let app = TestApp::new();
    for uri in ["/api/favorites", "/api/subscriptions"] {
        let resp = app.send(Method::GET, uri, None, None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
    let resp = app
        .send(
            Method::PATCH,
            "/auth/me",
            None,
            Some(serde_json::json!({"display_name": "Ada"})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
