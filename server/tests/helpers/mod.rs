//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum router,
//! plus utilities for user creation, club fixtures and JWT generation.
//!
//! ## Shared Resources
//!
//! The pool connects lazily, so tests that never reach the database (health,
//! bad tokens, validation) run without `PostgreSQL`. Database-backed tests are
//! `#[ignore]`d and need the container described on `Config::default_for_test`.
//!
//! ## Cleanup Guards
//!
//! Use [`CleanupGuard`] for RAII-based cleanup that runs even if a test panics.
#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, header, Method, Request, Response};
use axum::Router;
use clubhub_server::api::{create_router, AppState};
use clubhub_server::auth::jwt;
use clubhub_server::config::Config;
use clubhub_server::db;
use clubhub_server::permissions::ClubRole;
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

// ============================================================================
// Cleanup Guard
// ============================================================================

/// Async cleanup action type.
type CleanupAction = Box<dyn FnOnce(PgPool) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// RAII guard that runs cleanup actions on drop, even if the test panics.
pub struct CleanupGuard {
    pool: PgPool,
    actions: Vec<CleanupAction>,
}

impl CleanupGuard {
    /// Create a new cleanup guard for the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            actions: Vec::new(),
        }
    }

    /// Register a generic async cleanup action.
    pub fn add<F, Fut>(&mut self, action: F)
    where
        F: FnOnce(PgPool) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.actions.push(Box::new(move |pool| Box::pin(action(pool))));
    }

    /// Register cleanup to delete a user by ID.
    pub fn delete_user(&mut self, user_id: Uuid) {
        self.add(move |pool| async move {
            let _ = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(user_id)
                .execute(&pool)
                .await;
        });
    }

    /// Register cleanup to delete a club (and everything that cascades from it).
    pub fn delete_club(&mut self, club_id: Uuid) {
        self.add(move |pool| async move {
            let _ = sqlx::query("DELETE FROM clubs WHERE id = $1")
                .bind(club_id)
                .execute(&pool)
                .await;
        });
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let actions = std::mem::take(&mut self.actions);
        if actions.is_empty() {
            return;
        }

        let pool = self.pool.clone();
        let handle = tokio::runtime::Handle::current();

        // Spawn a blocking thread to run async cleanup.
        // This works regardless of tokio runtime flavor.
        std::thread::spawn(move || {
            handle.block_on(async move {
                for action in actions {
                    action(pool.clone()).await;
                }
            });
        })
        .join()
        .expect("Cleanup thread panicked");
    }
}

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a new test app with a lazily connected pool.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app with a custom config.
    pub fn with_config(config: Config) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&config.database_url)
            .expect("Invalid test database URL");

        let state = AppState::new(pool.clone(), config.clone(), None);
        let router = create_router(state);

        Self {
            router,
            pool,
            config: Arc::new(config),
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send a request, optionally authenticated, with an optional JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Self::request(method, uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");
        self.oneshot(request).await
    }

    /// Create a [`CleanupGuard`] for this app's pool.
    pub fn cleanup_guard(&self) -> CleanupGuard {
        CleanupGuard::new(self.pool.clone())
    }

    /// Access token for a user, signed with this app's secret.
    pub fn token_for(&self, user_id: Uuid) -> String {
        generate_access_token(&self.config, user_id)
    }
}

// ============================================================================
// User & Auth helpers
// ============================================================================

/// Create a test user and return `(user_id, username, email)`.
pub async fn create_test_user(pool: &PgPool) -> (Uuid, String, String) {
    let username = format!("httptest_{}", random_suffix());
    let email = format!("{username}@example.com");

    let user = db::create_user(pool, &username, "HTTP Test User", &email, "hash")
        .await
        .expect("Failed to create test user");
    (user.id, username, email)
}

/// Generate an access token for the given user.
pub fn generate_access_token(config: &Config, user_id: Uuid) -> String {
    jwt::generate_access_token(user_id, &config.jwt_secret, config.jwt_access_expiry)
        .expect("Failed to generate access token")
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

// ============================================================================
// Club helpers
// ============================================================================

/// Eight random hex characters.
pub fn random_suffix() -> String {
    // The tail of a v7 UUID is random; the head is a timestamp.
    let id = Uuid::now_v7().simple().to_string();
    id[id.len() - 8..].to_string()
}

/// Unique club code for a test.
pub fn unique_code(prefix: &str) -> String {
    format!("{prefix}-{}", random_suffix())
}

/// Insert an approved club directly and return its ID.
pub async fn insert_club(pool: &PgPool, code: &str) -> Uuid {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO clubs (code, name, approved, active) VALUES ($1, $2, TRUE, TRUE) RETURNING id",
    )
    .bind(code)
    .bind(code.to_uppercase())
    .fetch_one(pool)
    .await
    .expect("Failed to insert club");
    id
}

/// Give a user a role in a club.
pub async fn add_membership(pool: &PgPool, club_id: Uuid, user_id: Uuid, role: ClubRole) {
    sqlx::query("INSERT INTO memberships (club_id, user_id, role, title) VALUES ($1, $2, $3, $4)")
        .bind(club_id)
        .bind(user_id)
        .bind(role)
        .bind(role.label())
        .execute(pool)
        .await
        .expect("Failed to add membership");
}

/// Link `child` under `parent`.
pub async fn link_clubs(pool: &PgPool, parent_id: Uuid, child_id: Uuid) {
    sqlx::query("INSERT INTO club_relationships (parent_id, child_id) VALUES ($1, $2)")
        .bind(parent_id)
        .bind(child_id)
        .execute(pool)
        .await
        .expect("Failed to link clubs");
}
