//! Authentication Service
//!
//! Local username/password accounts identified by bearer tokens.

mod error;
pub mod handlers;
pub mod jwt;
mod middleware;
mod password;

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::AppState;

pub use error::{AuthError, AuthResult, ErrorResponse};
pub use handlers::{
    AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest, UserProfile,
};
pub use middleware::{authenticate, AuthUser, Viewer};
pub use password::{hash_password, verify_password};

/// Create authentication router.
///
/// - POST /register - Register a new user
/// - POST /login - Login with username/password
/// - GET /me - Get current user profile (auth required)
/// - PUT/PATCH /me - Update name or email (auth required)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route(
            "/me",
            get(handlers::get_profile)
                .put(handlers::update_profile)
                .patch(handlers::update_profile),
        )
}
