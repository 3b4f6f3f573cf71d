//! Authentication HTTP Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::error::{AuthError, AuthResult, ErrorResponse};
use super::jwt::generate_access_token;
use super::middleware::AuthUser;
use super::password::{hash_password, verify_password};
use crate::api::AppState;
use crate::clubs::FieldErrors;
use crate::db::{
    email_exists, find_user_by_email, find_user_by_username, username_exists, User,
};
use crate::permissions::SystemPermission;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Registration request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Username (3-32 lowercase alphanumeric + underscore).
    #[validate(
        length(min = 3, max = 32, message = "Username must be 3-32 characters."),
        regex(
            path = *USERNAME_REGEX,
            message = "Use only lowercase letters, numbers and underscores."
        )
    )]
    pub username: String,
    /// Email address. Invitations are matched against it.
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    /// Password (8-128 characters).
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters."))]
    pub password: String,
    /// Display name (optional, defaults to username).
    #[validate(length(max = 128, message = "Name must be at most 128 characters."))]
    pub display_name: Option<String>,
}

/// Login request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username, or the account's email address.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Authentication response with a bearer token.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Access token.
    pub access_token: String,
    /// Token expiry in seconds.
    pub expires_in: i64,
    /// Token type (always "Bearer").
    pub token_type: String,
}

/// Profile update. Fields left out are unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters."))]
    pub display_name: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
}

/// User profile response.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfile {
    /// User ID.
    pub id: Uuid,
    /// Username.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Email.
    pub email: String,
    /// Whether the user bypasses club permissions.
    pub is_superuser: bool,
    /// Organization-wide capabilities.
    #[schema(value_type = Vec<String>)]
    pub permissions: Vec<SystemPermission>,
}

// ============================================================================
// Regex for validation
// ============================================================================

/// Username validation regex.
static USERNAME_REGEX: std::sync::LazyLock<regex::Regex> =
    std::sync::LazyLock::new(|| regex::Regex::new(r"^[a-z0-9_]{3,32}$").expect("valid regex"));

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "A user with that email already exists.";

/// The `users` column a unique violation was raised on, if any.
fn taken_field(err: &sqlx::Error) -> Option<&'static str> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            if db.constraint().is_some_and(|c| c.contains("email")) {
                Some("email")
            } else {
                Some("username")
            }
        }
        _ => None,
    }
}

fn taken_error(field: &str) -> AuthError {
    let message = if field == "email" { EMAIL_TAKEN } else { USERNAME_TAKEN };
    AuthError::field(field, message)
}

fn token_response(state: &AppState, user: &User) -> AuthResult<AuthResponse> {
    let access_token =
        generate_access_token(user.id, &state.config.jwt_secret, state.config.jwt_access_expiry)?;
    Ok(AuthResponse {
        access_token,
        expires_in: state.config.jwt_access_expiry,
        token_type: "Bearer".to_string(),
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new user.
///
/// The very first account on a fresh install becomes a superuser so that
/// clubs can be approved at all. Registrations are serialized on an
/// advisory lock while the user count is checked.
///
/// POST /auth/register
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid or already taken fields", body = ErrorResponse),
    ),
)]
#[tracing::instrument(skip(state, body), fields(username = %body.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AuthResult<(StatusCode, Json<AuthResponse>)> {
    body.validate()?;

    // Uniqueness checks outside the transaction; the UNIQUE constraints catch races
    let mut taken = FieldErrors::default();
    if username_exists(&state.db, &body.username).await? {
        taken.add("username", USERNAME_TAKEN);
    }
    if email_exists(&state.db, &body.email).await? {
        taken.add("email", EMAIL_TAKEN);
    }
    if !taken.is_empty() {
        return Err(AuthError::Validation(taken));
    }

    let password_hash = hash_password(&body.password).map_err(|_| AuthError::PasswordHash)?;
    let display_name = body.display_name.as_deref().unwrap_or(&body.username);

    let mut tx = state.db.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(crate::db::REGISTRATION_LOCK)
        .execute(&mut *tx)
        .await?;

    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *tx)
        .await?;

    let user = sqlx::query_as::<_, User>(
        r"
        INSERT INTO users (username, display_name, email, password_hash, is_superuser)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(&body.username)
    .bind(display_name)
    .bind(&body.email)
    .bind(&password_hash)
    .bind(user_count == 0)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| taken_field(&e).map_or(AuthError::Database(e), taken_error))?;

    tx.commit().await?;

    if user.is_superuser {
        tracing::info!(user_id = %user.id, "First user registered as superuser");
    } else {
        tracing::info!(user_id = %user.id, "User registered");
    }

    Ok((StatusCode::CREATED, Json(token_response(&state, &user)?)))
}

/// Login with username/password.
///
/// A `username` containing `@` is looked up as an email address.
///
/// POST /auth/login
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    ),
)]
#[tracing::instrument(skip(state, body), fields(username = %body.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AuthResult<Json<AuthResponse>> {
    let user = if body.username.contains('@') {
        find_user_by_email(&state.db, &body.username).await?
    } else {
        find_user_by_username(&state.db, &body.username).await?
    }
    .ok_or(AuthError::InvalidCredentials)?;

    let valid =
        verify_password(&body.password, &user.password_hash).map_err(|_| AuthError::PasswordHash)?;
    if !valid {
        tracing::debug!("Password mismatch");
        return Err(AuthError::InvalidCredentials);
    }

    Ok(Json(token_response(&state, &user)?))
}

/// Get current user profile.
///
/// GET /auth/me
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile(auth_user: AuthUser) -> Json<UserProfile> {
    Json(UserProfile {
        id: auth_user.id,
        username: auth_user.username,
        display_name: auth_user.display_name,
        email: auth_user.email,
        is_superuser: auth_user.is_superuser,
        permissions: auth_user.permissions,
    })
}

/// Update the current user's name or email.
///
/// PATCH /auth/me
#[utoipa::path(
    patch,
    path = "/auth/me",
    tag = "auth",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated user", body = UserProfile),
        (status = 400, description = "Invalid or already taken fields", body = ErrorResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth_user, body), fields(user_id = %auth_user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> AuthResult<Json<UserProfile>> {
    body.validate()?;

    if let Some(email) = body.email.as_deref() {
        if email != auth_user.email && email_exists(&state.db, email).await? {
            return Err(taken_error("email"));
        }
    }

    let user = sqlx::query_as::<_, User>(
        r"
        UPDATE users SET
            display_name = COALESCE($2, display_name),
            email = COALESCE($3, email),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(auth_user.id)
    .bind(body.display_name.as_deref().map(str::trim))
    .bind(&body.email)
    .fetch_one(&state.db)
    .await
    .map_err(|e| taken_field(&e).map_or(AuthError::Database(e), taken_error))?;

    tracing::info!("Profile updated");
    Ok(Json(UserProfile {
        id: user.id,
        username: user.username,
        display_name: user.display_name,
        email: user.email,
        is_superuser: user.is_superuser,
        permissions: auth_user.permissions,
    }))
}
