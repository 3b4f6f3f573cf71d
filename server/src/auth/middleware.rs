//! Authentication Middleware

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::api::AppState;
use crate::db::{find_user_by_id, User};
use crate::permissions::{get_system_permissions, Principal, SystemPermission};

use super::error::AuthError;
use super::jwt::validate_access_token;

/// Authenticated user injected into request extensions.
///
/// This is a minimal struct containing only safe-to-expose user data.
/// Use this in handlers to access the current user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// User ID.
    pub id: Uuid,
    /// Username.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Email.
    pub email: String,
    /// Superusers bypass every club-level check.
    pub is_superuser: bool,
    /// Organization-wide capabilities.
    pub permissions: Vec<SystemPermission>,
}

impl AuthUser {
    fn from_user(user: User, permissions: Vec<SystemPermission>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            email: user.email,
            is_superuser: user.is_superuser,
            permissions,
        }
    }

    /// The identity used for authorization checks.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: Some(self.id),
            is_superuser: self.is_superuser,
            permissions: self.permissions.clone(),
        }
    }
}

/// Middleware that identifies the bearer, if any.
///
/// Requests without an Authorization header pass through anonymously. A
/// header that is present but malformed, expired or points at a deleted
/// user is rejected with 401. On success an `AuthUser` is inserted into the
/// request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(auth_header) = request.headers().get(AUTHORIZATION).cloned() else {
        return Ok(next.run(request).await);
    };

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AuthError::InvalidAuthHeader)?;

    let claims = validate_access_token(token, &state.config.jwt_secret)?;

    let user_id: Uuid = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

    let user = find_user_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    let permissions = get_system_permissions(&state.db, user.id).await?;

    request
        .extensions_mut()
        .insert(AuthUser::from_user(user, permissions));

    Ok(next.run(request).await)
}

/// Extractor for authenticated user in handlers.
///
/// Rejects with 401 when the request is anonymous:
///
/// ```ignore
/// async fn protected_handler(auth_user: AuthUser) -> impl IntoResponse {
///     format!("Hello, {}!", auth_user.username)
/// }
/// ```
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// The caller of a route that is open to anonymous visitors.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<AuthUser>);

impl Viewer {
    #[must_use]
    pub fn principal(&self) -> Principal {
        self.0
            .as_ref()
            .map_or_else(Principal::anonymous, AuthUser::principal)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<AuthUser>().cloned()))
    }
}
