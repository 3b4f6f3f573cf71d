//! Membership Request Handlers
//!
//! Users apply to join a club; officers accept or dismiss applications.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::access::ClubAccess;
use super::error::ClubError;
use crate::api::AppState;
use crate::auth::{AuthUser, Viewer};
use crate::db::find_user_by_username;
use crate::permissions::{Action, ClubRole, Resource};

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct MembershipRequest {
    pub club_code: String,
    pub club_name: String,
    pub username: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRequestBody {
    /// Code of the club to join.
    pub club: String,
}

const REQUEST_SELECT: &str = r"
    SELECT c.code AS club_code, c.name AS club_name, u.username, u.display_name AS name, r.created_at
    FROM membership_requests r
    INNER JOIN clubs c ON c.id = r.club_id
    INNER JOIN users u ON u.id = r.user_id
";

// ============================================================================
// Club side
// ============================================================================

/// List pending requests to join a club.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/requests",
    tag = "requests",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = Vec<MembershipRequest>), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn list_club_requests(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<Vec<MembershipRequest>>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Request, Action::Read)?;

    let requests = sqlx::query_as::<_, MembershipRequest>(&format!(
        "{REQUEST_SELECT} WHERE r.club_id = $1 ORDER BY r.created_at ASC"
    ))
    .bind(access.club.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(requests))
}

/// Accept a request: the applicant becomes a member and the request is removed.
#[utoipa::path(
    post,
    path = "/api/clubs/{code}/requests/{username}/accept",
    tag = "requests",
    params(
        ("code" = String, Path, description = "Club code"),
        ("username" = String, Path, description = "Applicant username")
    ),
    responses((status = 204), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn accept_club_request(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, username)): Path<(String, String)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Request, Action::Update)?;

    let user = find_user_by_username(&state.db, &username)
        .await?
        .ok_or(ClubError::NotFound("Request"))?;

    let mut tx = state.db.begin().await?;

    let removed = sqlx::query("DELETE FROM membership_requests WHERE club_id = $1 AND user_id = $2")
        .bind(access.club.id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    if removed.rows_affected() == 0 {
        return Err(ClubError::NotFound("Request"));
    }

    sqlx::query(
        r"
        INSERT INTO memberships (club_id, user_id, role, title)
        VALUES ($1, $2, $3, 'Member')
        ON CONFLICT (club_id, user_id) DO NOTHING
        ",
    )
    .bind(access.club.id)
    .bind(user.id)
    .bind(ClubRole::Member)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(club_id = %access.club.id, user_id = %user.id, "Membership request accepted");
    Ok(StatusCode::NO_CONTENT)
}

/// Dismiss a request. Applicants may withdraw their own.
#[utoipa::path(
    delete,
    path = "/api/clubs/{code}/requests/{username}",
    tag = "requests",
    params(
        ("code" = String, Path, description = "Club code"),
        ("username" = String, Path, description = "Applicant username")
    ),
    responses((status = 204), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn delete_club_request(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, username)): Path<(String, String)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    let user = find_user_by_username(&state.db, &username)
        .await?
        .ok_or(ClubError::NotFound("Request"))?;
    access.authorize_target(Resource::Request, Action::Delete, user.id)?;

    let result = sqlx::query("DELETE FROM membership_requests WHERE club_id = $1 AND user_id = $2")
        .bind(access.club.id)
        .bind(user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ClubError::NotFound("Request"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// User side
// ============================================================================

/// List the caller's pending requests.
#[utoipa::path(
    get,
    path = "/api/requests",
    tag = "requests",
    responses((status = 200, body = Vec<MembershipRequest>)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn list_my_requests(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<MembershipRequest>>, ClubError> {
    let requests = sqlx::query_as::<_, MembershipRequest>(&format!(
        "{REQUEST_SELECT} WHERE r.user_id = $1 ORDER BY r.created_at DESC"
    ))
    .bind(auth.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(requests))
}

/// Ask to join a club.
#[utoipa::path(
    post,
    path = "/api/requests",
    tag = "requests",
    request_body = CreateRequestBody,
    responses(
        (status = 201, body = MembershipRequest),
        (status = 400, description = "Already a member"),
        (status = 404)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth, body), fields(user_id = %auth.id))]
pub async fn create_my_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<MembershipRequest>), ClubError> {
    let viewer = Viewer(Some(auth.clone()));
    let access = ClubAccess::load(&state.db, &body.club, &viewer).await?;
    access.authorize(Resource::Request, Action::Create)?;

    if access.role.is_some() {
        return Err(ClubError::field("club", "You are already a member of this club."));
    }

    sqlx::query(
        r"
        INSERT INTO membership_requests (club_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (club_id, user_id) DO NOTHING
        ",
    )
    .bind(access.club.id)
    .bind(auth.id)
    .execute(&state.db)
    .await?;

    let request = sqlx::query_as::<_, MembershipRequest>(&format!(
        "{REQUEST_SELECT} WHERE r.club_id = $1 AND r.user_id = $2"
    ))
    .bind(access.club.id)
    .bind(auth.id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(club_id = %access.club.id, "Membership requested");
    Ok((StatusCode::CREATED, Json(request)))
}

/// Withdraw the caller's request to join a club.
#[utoipa::path(
    delete,
    path = "/api/requests/{club_code}",
    tag = "requests",
    params(("club_code" = String, Path, description = "Club code")),
    responses((status = 204), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn delete_my_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(club_code): Path<String>,
) -> Result<StatusCode, ClubError> {
    let result = sqlx::query(
        r"
        DELETE FROM membership_requests r
        USING clubs c
        WHERE c.id = r.club_id AND c.code = $1 AND r.user_id = $2
        ",
    )
    .bind(&club_code)
    .bind(auth.id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ClubError::NotFound("Request"));
    }
    Ok(StatusCode::NO_CONTENT)
}
