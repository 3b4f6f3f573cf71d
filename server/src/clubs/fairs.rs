//! Activities Fair Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::access::ClubAccess;
use super::error::ClubError;
use crate::api::AppState;
use crate::auth::Viewer;
use crate::permissions::{Action, Resource};

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Fair {
    pub id: Uuid,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Codes of registered clubs.
    pub clubs: Vec<String>,
}

/// List fairs with the clubs registered for each.
#[utoipa::path(
    get,
    path = "/api/fairs",
    tag = "fairs",
    responses((status = 200, body = Vec<Fair>))
)]
#[tracing::instrument(skip(state))]
pub async fn list_fairs(State(state): State<AppState>) -> Result<Json<Vec<Fair>>, ClubError> {
    let fairs = sqlx::query_as::<_, Fair>(
        r"
        SELECT f.id, f.name, f.start_time, f.end_time,
               COALESCE(
                   ARRAY_AGG(c.code::text ORDER BY c.code) FILTER (WHERE c.code IS NOT NULL),
                   '{}'::text[]
               ) AS clubs
        FROM fairs f
        LEFT JOIN club_fair_registrations r ON r.fair_id = f.id
        LEFT JOIN clubs c ON c.id = r.club_id
        GROUP BY f.id
        ORDER BY f.start_time DESC
        ",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(fairs))
}

async fn fair_exists(state: &AppState, fair_id: Uuid) -> Result<(), ClubError> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM fairs WHERE id = $1")
        .bind(fair_id)
        .fetch_optional(&state.db)
        .await?;
    found.map(|_| ()).ok_or(ClubError::NotFound("Fair"))
}

/// Register a club for a fair.
#[utoipa::path(
    post,
    path = "/api/fairs/{id}/clubs/{code}",
    tag = "fairs",
    params(
        ("id" = Uuid, Path, description = "Fair ID"),
        ("code" = String, Path, description = "Club code")
    ),
    responses((status = 204), (status = 403, description = "Not an officer"), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn register_for_fair(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((fair_id, code)): Path<(Uuid, String)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Club, Action::Update)?;
    fair_exists(&state, fair_id).await?;

    sqlx::query(
        r"
        INSERT INTO club_fair_registrations (fair_id, club_id, registrant_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (fair_id, club_id) DO NOTHING
        ",
    )
    .bind(fair_id)
    .bind(access.club.id)
    .bind(access.principal.user_id)
    .execute(&state.db)
    .await?;

    tracing::info!(%fair_id, club_id = %access.club.id, "Club registered for fair");
    Ok(StatusCode::NO_CONTENT)
}

/// Withdraw a club from a fair.
#[utoipa::path(
    delete,
    path = "/api/fairs/{id}/clubs/{code}",
    tag = "fairs",
    params(
        ("id" = Uuid, Path, description = "Fair ID"),
        ("code" = String, Path, description = "Club code")
    ),
    responses((status = 204), (status = 403, description = "Not an officer"), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn unregister_from_fair(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((fair_id, code)): Path<(Uuid, String)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Club, Action::Update)?;

    let result =
        sqlx::query("DELETE FROM club_fair_registrations WHERE fair_id = $1 AND club_id = $2")
            .bind(fair_id)
            .bind(access.club.id)
            .execute(&state.db)
            .await?;

    if result.rows_affected() == 0 {
        return Err(ClubError::NotFound("Registration"));
    }
    Ok(StatusCode::NO_CONTENT)
}
