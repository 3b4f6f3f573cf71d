//! Club Testimonial Handlers
//!
//! Quotes from members shown on the club page. Officers curate them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::access::ClubAccess;
use super::error::ClubError;
use crate::api::AppState;
use crate::auth::Viewer;
use crate::permissions::{Action, Resource};

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Testimonial {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TestimonialRequest {
    #[validate(length(min = 1, max = 5000, message = "Text must be 1-5000 characters"))]
    pub text: String,
}

/// List a club's testimonials, newest first.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/testimonials",
    tag = "testimonials",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = Vec<Testimonial>), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn list_testimonials(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<Vec<Testimonial>>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Testimonial, Action::Read)?;

    let testimonials = sqlx::query_as::<_, Testimonial>(
        r"
        SELECT id, text, created_at, updated_at
        FROM testimonials
        WHERE club_id = $1
        ORDER BY created_at DESC
        ",
    )
    .bind(access.club.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(testimonials))
}

/// Add a testimonial.
#[utoipa::path(
    post,
    path = "/api/clubs/{code}/testimonials",
    tag = "testimonials",
    params(("code" = String, Path, description = "Club code")),
    request_body = TestimonialRequest,
    responses(
        (status = 201, body = Testimonial),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not an officer")
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn create_testimonial(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
    Json(body): Json<TestimonialRequest>,
) -> Result<(StatusCode, Json<Testimonial>), ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Testimonial, Action::Create)?;
    body.validate()?;

    let testimonial = sqlx::query_as::<_, Testimonial>(
        r"
        INSERT INTO testimonials (club_id, text)
        VALUES ($1, $2)
        RETURNING id, text, created_at, updated_at
        ",
    )
    .bind(access.club.id)
    .bind(body.text.trim())
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(testimonial)))
}

/// Replace a testimonial's text.
#[utoipa::path(
    put,
    path = "/api/clubs/{code}/testimonials/{id}",
    tag = "testimonials",
    params(
        ("code" = String, Path, description = "Club code"),
        ("id" = Uuid, Path, description = "Testimonial ID")
    ),
    request_body = TestimonialRequest,
    responses((status = 200, body = Testimonial), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn update_testimonial(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, id)): Path<(String, Uuid)>,
    Json(body): Json<TestimonialRequest>,
) -> Result<Json<Testimonial>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Testimonial, Action::Update)?;
    body.validate()?;

    sqlx::query_as::<_, Testimonial>(
        r"
        UPDATE testimonials SET text = $3, updated_at = NOW()
        WHERE id = $1 AND club_id = $2
        RETURNING id, text, created_at, updated_at
        ",
    )
    .bind(id)
    .bind(access.club.id)
    .bind(body.text.trim())
    .fetch_optional(&state.db)
    .await?
    .map(Json)
    .ok_or(ClubError::NotFound("Testimonial"))
}

/// Delete a testimonial.
#[utoipa::path(
    delete,
    path = "/api/clubs/{code}/testimonials/{id}",
    tag = "testimonials",
    params(
        ("code" = String, Path, description = "Club code"),
        ("id" = Uuid, Path, description = "Testimonial ID")
    ),
    responses((status = 204), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn delete_testimonial(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Testimonial, Action::Delete)?;

    let result = sqlx::query("DELETE FROM testimonials WHERE id = $1 AND club_id = $2")
        .bind(id)
        .bind(access.club.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ClubError::NotFound("Testimonial"));
    }
    Ok(StatusCode::NO_CONTENT)
}
