//! Tag Handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::ClubError;
use crate::api::AppState;

/// A tag with the number of clubs carrying it.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct TagCount {
    pub id: Uuid,
    pub name: String,
    pub clubs: i64,
}

const TAG_SELECT: &str = r"
    SELECT t.id, t.name, COUNT(ct.club_id) AS clubs
    FROM tags t
    LEFT JOIN club_tags ct ON ct.tag_id = t.id
";

async fn fetch_tags(pool: &PgPool, name: Option<&str>) -> sqlx::Result<Vec<TagCount>> {
    sqlx::query_as::<_, TagCount>(&format!(
        "{TAG_SELECT} WHERE ($1::text IS NULL OR t.name = $1) GROUP BY t.id, t.name ORDER BY t.name ASC"
    ))
    .bind(name)
    .fetch_all(pool)
    .await
}

/// List every tag, alphabetically.
#[utoipa::path(
    get,
    path = "/api/tags",
    tag = "tags",
    responses((status = 200, body = Vec<TagCount>))
)]
#[tracing::instrument(skip(state))]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagCount>>, ClubError> {
    Ok(Json(fetch_tags(&state.db, None).await?))
}

/// Get one tag by name.
#[utoipa::path(
    get,
    path = "/api/tags/{name}",
    tag = "tags",
    params(("name" = String, Path, description = "Tag name")),
    responses((status = 200, body = TagCount), (status = 404))
)]
#[tracing::instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TagCount>, ClubError> {
    fetch_tags(&state.db, Some(&name))
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or(ClubError::NotFound("Tag"))
}
