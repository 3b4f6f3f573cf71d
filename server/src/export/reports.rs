//! Saved reports.
//!
//! A report records the query parameters of a named spreadsheet export so
//! the same download can be produced again later.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::AppState;
use crate::auth::AuthUser;
use crate::clubs::ClubError;
use crate::util::slugify;

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Report {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = Object)]
    pub parameters: serde_json::Value,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Filename for a downloaded export.
///
/// A caller-supplied name is slugified; otherwise the file is stamped with
/// the export time.
#[must_use]
pub fn export_filename(name: Option<&str>, now: DateTime<Utc>) -> String {
    match name.map(slugify).filter(|slug| !slug.is_empty()) {
        Some(slug) => format!("{slug}.xlsx"),
        None => format!("report-{}.xlsx", now.format("%Y%m%d-%H%M")),
    }
}

/// Whether an export should be saved as a new report.
///
/// Only named first-time exports by signed-in users are saved; re-downloads
/// of an existing report carry the `existing` flag.
#[must_use]
pub fn should_save_report(authenticated: bool, name: Option<&str>, existing: Option<&str>) -> bool {
    authenticated
        && name.is_some_and(|n| !n.is_empty())
        && existing.is_none_or(str::is_empty)
}

/// Record a report.
pub async fn create_report(
    pool: &PgPool,
    creator_id: Uuid,
    name: &str,
    description: Option<&str>,
    parameters: &serde_json::Value,
) -> sqlx::Result<Report> {
    sqlx::query_as::<_, Report>(
        r"
        INSERT INTO reports (name, description, parameters, creator_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(name)
    .bind(description)
    .bind(parameters)
    .bind(creator_id)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_report", creator_id = %creator_id))
}

/// List the caller's saved reports.
#[utoipa::path(
    get,
    path = "/api/reports",
    tag = "reports",
    responses((status = 200, body = Vec<Report>)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state))]
pub async fn list_reports(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Report>>, ClubError> {
    let reports = sqlx::query_as::<_, Report>(
        "SELECT * FROM reports WHERE creator_id = $1 ORDER BY created_at DESC",
    )
    .bind(auth.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(reports))
}

/// Delete one of the caller's saved reports.
#[utoipa::path(
    delete,
    path = "/api/reports/{id}",
    tag = "reports",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses((status = 204), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state))]
pub async fn delete_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ClubError> {
    let result = sqlx::query("DELETE FROM reports WHERE id = $1 AND creator_id = $2")
        .bind(id)
        .bind(auth.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ClubError::NotFound("Report"));
    }
    Ok(StatusCode::NO_CONTENT)
}
