//! Note Handlers

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

use super::visibility::{NoteAudience, ViewerRoles};
use crate::api::AppState;
use crate::auth::Viewer;
use crate::clubs::access::ClubAccess;
use crate::clubs::ClubError;
use crate::db::find_club_by_code;
use crate::permissions::{get_club_roles, Action, Principal, Resource, Visibility};

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Note {
    pub id: Uuid,
    /// Username of the author, if the account still exists.
    pub creator: Option<String>,
    #[serde(skip)]
    pub creating_club_id: Uuid,
    #[serde(skip)]
    pub subject_club_id: Uuid,
    pub creating_club: String,
    pub subject_club: String,
    pub title: String,
    pub content: String,
    #[schema(value_type = i16)]
    pub creating_club_permission: Visibility,
    #[schema(value_type = i16)]
    pub outside_club_permission: Visibility,
    pub created_at: DateTime<Utc>,
}

impl Note {
    const fn audience(&self) -> NoteAudience {
        NoteAudience {
            creating_club_id: self.creating_club_id,
            subject_club_id: self.subject_club_id,
            creating_club_permission: self.creating_club_permission,
            outside_club_permission: self.outside_club_permission,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNoteRequest {
    /// Code of the club the note is about.
    pub subject_club: String,
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Level required in the writing club. Defaults to Member.
    #[schema(value_type = Option<i16>)]
    pub creating_club_permission: Option<Visibility>,
    /// Level required in the subject club. Defaults to Public.
    #[schema(value_type = Option<i16>)]
    pub outside_club_permission: Option<Visibility>,
}

const NOTE_SELECT: &str = r"
    SELECT n.id, u.username AS creator, n.creating_club_id, n.subject_club_id,
           cc.code AS creating_club, sc.code AS subject_club,
           n.title, n.content, n.creating_club_permission, n.outside_club_permission, n.created_at
    FROM notes n
    INNER JOIN clubs cc ON cc.id = n.creating_club_id
    INNER JOIN clubs sc ON sc.id = n.subject_club_id
    LEFT JOIN users u ON u.id = n.creator_id
";

/// Drop the notes `principal` may not see.
async fn visible_notes(
    state: &AppState,
    principal: &Principal,
    notes: Vec<Note>,
) -> Result<Vec<Note>, ClubError> {
    let roles = match principal.user_id {
        Some(user_id) if !principal.is_superuser => {
            let mut club_ids: Vec<Uuid> = notes
                .iter()
                .flat_map(|n| [n.creating_club_id, n.subject_club_id])
                .collect();
            club_ids.sort_unstable();
            club_ids.dedup();
            get_club_roles(&state.db, &club_ids, user_id).await?
        }
        _ => Vec::new(),
    };

    let viewer = ViewerRoles::new(principal, roles);
    Ok(notes
        .into_iter()
        .filter(|note| viewer.can_see(&note.audience()))
        .collect())
}

/// Notes written by a club.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/notes",
    tag = "notes",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = Vec<Note>), (status = 403, description = "Not a member")),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn list_notes(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<Vec<Note>>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Note, Action::Read)?;

    let notes = sqlx::query_as::<_, Note>(&format!(
        "{NOTE_SELECT} WHERE n.creating_club_id = $1 ORDER BY n.created_at DESC"
    ))
    .bind(access.club.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(visible_notes(&state, &access.principal, notes).await?))
}

/// Notes other clubs have written about this club that the caller may see.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/notes-about",
    tag = "notes",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = Vec<Note>), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn notes_about(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<Vec<Note>>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;

    let notes = sqlx::query_as::<_, Note>(&format!(
        "{NOTE_SELECT} WHERE n.subject_club_id = $1 ORDER BY n.created_at DESC"
    ))
    .bind(access.club.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(visible_notes(&state, &access.principal, notes).await?))
}

/// Write a note about another club.
#[utoipa::path(
    post,
    path = "/api/clubs/{code}/notes",
    tag = "notes",
    params(("code" = String, Path, description = "Club code")),
    request_body = CreateNoteRequest,
    responses(
        (status = 201, body = Note),
        (status = 400, description = "Unknown subject club"),
        (status = 403, description = "Not an officer")
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn create_note(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
    Json(body): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Note, Action::Create)?;
    body.validate()?;

    let subject = find_club_by_code(&state.db, &body.subject_club)
        .await?
        .ok_or_else(|| {
            ClubError::field(
                "subject_club",
                format!("Club with code \"{}\" does not exist.", body.subject_club),
            )
        })?;

    let (id,): (Uuid,) = sqlx::query_as(
        r"
        INSERT INTO notes (creator_id, creating_club_id, subject_club_id, title, content,
                           creating_club_permission, outside_club_permission)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        ",
    )
    .bind(access.principal.user_id)
    .bind(access.club.id)
    .bind(subject.id)
    .bind(body.title.trim())
    .bind(&body.content)
    .bind(body.creating_club_permission.unwrap_or(Visibility::Member))
    .bind(body.outside_club_permission.unwrap_or(Visibility::Public))
    .fetch_one(&state.db)
    .await?;

    let note = sqlx::query_as::<_, Note>(&format!("{NOTE_SELECT} WHERE n.id = $1"))
        .bind(id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(note_id = %id, club_id = %access.club.id, subject_id = %subject.id, "Note created");
    Ok((StatusCode::CREATED, Json(note)))
}

/// Delete a note written by this club.
#[utoipa::path(
    delete,
    path = "/api/clubs/{code}/notes/{id}",
    tag = "notes",
    params(
        ("code" = String, Path, description = "Club code"),
        ("id" = Uuid, Path, description = "Note ID")
    ),
    responses((status = 204), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn delete_note(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Note, Action::Delete)?;

    let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND creating_club_id = $2")
        .bind(id)
        .bind(access.club.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ClubError::NotFound("Note"));
    }
    Ok(StatusCode::NO_CONTENT)
}
