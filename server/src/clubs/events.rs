//! Club Event Handlers

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
use crate::util::slugify;

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Event {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: String,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(max = 255, message = "Location must be at most 255 characters"))]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 255, message = "Location must be at most 255 characters"))]
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

fn check_times(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ClubError> {
    if end < start {
        return Err(ClubError::field("end_time", "Event cannot end before it starts."));
    }
    Ok(())
}

async fn load_event(state: &AppState, club_id: Uuid, code: &str) -> Result<Event, ClubError> {
    sqlx::query_as::<_, Event>(
        r"
        SELECT id, code, name, description, location, start_time, end_time, created_at
        FROM events
        WHERE club_id = $1 AND code = $2
        ",
    )
    .bind(club_id)
    .bind(code)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ClubError::NotFound("Event"))
}

/// List a club's events, soonest first.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/events",
    tag = "events",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = Vec<Event>), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn list_events(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<Vec<Event>>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Event, Action::Read)?;

    let events = sqlx::query_as::<_, Event>(
        r"
        SELECT id, code, name, description, location, start_time, end_time, created_at
        FROM events
        WHERE club_id = $1
        ORDER BY start_time ASC
        ",
    )
    .bind(access.club.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(events))
}

/// Create an event. Its code is derived from the name.
#[utoipa::path(
    post,
    path = "/api/clubs/{code}/events",
    tag = "events",
    params(("code" = String, Path, description = "Club code")),
    request_body = CreateEventRequest,
    responses(
        (status = 201, body = Event),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not an officer")
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn create_event(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
    Json(body): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Event, Action::Create)?;
    body.validate()?;
    check_times(body.start_time, body.end_time)?;

    let event_code = slugify(&body.name);
    if event_code.is_empty() {
        return Err(ClubError::field("name", "Could not derive a code from the name."));
    }

    let event = sqlx::query_as::<_, Event>(
        r"
        INSERT INTO events (club_id, code, name, description, location, start_time, end_time, creator_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (club_id, code) DO NOTHING
        RETURNING id, code, name, description, location, start_time, end_time, created_at
        ",
    )
    .bind(access.club.id)
    .bind(&event_code)
    .bind(body.name.trim())
    .bind(body.description.as_deref().unwrap_or_default())
    .bind(&body.location)
    .bind(body.start_time)
    .bind(body.end_time)
    .bind(access.principal.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ClubError::field("name", "This club already has an event with this name."))?;

    tracing::info!(club_id = %access.club.id, event_id = %event.id, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

/// Get one event.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/events/{event_code}",
    tag = "events",
    params(
        ("code" = String, Path, description = "Club code"),
        ("event_code" = String, Path, description = "Event code")
    ),
    responses((status = 200, body = Event), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn get_event(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, event_code)): Path<(String, String)>,
) -> Result<Json<Event>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Event, Action::Read)?;
    Ok(Json(load_event(&state, access.club.id, &event_code).await?))
}

/// Update an event. The code does not change.
#[utoipa::path(
    patch,
    path = "/api/clubs/{code}/events/{event_code}",
    tag = "events",
    params(
        ("code" = String, Path, description = "Club code"),
        ("event_code" = String, Path, description = "Event code")
    ),
    request_body = UpdateEventRequest,
    responses((status = 200, body = Event), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn update_event(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, event_code)): Path<(String, String)>,
    Json(body): Json<UpdateEventRequest>,
) -> Result<Json<Event>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Event, Action::Update)?;
    body.validate()?;

    let current = load_event(&state, access.club.id, &event_code).await?;
    check_times(
        body.start_time.unwrap_or(current.start_time),
        body.end_time.unwrap_or(current.end_time),
    )?;

    let event = sqlx::query_as::<_, Event>(
        r"
        UPDATE events SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            location = COALESCE($4, location),
            start_time = COALESCE($5, start_time),
            end_time = COALESCE($6, end_time)
        WHERE id = $1
        RETURNING id, code, name, description, location, start_time, end_time, created_at
        ",
    )
    .bind(current.id)
    .bind(body.name.as_deref().map(str::trim))
    .bind(&body.description)
    .bind(&body.location)
    .bind(body.start_time)
    .bind(body.end_time)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(event))
}

/// Delete an event.
#[utoipa::path(
    delete,
    path = "/api/clubs/{code}/events/{event_code}",
    tag = "events",
    params(
        ("code" = String, Path, description = "Club code"),
        ("event_code" = String, Path, description = "Event code")
    ),
    responses((status = 204), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn delete_event(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, event_code)): Path<(String, String)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Event, Action::Delete)?;

    let result = sqlx::query("DELETE FROM events WHERE club_id = $1 AND code = $2")
        .bind(access.club.id)
        .bind(&event_code)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ClubError::NotFound("Event"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_event_cannot_end_before_start() {
        let start = Utc::now();
        assert!(check_times(start, start).is_ok());
        assert!(check_times(start, start + Duration::hours(2)).is_ok());

        let err = check_times(start, start - Duration::minutes(1)).unwrap_err();
        match err {
            ClubError::Validation(fields) => assert!(fields.get("end_time").is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_create_request_requires_times() {
        let parsed: Result<CreateEventRequest, _> = serde_json::from_str(r#"{"name": "GBM"}"#);
        assert!(parsed.is_err());
    }
}
