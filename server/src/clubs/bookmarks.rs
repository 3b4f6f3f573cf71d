//! Favorites and Subscriptions
//!
//! Users bookmark clubs in two independent lists. Favorites drive the club
//! list ordering; subscribers are visible to the club's officers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use super::access::ClubAccess;
use super::error::ClubError;
use super::members::RosterQuery;
use crate::api::AppState;
use crate::auth::{AuthUser, Viewer};
use crate::export::{export_filename, to_records, xlsx_download, ExportSchema, FieldKind};
use crate::permissions::{Action, Resource};

/// Spreadsheet layout of a subscriber list.
pub const SUBSCRIBER_EXPORT_SCHEMA: ExportSchema = ExportSchema::new(&[
    ("username", FieldKind::Passthrough),
    ("name", FieldKind::Passthrough),
    ("email", FieldKind::Passthrough),
    ("created_at", FieldKind::Passthrough),
]);

/// Which bookmark list is being touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkKind {
    Favorite,
    Subscription,
}

impl BookmarkKind {
    const fn table(self) -> &'static str {
        match self {
            Self::Favorite => "favorites",
            Self::Subscription => "subscriptions",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Favorite => "Favorite",
            Self::Subscription => "Subscription",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Bookmark {
    pub club_code: String,
    pub club_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookmarkRequest {
    /// Code of the club to bookmark.
    pub club: String,
}

/// A subscriber as shown to club officers.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Subscriber {
    pub username: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// The viewer's bookmarks on one club, plus its favorite count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct BookmarkState {
    pub favorite_count: i64,
    pub is_favorite: bool,
    pub is_subscribe: bool,
}

/// Load the bookmark state of a club for `user_id`.
pub async fn bookmark_state(
    pool: &PgPool,
    club_id: Uuid,
    user_id: Option<Uuid>,
) -> sqlx::Result<BookmarkState> {
    sqlx::query_as::<_, BookmarkState>(
        r"
        SELECT
            (SELECT COUNT(*) FROM favorites WHERE club_id = $1) AS favorite_count,
            EXISTS (SELECT 1 FROM favorites WHERE club_id = $1 AND user_id = $2::uuid) AS is_favorite,
            EXISTS (SELECT 1 FROM subscriptions WHERE club_id = $1 AND user_id = $2::uuid) AS is_subscribe
        ",
    )
    .bind(club_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

async fn list_bookmarks(
    pool: &PgPool,
    kind: BookmarkKind,
    user_id: Uuid,
) -> Result<Vec<Bookmark>, ClubError> {
    let bookmarks = sqlx::query_as::<_, Bookmark>(&format!(
        r"
        SELECT c.code AS club_code, c.name AS club_name, b.created_at
        FROM {} b
        INNER JOIN clubs c ON c.id = b.club_id
        WHERE b.user_id = $1
        ORDER BY c.name ASC
        ",
        kind.table()
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_bookmarks", user_id = %user_id, kind = kind.table()))?;

    Ok(bookmarks)
}

async fn add_bookmark(
    state: &AppState,
    kind: BookmarkKind,
    auth: AuthUser,
    code: &str,
) -> Result<(StatusCode, Json<Bookmark>), ClubError> {
    let user_id = auth.id;
    let access = ClubAccess::load(&state.db, code, &Viewer(Some(auth))).await?;
    access.authorize(Resource::Subscription, Action::Create)?;

    let (created_at,): (DateTime<Utc>,) = sqlx::query_as(&format!(
        r"
        INSERT INTO {} (user_id, club_id) VALUES ($1, $2)
        ON CONFLICT (user_id, club_id) DO UPDATE SET created_at = {0}.created_at
        RETURNING created_at
        ",
        kind.table()
    ))
    .bind(user_id)
    .bind(access.club.id)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(club_id = %access.club.id, kind = kind.table(), "Club bookmarked");
    Ok((
        StatusCode::CREATED,
        Json(Bookmark {
            club_code: access.club.code,
            club_name: access.club.name,
            created_at,
        }),
    ))
}

async fn remove_bookmark(
    pool: &PgPool,
    kind: BookmarkKind,
    user_id: Uuid,
    code: &str,
) -> Result<StatusCode, ClubError> {
    let result = sqlx::query(&format!(
        r"
        DELETE FROM {} b
        USING clubs c
        WHERE c.id = b.club_id AND c.code = $1 AND b.user_id = $2
        ",
        kind.table()
    ))
    .bind(code)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ClubError::NotFound(kind.label()));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Favorites
// ============================================================================

/// List the clubs the caller has favorited.
#[utoipa::path(
    get,
    path = "/api/favorites",
    tag = "bookmarks",
    responses((status = 200, body = Vec<Bookmark>), (status = 401)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn list_favorites(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Bookmark>>, ClubError> {
    Ok(Json(list_bookmarks(&state.db, BookmarkKind::Favorite, auth.id).await?))
}

/// Favorite a club. Favoriting twice is harmless.
#[utoipa::path(
    post,
    path = "/api/favorites",
    tag = "bookmarks",
    request_body = BookmarkRequest,
    responses((status = 201, body = Bookmark), (status = 401), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth, body), fields(user_id = %auth.id))]
pub async fn add_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<BookmarkRequest>,
) -> Result<(StatusCode, Json<Bookmark>), ClubError> {
    add_bookmark(&state, BookmarkKind::Favorite, auth, &body.club).await
}

/// Unfavorite a club.
#[utoipa::path(
    delete,
    path = "/api/favorites/{club_code}",
    tag = "bookmarks",
    params(("club_code" = String, Path, description = "Club code")),
    responses((status = 204), (status = 401), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(club_code): Path<String>,
) -> Result<StatusCode, ClubError> {
    remove_bookmark(&state.db, BookmarkKind::Favorite, auth.id, &club_code).await
}

// ============================================================================
// Subscriptions
// ============================================================================

/// List the clubs the caller is subscribed to.
#[utoipa::path(
    get,
    path = "/api/subscriptions",
    tag = "bookmarks",
    responses((status = 200, body = Vec<Bookmark>), (status = 401)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Bookmark>>, ClubError> {
    Ok(Json(list_bookmarks(&state.db, BookmarkKind::Subscription, auth.id).await?))
}

/// Subscribe to a club. The club's officers can see its subscribers.
#[utoipa::path(
    post,
    path = "/api/subscriptions",
    tag = "bookmarks",
    request_body = BookmarkRequest,
    responses((status = 201, body = Bookmark), (status = 401), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth, body), fields(user_id = %auth.id))]
pub async fn subscribe(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<BookmarkRequest>,
) -> Result<(StatusCode, Json<Bookmark>), ClubError> {
    add_bookmark(&state, BookmarkKind::Subscription, auth, &body.club).await
}

/// Unsubscribe from a club.
#[utoipa::path(
    delete,
    path = "/api/subscriptions/{club_code}",
    tag = "bookmarks",
    params(("club_code" = String, Path, description = "Club code")),
    responses((status = 204), (status = 401), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(club_code): Path<String>,
) -> Result<StatusCode, ClubError> {
    remove_bookmark(&state.db, BookmarkKind::Subscription, auth.id, &club_code).await
}

/// List a club's subscribers with their contact details.
///
/// With `format=xlsx` the list is downloaded as a spreadsheet.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/subscription",
    tag = "bookmarks",
    params(("code" = String, Path, description = "Club code"), RosterQuery),
    responses((status = 200, body = Vec<Subscriber>), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn club_subscribers(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
    Query(query): Query<RosterQuery>,
) -> Result<Response, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Subscription, Action::Read)?;

    let subscribers = sqlx::query_as::<_, Subscriber>(
        r"
        SELECT u.username, u.display_name AS name, u.email, s.created_at
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.user_id
        WHERE s.club_id = $1
        ORDER BY s.created_at ASC
        ",
    )
    .bind(access.club.id)
    .fetch_all(&state.db)
    .await?;

    if query.format.as_deref() == Some("xlsx") {
        let filename = export_filename(query.name.as_deref(), Utc::now());
        return xlsx_download(&SUBSCRIBER_EXPORT_SCHEMA, &to_records(&subscribers)?, &filename);
    }
    Ok(Json(subscribers).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmark_tables() {
        assert_eq!(BookmarkKind::Favorite.table(), "favorites");
        assert_eq!(BookmarkKind::Subscription.table(), "subscriptions");
        assert_eq!(BookmarkKind::Subscription.label(), "Subscription");
    }

    #[test]
    fn test_subscriber_export_headers() {
        let records = to_records(&[Subscriber {
            username: "ada".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            created_at: Utc::now(),
        }])
        .unwrap();
        let table = crate::export::Formatter::new(&SUBSCRIBER_EXPORT_SCHEMA).format_records(&records);
        assert_eq!(table.headers[..3], ["Username", "Name", "Email"]);
        assert_eq!(table.rows[0][2], crate::export::Cell::Text("ada@example.com".into()));
    }
}
