//! Club Handlers
//!
//! Club CRUD, search, spreadsheet export and relationship trees.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use validator::Validate;

use super::access::ClubAccess;
use super::bookmarks::bookmark_state;
use super::error::ClubError;
use super::queries::{self, ClubFilter};
use super::tree::{load_graph, parent_codes, Direction};
use super::types::{
    ClubListItem, ClubListQuery, ClubPage, ClubResponse, ClubTree, CreateClubRequest, Tag,
    UpdateClubRequest, APPLICATION_CHOICES, SIZE_CHOICES,
};
use crate::api::AppState;
use crate::auth::{AuthUser, Viewer};
use crate::db::{club_code_exists, Club};
use crate::export::{
    export_filename, reports::create_report, should_save_report, to_records, xlsx_download,
    ExportSchema, FieldKind,
};
use crate::permissions::{
    authorize, AccessContext, Action, ClubRole, PermissionError, Resource, SystemPermission,
};
use crate::util::{slugify, title_case};

/// Spreadsheet layout of a club.
pub const CLUB_EXPORT_SCHEMA: ExportSchema = ExportSchema::new(&[
    ("code", FieldKind::Passthrough),
    ("name", FieldKind::Passthrough),
    ("subtitle", FieldKind::Passthrough),
    ("description", FieldKind::Passthrough),
    ("email", FieldKind::Passthrough),
    ("approved", FieldKind::Boolean),
    ("active", FieldKind::Boolean),
    ("accepting_members", FieldKind::Boolean),
    ("size", FieldKind::Choice(SIZE_CHOICES)),
    ("application_required", FieldKind::Choice(APPLICATION_CHOICES)),
    ("tags", FieldKind::ManyToMany),
    ("parent_orgs", FieldKind::ManyToMany),
]);

const MAX_PAGE_SIZE: i64 = 1000;

const CODE_TAKEN: &str = "Club with this code already exists.";

#[derive(Debug, Serialize)]
struct RelatedClub {
    name: String,
    code: String,
}

/// Club row as written to a spreadsheet.
#[derive(Debug, Serialize)]
struct ClubExportRow {
    code: String,
    name: String,
    subtitle: String,
    description: String,
    email: Option<String>,
    approved: Option<bool>,
    active: bool,
    accepting_members: bool,
    size: i16,
    application_required: i16,
    tags: Vec<Tag>,
    parent_orgs: Vec<RelatedClub>,
}

/// Resolve `(page, page_size)` from the query.
fn page_window(
    page: i64,
    page_size: Option<i64>,
    default_size: i64,
) -> Result<(i64, i64), ClubError> {
    if page < 1 {
        return Err(ClubError::NotFound("Page"));
    }
    let size = page_size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE);
    Ok((page, size))
}

/// Query parameters worth remembering in a saved report.
fn report_parameters(query: &ClubListQuery) -> Value {
    match serde_json::to_value(query) {
        Ok(Value::Object(mut map)) => {
            map.retain(|key, value| {
                !value.is_null() && !matches!(key.as_str(), "name" | "desc" | "existing")
            });
            Value::Object(map)
        }
        _ => Value::Object(Map::new()),
    }
}

async fn parents_for(state: &AppState, clubs: &[Club]) -> Result<Vec<Vec<RelatedClub>>, ClubError> {
    let ids: Vec<_> = clubs.iter().map(|c| c.id).collect();
    let rows: Vec<(uuid::Uuid, String, String)> = sqlx::query_as(
        r"
        SELECT r.child_id, p.name, p.code
        FROM club_relationships r
        INNER JOIN clubs p ON p.id = r.parent_id
        WHERE r.child_id = ANY($1)
        ORDER BY p.name
        ",
    )
    .bind(&ids)
    .fetch_all(&state.db)
    .await?;

    Ok(clubs
        .iter()
        .map(|club| {
            rows.iter()
                .filter(|(child, _, _)| *child == club.id)
                .map(|(_, name, code)| RelatedClub {
                    name: name.clone(),
                    code: code.clone(),
                })
                .collect()
        })
        .collect())
}

/// List or search clubs.
///
/// Returns every visible club, one page of them when `page` is given, or a
/// spreadsheet when `format=xlsx`.
#[utoipa::path(
    get,
    path = "/api/clubs",
    tag = "clubs",
    params(ClubListQuery),
    responses(
        (status = 200, body = Vec<ClubListItem>),
        (status = 404, description = "Page out of range")
    )
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn list_clubs(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ClubListQuery>,
) -> Result<Response, ClubError> {
    let principal = viewer.principal();
    let filter = ClubFilter {
        include_pending: principal.has(SystemPermission::SeePendingClubs),
        member_id: principal.user_id,
        search: query.search.clone(),
        codes: query.subset_codes(),
    };

    if query.wants_xlsx() {
        let clubs: Vec<Club> = queries::list_clubs(&state.db, &filter, None)
            .await?
            .into_iter()
            .map(|listed| listed.club)
            .collect();
        let ids: Vec<_> = clubs.iter().map(|c| c.id).collect();
        let mut tags = queries::tags_for(&state.db, &ids).await?;
        let parents = parents_for(&state, &clubs).await?;

        let rows: Vec<ClubExportRow> = clubs
            .into_iter()
            .zip(parents)
            .map(|(club, parent_orgs)| ClubExportRow {
                tags: tags.remove(&club.id).unwrap_or_default(),
                parent_orgs,
                code: club.code,
                name: club.name,
                subtitle: club.subtitle,
                description: club.description,
                email: club.email,
                approved: club.approved,
                active: club.active,
                accepting_members: club.accepting_members,
                size: club.size,
                application_required: club.application_required,
            })
            .collect();

        if let Some(user_id) = principal.user_id {
            let name = query.name.as_deref();
            if should_save_report(true, name, query.existing.as_deref()) {
                let report = create_report(
                    &state.db,
                    user_id,
                    name.unwrap_or_default(),
                    query.desc.as_deref(),
                    &report_parameters(&query),
                )
                .await?;
                tracing::info!(report_id = %report.id, "Saved club report");
            }
        }

        let filename = export_filename(query.name.as_deref(), Utc::now());
        return xlsx_download(&CLUB_EXPORT_SCHEMA, &to_records(&rows)?, &filename);
    }

    let window = match query.page {
        Some(page) => Some(page_window(page, query.page_size, state.config.club_page_size)?),
        None => None,
    };

    let clubs = queries::list_clubs(
        &state.db,
        &filter,
        window.map(|(page, size)| (size, (page - 1) * size)),
    )
    .await?;
    let ids: Vec<_> = clubs.iter().map(|c| c.club.id).collect();
    let mut tags = queries::tags_for(&state.db, &ids).await?;
    let results: Vec<ClubListItem> = clubs
        .into_iter()
        .map(|listed| {
            let club_tags = tags.remove(&listed.club.id).unwrap_or_default();
            ClubListItem::new(listed.club, club_tags, listed.favorite_count)
        })
        .collect();

    let Some((page, page_size)) = window else {
        return Ok(Json(results).into_response());
    };

    let count = queries::count_clubs(&state.db, &filter).await?;
    if page > 1 && (page - 1) * page_size >= count {
        return Err(ClubError::NotFound("Page"));
    }

    Ok(Json(ClubPage {
        count,
        page,
        page_size,
        results,
    })
    .into_response())
}

/// Exportable club fields, keyed by display name.
#[utoipa::path(
    get,
    path = "/api/clubs/fields",
    tag = "clubs",
    responses((status = 200, description = "Display name to field name"))
)]
pub async fn club_fields() -> Json<Map<String, Value>> {
    Json(
        CLUB_EXPORT_SCHEMA
            .field_names()
            .map(|field| (title_case(field), Value::String(field.to_string())))
            .collect(),
    )
}

/// Create a club. The creator becomes its owner.
#[utoipa::path(
    post,
    path = "/api/clubs",
    tag = "clubs",
    request_body = CreateClubRequest,
    responses(
        (status = 201, body = ClubResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth, body), fields(user_id = %auth.id))]
pub async fn create_club(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateClubRequest>,
) -> Result<(StatusCode, Json<ClubResponse>), ClubError> {
    let principal = auth.principal();
    authorize(Resource::Club, Action::Create, &AccessContext::new(&principal))?;
    body.validate()?;

    if body.approved.is_some() && !principal.has(SystemPermission::ApproveClub) {
        return Err(PermissionError::ApprovalRequired.into());
    }

    let code = match body.code.as_deref().map(str::trim) {
        Some(code) if slugify(code) != code => {
            return Err(ClubError::field(
                "code",
                "Enter a valid code consisting of lowercase letters, numbers, underscores or hyphens.",
            ))
        }
        Some(code) => code.to_string(),
        None => slugify(&body.name),
    };
    if code.is_empty() {
        return Err(ClubError::field("code", "Could not derive a code from the name."));
    }
    if club_code_exists(&state.db, &code).await? {
        return Err(ClubError::field("code", CODE_TAKEN));
    }

    let mut tx = state.db.begin().await?;

    let club = sqlx::query_as::<_, Club>(
        r"
        INSERT INTO clubs (code, name, subtitle, description, email, approved, active,
                           accepting_members, size, application_required)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        ",
    )
    .bind(&code)
    .bind(body.name.trim())
    .bind(body.subtitle.as_deref().unwrap_or_default())
    .bind(body.description.as_deref().unwrap_or_default())
    .bind(&body.email)
    .bind(body.approved)
    .bind(body.active.unwrap_or(false))
    .bind(body.accepting_members.unwrap_or(false))
    .bind(body.size.unwrap_or(1))
    .bind(body.application_required.unwrap_or(4))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match e {
        // Lost a race with another create of the same code.
        sqlx::Error::Database(db) if db.is_unique_violation() => ClubError::field("code", CODE_TAKEN),
        e => {
            tracing::error!(query = "create_club", code = %code, error = %e, "Database query failed");
            ClubError::Database(e)
        }
    })?;

    sqlx::query(
        "INSERT INTO memberships (club_id, user_id, role, title) VALUES ($1, $2, $3, 'Owner')",
    )
    .bind(club.id)
    .bind(auth.id)
    .bind(ClubRole::Owner)
    .execute(&mut *tx)
    .await?;

    queries::replace_tags(&mut tx, club.id, &body.tags).await?;
    if !body.parent_orgs.is_empty() {
        queries::replace_parents(&mut tx, &club, &body.parent_orgs).await?;
    }

    tx.commit().await?;

    tracing::info!(club_id = %club.id, code = %club.code, "Club created");

    let tags = queries::tags_for(&state.db, &[club.id])
        .await?
        .remove(&club.id)
        .unwrap_or_default();
    let parents = parent_codes(&state.db, club.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ClubResponse::new(club, tags, parents, Some(ClubRole::Owner))),
    ))
}

/// Get a club.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}",
    tag = "clubs",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = ClubResponse), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn get_club(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<ClubResponse>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    let tags = queries::tags_for(&state.db, &[access.club.id])
        .await?
        .remove(&access.club.id)
        .unwrap_or_default();
    let parents = parent_codes(&state.db, access.club.id).await?;
    let bookmarks = bookmark_state(&state.db, access.club.id, viewer.user_id()).await?;

    Ok(Json(
        ClubResponse::new(access.club, tags, parents, access.role).with_bookmarks(bookmarks),
    ))
}

/// Update a club. Fields left out are unchanged.
///
/// Changing the approval state requires the `approve_club` capability; a
/// body that only changes approval needs nothing else.
#[utoipa::path(
    patch,
    path = "/api/clubs/{code}",
    tag = "clubs",
    params(("code" = String, Path, description = "Club code")),
    request_body = UpdateClubRequest,
    responses(
        (status = 200, body = ClubResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not an officer"),
        (status = 404)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn update_club(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
    Json(body): Json<UpdateClubRequest>,
) -> Result<Json<ClubResponse>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    body.validate()?;

    if body.approved.is_some() {
        if !access.principal.is_authenticated() {
            return Err(PermissionError::Unauthenticated.into());
        }
        if !access.principal.has(SystemPermission::ApproveClub) {
            return Err(PermissionError::ApprovalRequired.into());
        }
    }
    if body.touches_profile() || body.approved.is_none() {
        access.authorize(Resource::Club, Action::Update)?;
    }

    let mut tx = state.db.begin().await?;

    let club = sqlx::query_as::<_, Club>(
        r"
        UPDATE clubs SET
            name = COALESCE($2, name),
            subtitle = COALESCE($3, subtitle),
            description = COALESCE($4, description),
            email = COALESCE($5, email),
            approved = CASE WHEN $6 THEN $7 ELSE approved END,
            active = COALESCE($8, active),
            accepting_members = COALESCE($9, accepting_members),
            size = COALESCE($10, size),
            application_required = COALESCE($11, application_required),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(access.club.id)
    .bind(body.name.as_deref().map(str::trim))
    .bind(&body.subtitle)
    .bind(&body.description)
    .bind(&body.email)
    .bind(body.approved.is_some())
    .bind(body.approved)
    .bind(body.active)
    .bind(body.accepting_members)
    .bind(body.size)
    .bind(body.application_required)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error!("update_club", club_id = %access.club.id))?;

    if let Some(tags) = &body.tags {
        queries::replace_tags(&mut tx, club.id, tags).await?;
    }
    if let Some(parents) = &body.parent_orgs {
        queries::replace_parents(&mut tx, &club, parents).await?;
    }

    tx.commit().await?;

    if let Some(approved) = body.approved {
        tracing::info!(club_id = %club.id, approved, "Club approval changed");
    }

    let tags = queries::tags_for(&state.db, &[club.id])
        .await?
        .remove(&club.id)
        .unwrap_or_default();
    let parents = parent_codes(&state.db, club.id).await?;
    let bookmarks = bookmark_state(&state.db, club.id, viewer.user_id()).await?;
    Ok(Json(
        ClubResponse::new(club, tags, parents, access.role).with_bookmarks(bookmarks),
    ))
}

/// Delete a club and everything attached to it.
#[utoipa::path(
    delete,
    path = "/api/clubs/{code}",
    tag = "clubs",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 204), (status = 403, description = "Not the owner"), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn delete_club(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Club, Action::Delete)?;

    sqlx::query("DELETE FROM clubs WHERE id = $1")
        .bind(access.club.id)
        .execute(&state.db)
        .await?;

    tracing::info!(club_id = %access.club.id, code = %access.club.code, "Club deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Tree of a club's descendants.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/children",
    tag = "clubs",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = ClubTree), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn club_children(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<ClubTree>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    let graph = load_graph(&state.db, &access.club, Direction::Children).await?;
    Ok(Json(graph.walk(&access.club.code)))
}

/// Tree of a club's ancestors.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/parents",
    tag = "clubs",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = ClubTree), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn club_parents(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<ClubTree>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    let graph = load_graph(&state.db, &access.club, Direction::Parents).await?;
    Ok(Json(graph.walk(&access.club.code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(1, None, 20).unwrap(), (1, 20));
        assert_eq!(page_window(3, Some(5), 20).unwrap(), (3, 5));
        assert_eq!(page_window(1, Some(0), 20).unwrap(), (1, 1));
        assert_eq!(page_window(1, Some(50_000), 20).unwrap(), (1, MAX_PAGE_SIZE));
        assert!(matches!(page_window(0, None, 20), Err(ClubError::NotFound("Page"))));
    }

    #[test]
    fn test_report_parameters_keep_filters_only() {
        let query = ClubListQuery {
            search: Some("chess".into()),
            subset: Some("a,b".into()),
            format: Some("xlsx".into()),
            name: Some("Roster".into()),
            desc: Some("Fall".into()),
            ..ClubListQuery::default()
        };
        assert_eq!(
            report_parameters(&query),
            serde_json::json!({"search": "chess", "in": "a,b", "format": "xlsx"})
        );
    }

    #[test]
    fn test_export_schema_covers_club_fields() {
        let names: Vec<_> = CLUB_EXPORT_SCHEMA.field_names().collect();
        assert_eq!(names.first(), Some(&"code"));
        assert_eq!(CLUB_EXPORT_SCHEMA.kind("approved"), FieldKind::Boolean);
        assert_eq!(CLUB_EXPORT_SCHEMA.kind("tags"), FieldKind::ManyToMany);
        assert_eq!(
            CLUB_EXPORT_SCHEMA.kind("size"),
            FieldKind::Choice(SIZE_CHOICES)
        );
    }

    #[tokio::test]
    async fn test_fields_map_display_names() {
        let Json(fields) = club_fields().await;
        assert_eq!(fields.get("Accepting Members"), Some(&Value::from("accepting_members")));
        assert_eq!(fields.get("Parent Orgs"), Some(&Value::from("parent_orgs")));
        assert_eq!(fields.len(), 12);
    }
}
