//! Club Roster Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::access::ClubAccess;
use super::error::ClubError;
use super::types::ROLE_CHOICES;
use crate::api::AppState;
use crate::auth::Viewer;
use crate::db::{find_member, find_user_by_username, list_members, MemberRow};
use crate::export::{export_filename, to_records, xlsx_download, ExportSchema, FieldKind};
use crate::permissions::{
    check_membership_change, check_role_assignment, ensure_owner_remains, lock_owners, Action,
    ClubRole, Resource,
};

/// Spreadsheet layout of a roster.
pub const MEMBER_EXPORT_SCHEMA: ExportSchema = ExportSchema::new(&[
    ("username", FieldKind::Passthrough),
    ("name", FieldKind::Passthrough),
    ("email", FieldKind::Passthrough),
    ("role", FieldKind::Choice(ROLE_CHOICES)),
    ("title", FieldKind::Passthrough),
]);

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberResponse {
    pub username: String,
    pub name: String,
    /// Only shown to members of the club.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[schema(value_type = i16)]
    pub role: ClubRole,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl MemberResponse {
    fn new(row: MemberRow, show_email: bool) -> Self {
        Self {
            username: row.username,
            name: row.display_name,
            email: show_email.then_some(row.email),
            role: row.role,
            title: row.title,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct MemberExportRow {
    username: String,
    name: String,
    email: String,
    role: i16,
    title: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddMemberRequest {
    pub username: String,
    #[serde(default)]
    #[schema(value_type = Option<i16>)]
    pub role: Option<ClubRole>,
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMemberRequest {
    #[serde(default)]
    #[schema(value_type = Option<i16>)]
    pub role: Option<ClubRole>,
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RosterQuery {
    /// `xlsx` to download the roster as a spreadsheet.
    pub format: Option<String>,
    /// Names the downloaded file.
    pub name: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn load_member(
    state: &AppState,
    access: &ClubAccess,
    username: &str,
) -> Result<MemberRow, ClubError> {
    find_member(&state.db, access.club.id, username)
        .await?
        .ok_or(ClubError::NotFound("Membership"))
}

/// Lock the club's owners and the target membership, returning the owner
/// count and the target's current role.
async fn lock_for_change(
    tx: &mut PgConnection,
    access: &ClubAccess,
    member: &MemberRow,
) -> Result<(i64, ClubRole), ClubError> {
    let owners = lock_owners(&mut *tx, access.club.id).await?;
    let (role,): (ClubRole,) =
        sqlx::query_as("SELECT role FROM memberships WHERE id = $1 FOR UPDATE")
            .bind(member.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ClubError::NotFound("Membership"))?;
    Ok((owners, role))
}

fn is_self(access: &ClubAccess, member: &MemberRow) -> bool {
    access.principal.user_id == Some(member.user_id)
}

/// List a club's members, most privileged first.
///
/// With `format=xlsx` the roster is downloaded as a spreadsheet; this
/// requires an officer role since it includes contact details.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/members",
    tag = "members",
    params(("code" = String, Path, description = "Club code"), RosterQuery),
    responses((status = 200, body = Vec<MemberResponse>), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn list_club_members(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
    Query(query): Query<RosterQuery>,
) -> Result<Response, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Membership, Action::Read)?;
    let rows = list_members(&state.db, access.club.id).await?;

    if query.format.as_deref() == Some("xlsx") {
        access.authorize(Resource::Membership, Action::Update)?;
        let export: Vec<MemberExportRow> = rows
            .into_iter()
            .map(|row| MemberExportRow {
                username: row.username,
                name: row.display_name,
                email: row.email,
                role: row.role.into(),
                title: row.title,
            })
            .collect();
        let filename = export_filename(query.name.as_deref(), Utc::now());
        return xlsx_download(&MEMBER_EXPORT_SCHEMA, &to_records(&export)?, &filename);
    }

    let show_email = access.role.is_some() || access.is_superuser();
    let members: Vec<MemberResponse> = rows
        .into_iter()
        .map(|row| MemberResponse::new(row, show_email))
        .collect();
    Ok(Json(members).into_response())
}

/// Add an existing user to a club.
#[utoipa::path(
    post,
    path = "/api/clubs/{code}/members",
    tag = "members",
    params(("code" = String, Path, description = "Club code")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, body = MemberResponse),
        (status = 400, description = "Unknown user or already a member"),
        (status = 403, description = "Not an officer")
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn add_club_member(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Membership, Action::Create)?;
    body.validate()?;

    let role = body.role.unwrap_or_default();
    check_role_assignment(&access.principal, access.role, role)?;

    let user = find_user_by_username(&state.db, &body.username)
        .await?
        .ok_or_else(|| ClubError::field("username", "User with this username does not exist."))?;

    let inserted = sqlx::query(
        r"
        INSERT INTO memberships (club_id, user_id, role, title)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (club_id, user_id) DO NOTHING
        ",
    )
    .bind(access.club.id)
    .bind(user.id)
    .bind(role)
    .bind(body.title.as_deref().unwrap_or("Member"))
    .execute(&state.db)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(ClubError::field(
            "username",
            "User is already a member of this club.",
        ));
    }

    tracing::info!(club_id = %access.club.id, user_id = %user.id, role = role.label(), "Member added");

    let row = load_member(&state, &access, &user.username).await?;
    Ok((StatusCode::CREATED, Json(MemberResponse::new(row, true))))
}

/// Get one membership.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/members/{username}",
    tag = "members",
    params(
        ("code" = String, Path, description = "Club code"),
        ("username" = String, Path, description = "Member username")
    ),
    responses((status = 200, body = MemberResponse), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn get_club_member(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, username)): Path<(String, String)>,
) -> Result<Json<MemberResponse>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Membership, Action::Read)?;
    let row = load_member(&state, &access, &username).await?;

    let show_email = access.role.is_some() || access.is_superuser();
    Ok(Json(MemberResponse::new(row, show_email)))
}

/// Change a member's role or title.
#[utoipa::path(
    patch,
    path = "/api/clubs/{code}/members/{username}",
    tag = "members",
    params(
        ("code" = String, Path, description = "Club code"),
        ("username" = String, Path, description = "Member username")
    ),
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, body = MemberResponse),
        (status = 403, description = "Role hierarchy or sole owner"),
        (status = 404)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn update_club_member(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, username)): Path<(String, String)>,
    Json(body): Json<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    let member = load_member(&state, &access, &username).await?;
    access.authorize_target(Resource::Membership, Action::Update, member.user_id)?;
    body.validate()?;

    let is_self = is_self(&access, &member);
    check_membership_change(&access.principal, access.role, member.role, is_self)?;
    if let Some(role) = body.role {
        check_role_assignment(&access.principal, access.role, role)?;
    }

    let mut tx = state.db.begin().await?;

    if let Some(role) = body.role {
        let (owners, current) = lock_for_change(&mut tx, &access, &member).await?;
        ensure_owner_remains(current, Some(role), owners)?;
    }

    sqlx::query(
        r"
        UPDATE memberships
        SET role = COALESCE($2, role), title = COALESCE($3, title), updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(member.id)
    .bind(body.role)
    .bind(&body.title)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if let Some(role) = body.role.filter(|role| *role != member.role) {
        tracing::info!(
            club_id = %access.club.id,
            user_id = %member.user_id,
            from = member.role.label(),
            to = role.label(),
            "Member role changed"
        );
    }

    let row = load_member(&state, &access, &username).await?;
    Ok(Json(MemberResponse::new(row, true)))
}

/// Remove a member. Members may always remove themselves, except the last owner.
#[utoipa::path(
    delete,
    path = "/api/clubs/{code}/members/{username}",
    tag = "members",
    params(
        ("code" = String, Path, description = "Club code"),
        ("username" = String, Path, description = "Member username")
    ),
    responses(
        (status = 204),
        (status = 403, description = "Role hierarchy or sole owner"),
        (status = 404)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn remove_club_member(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, username)): Path<(String, String)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    let member = load_member(&state, &access, &username).await?;
    access.authorize_target(Resource::Membership, Action::Delete, member.user_id)?;

    let is_self = is_self(&access, &member);
    check_membership_change(&access.principal, access.role, member.role, is_self)?;

    let mut tx = state.db.begin().await?;
    let (owners, current) = lock_for_change(&mut tx, &access, &member).await?;
    ensure_owner_remains(current, None, owners)?;

    sqlx::query("DELETE FROM memberships WHERE id = $1")
        .bind(member.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(club_id = %access.club.id, user_id = %member.user_id, "Member removed");
    Ok(StatusCode::NO_CONTENT)
}
