//! Invitation Handlers

use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rand::Rng;
use uuid::Uuid;
use validator::Validate;

use super::mass::{plan_invites, sent_message};
use super::types::{
    AcceptInviteRequest, AcceptInviteResponse, DetailResponse, Invite, MassInviteRequest,
    MassInviteResponse,
};
use crate::api::AppState;
use crate::auth::{AuthUser, Viewer};
use crate::clubs::access::ClubAccess;
use crate::clubs::ClubError;
use crate::db::{member_emails, Club};
use crate::email::{dispatch_invite, InviteEmail, InviteTemplate};
use crate::permissions::{Action, ClubRole, PermissionError, Resource};

const TOKEN_LENGTH: usize = 32;

/// Generate a random invite token.
fn generate_invite_token() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..TOKEN_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Link the recipient follows to accept an invite.
fn invite_url(public_url: &str, club: &Club, invite: &Invite) -> String {
    format!(
        "{}/invite/{}/{}/{}",
        public_url.trim_end_matches('/'),
        club.code,
        invite.id,
        invite.token
    )
}

async fn load_invite(state: &AppState, club_id: Uuid, id: Uuid) -> Result<Invite, ClubError> {
    sqlx::query_as::<_, Invite>(
        r"
        SELECT id, email, role, title, token, active, created_at
        FROM membership_invites
        WHERE id = $1 AND club_id = $2 AND active
        ",
    )
    .bind(id)
    .bind(club_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ClubError::NotFound("Invite"))
}

/// Invite a batch of email addresses to a club.
#[utoipa::path(
    post,
    path = "/api/clubs/{code}/invite",
    tag = "invites",
    params(("code" = String, Path, description = "Club code")),
    request_body = MassInviteRequest,
    responses(
        (status = 200, body = MassInviteResponse),
        (status = 400, description = "Invalid address"),
        (status = 403, description = "Not an officer or role too high")
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn mass_invite(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
    Json(body): Json<MassInviteRequest>,
) -> Result<Json<MassInviteResponse>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Invite, Action::Create)?;
    body.validate()?;

    let role = body.role.unwrap_or_default();
    let title = body.title.as_deref().unwrap_or("Member");
    let existing: HashSet<String> = member_emails(&state.db, access.club.id)
        .await?
        .into_iter()
        .collect();

    let plan = plan_invites(&body.emails, role, &access.principal, access.role, &existing)?;

    let mut tx = state.db.begin().await?;
    let mut invites = Vec::with_capacity(plan.emails.len());
    for email in &plan.emails {
        let invite = sqlx::query_as::<_, Invite>(
            r"
            INSERT INTO membership_invites (club_id, email, role, title, token, creator_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, role, title, token, active, created_at
            ",
        )
        .bind(access.club.id)
        .bind(email)
        .bind(role)
        .bind(title)
        .bind(generate_invite_token())
        .bind(access.principal.user_id)
        .fetch_one(&mut *tx)
        .await?;
        invites.push(invite);
    }
    tx.commit().await?;

    let sender = viewer.0.as_ref().map(|u| u.display_name.as_str());
    for invite in &invites {
        let message = InviteEmail {
            template: plan.template,
            club_name: &access.club.name,
            role,
            title,
            url: invite_url(&state.config.public_url, &access.club, invite),
            sender,
        };
        dispatch_invite(state.email.as_deref(), &invite.email, &message).await;
    }

    tracing::info!(
        club_id = %access.club.id,
        count = invites.len(),
        template = ?plan.template,
        "Invitations sent"
    );

    Ok(Json(MassInviteResponse {
        detail: sent_message(invites.len()),
        sent: invites.len(),
    }))
}

/// List a club's outstanding invites.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/invites",
    tag = "invites",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = Vec<Invite>), (status = 403)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn list_invites(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<Vec<Invite>>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Invite, Action::Read)?;

    let invites = sqlx::query_as::<_, Invite>(
        r"
        SELECT id, email, role, title, token, active, created_at
        FROM membership_invites
        WHERE club_id = $1 AND active
        ORDER BY created_at DESC
        ",
    )
    .bind(access.club.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(invites))
}

/// Send an invite email again.
#[utoipa::path(
    put,
    path = "/api/clubs/{code}/invites/{id}/resend",
    tag = "invites",
    params(
        ("code" = String, Path, description = "Club code"),
        ("id" = Uuid, Path, description = "Invite ID")
    ),
    responses((status = 200, body = DetailResponse), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn resend_invite(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, id)): Path<(String, Uuid)>,
) -> Result<Json<DetailResponse>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Invite, Action::Update)?;
    let invite = load_invite(&state, access.club.id, id).await?;

    let message = InviteEmail {
        template: InviteTemplate::Invite,
        club_name: &access.club.name,
        role: invite.role,
        title: &invite.title,
        url: invite_url(&state.config.public_url, &access.club, &invite),
        sender: viewer.0.as_ref().map(|u| u.display_name.as_str()),
    };
    dispatch_invite(state.email.as_deref(), &invite.email, &message).await;

    Ok(Json(DetailResponse {
        detail: format!("Resent invite to {}.", invite.email),
    }))
}

/// Rescind an invite.
#[utoipa::path(
    delete,
    path = "/api/clubs/{code}/invites/{id}",
    tag = "invites",
    params(
        ("code" = String, Path, description = "Club code"),
        ("id" = Uuid, Path, description = "Invite ID")
    ),
    responses((status = 204), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn rescind_invite(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Invite, Action::Delete)?;

    let result = sqlx::query("DELETE FROM membership_invites WHERE id = $1 AND club_id = $2")
        .bind(id)
        .bind(access.club.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ClubError::NotFound("Invite"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Accept an invite with its token.
///
/// The invite must have been sent to the caller's address. An existing
/// member keeps the more privileged of their current and invited roles.
#[utoipa::path(
    put,
    path = "/api/clubs/{code}/invites/{id}",
    tag = "invites",
    params(
        ("code" = String, Path, description = "Club code"),
        ("id" = Uuid, Path, description = "Invite ID")
    ),
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, body = AcceptInviteResponse),
        (status = 400, description = "Wrong token"),
        (status = 403, description = "Invite belongs to another address"),
        (status = 404)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, auth, body), fields(user_id = %auth.id))]
pub async fn accept_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((code, id)): Path<(String, Uuid)>,
    Json(body): Json<AcceptInviteRequest>,
) -> Result<Json<AcceptInviteResponse>, ClubError> {
    let viewer = Viewer(Some(auth.clone()));
    let access = ClubAccess::load_unchecked(&state.db, &code, &viewer).await?;
    let invite = load_invite(&state, access.club.id, id).await?;

    if invite.token != body.token {
        return Err(ClubError::field("token", "Invalid invite token."));
    }
    if !invite.email.eq_ignore_ascii_case(&auth.email) && !auth.is_superuser {
        return Err(PermissionError::Forbidden.into());
    }

    let mut tx = state.db.begin().await?;

    let (role, title): (ClubRole, String) = sqlx::query_as(
        r"
        INSERT INTO memberships (club_id, user_id, role, title)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (club_id, user_id) DO UPDATE SET
            role = LEAST(memberships.role, EXCLUDED.role),
            title = CASE WHEN EXCLUDED.role < memberships.role
                         THEN EXCLUDED.title ELSE memberships.title END,
            updated_at = NOW()
        RETURNING role, title
        ",
    )
    .bind(access.club.id)
    .bind(auth.id)
    .bind(invite.role)
    .bind(&invite.title)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE membership_invites SET active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(invite.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(club_id = %access.club.id, invite_id = %invite.id, role = role.label(), "Invite accepted");

    Ok(Json(AcceptInviteResponse {
        club: access.club.code,
        role,
        title,
    }))
}
