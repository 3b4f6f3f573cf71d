//! Club Question and Answer Handlers
//!
//! Anyone signed in may ask a club a question. Officers answer and approve
//! questions; only approved questions are public.

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
use crate::permissions::{Action, ClubRole, PermissionError, Principal, Resource};

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Question {
    pub id: Uuid,
    pub question: String,
    pub answer: Option<String>,
    /// Username of the asker, absent once their account is gone.
    pub author: Option<String>,
    pub responder: Option<String>,
    pub approved: bool,
    #[serde(skip)]
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AskQuestionRequest {
    #[validate(length(min = 1, max = 5000, message = "Question must be 1-5000 characters"))]
    pub question: String,
}

/// Partial question update. `answer` and `approved` are for officers.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 5000, message = "Question must be 1-5000 characters"))]
    pub question: Option<String>,
    #[validate(length(max = 5000, message = "Answer must be at most 5000 characters"))]
    pub answer: Option<String>,
    pub approved: Option<bool>,
}

impl UpdateQuestionRequest {
    const fn moderates(&self) -> bool {
        self.answer.is_some() || self.approved.is_some()
    }
}

/// Which questions of a club the caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionScope {
    Approved,
    ApprovedOrAuthor(Uuid),
    All,
}

impl QuestionScope {
    #[must_use]
    pub fn for_viewer(principal: &Principal, role: Option<ClubRole>) -> Self {
        if principal.is_superuser || role.is_some_and(|r| r.satisfies(ClubRole::Officer)) {
            return Self::All;
        }
        match principal.user_id {
            Some(user_id) => Self::ApprovedOrAuthor(user_id),
            None => Self::Approved,
        }
    }

    const fn binds(self) -> (bool, Option<Uuid>) {
        match self {
            Self::Approved => (false, None),
            Self::ApprovedOrAuthor(user_id) => (false, Some(user_id)),
            Self::All => (true, None),
        }
    }
}

const QUESTION_SELECT: &str = r"
    SELECT q.id, q.question, q.answer, a.username AS author, r.username AS responder,
           q.approved, q.author_id, q.created_at, q.updated_at
    FROM questions q
    LEFT JOIN users a ON a.id = q.author_id
    LEFT JOIN users r ON r.id = q.responder_id
";

async fn fetch_questions(
    state: &AppState,
    club_id: Uuid,
    scope: QuestionScope,
    id: Option<Uuid>,
) -> Result<Vec<Question>, ClubError> {
    let (show_all, author) = scope.binds();
    let questions = sqlx::query_as::<_, Question>(&format!(
        r"{QUESTION_SELECT}
        WHERE q.club_id = $1
          AND ($2 OR q.approved OR q.author_id = $3::uuid)
          AND ($4::uuid IS NULL OR q.id = $4)
        ORDER BY q.created_at ASC
        "
    ))
    .bind(club_id)
    .bind(show_all)
    .bind(author)
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(questions)
}

async fn load_question(
    state: &AppState,
    access: &ClubAccess,
    id: Uuid,
) -> Result<Question, ClubError> {
    let scope = QuestionScope::for_viewer(&access.principal, access.role);
    fetch_questions(state, access.club.id, scope, Some(id))
        .await?
        .into_iter()
        .next()
        .ok_or(ClubError::NotFound("Question"))
}

fn authorize_on(access: &ClubAccess, action: Action, question: &Question) -> Result<(), ClubError> {
    match question.author_id {
        Some(author) => access.authorize_target(Resource::Question, action, author),
        None => access.authorize(Resource::Question, action),
    }
}

/// List the questions the caller may see, oldest first.
#[utoipa::path(
    get,
    path = "/api/clubs/{code}/questions",
    tag = "questions",
    params(("code" = String, Path, description = "Club code")),
    responses((status = 200, body = Vec<Question>), (status = 404))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn list_questions(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
) -> Result<Json<Vec<Question>>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Question, Action::Read)?;

    let scope = QuestionScope::for_viewer(&access.principal, access.role);
    Ok(Json(fetch_questions(&state, access.club.id, scope, None).await?))
}

/// Ask a question. It stays hidden from others until approved.
#[utoipa::path(
    post,
    path = "/api/clubs/{code}/questions",
    tag = "questions",
    params(("code" = String, Path, description = "Club code")),
    request_body = AskQuestionRequest,
    responses(
        (status = 201, body = Question),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn ask_question(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(code): Path<String>,
    Json(body): Json<AskQuestionRequest>,
) -> Result<(StatusCode, Json<Question>), ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    access.authorize(Resource::Question, Action::Create)?;
    body.validate()?;

    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO questions (club_id, author_id, question) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(access.club.id)
    .bind(access.principal.user_id)
    .bind(body.question.trim())
    .fetch_one(&state.db)
    .await?;

    tracing::info!(club_id = %access.club.id, question_id = %id, "Question asked");
    let question = load_question(&state, &access, id).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// Edit, answer or approve a question.
///
/// Authors may reword their own question, which sends it back for approval.
/// Answering and approving require an officer.
#[utoipa::path(
    patch,
    path = "/api/clubs/{code}/questions/{id}",
    tag = "questions",
    params(
        ("code" = String, Path, description = "Club code"),
        ("id" = Uuid, Path, description = "Question ID")
    ),
    request_body = UpdateQuestionRequest,
    responses((status = 200, body = Question), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer, body))]
pub async fn update_question(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, id)): Path<(String, Uuid)>,
    Json(body): Json<UpdateQuestionRequest>,
) -> Result<Json<Question>, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    let current = load_question(&state, &access, id).await?;
    authorize_on(&access, Action::Update, &current)?;
    let is_moderator = access.authorize(Resource::Question, Action::Update).is_ok();
    if body.moderates() && !is_moderator {
        return Err(PermissionError::Forbidden.into());
    }
    body.validate()?;

    let reworded = body
        .question
        .as_deref()
        .is_some_and(|q| q.trim() != current.question);
    let approved = match body.approved {
        Some(approved) => Some(approved),
        None if reworded && !is_moderator => Some(false),
        None => None,
    };

    sqlx::query(
        r"
        UPDATE questions SET
            question = COALESCE($2, question),
            answer = COALESCE($3, answer),
            responder_id = CASE WHEN $3::text IS NULL THEN responder_id ELSE $4 END,
            approved = COALESCE($5, approved),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(current.id)
    .bind(body.question.as_deref().map(str::trim))
    .bind(&body.answer)
    .bind(access.principal.user_id)
    .bind(approved)
    .execute(&state.db)
    .await?;

    Ok(Json(load_question(&state, &access, id).await?))
}

/// Delete a question. Authors may delete their own.
#[utoipa::path(
    delete,
    path = "/api/clubs/{code}/questions/{id}",
    tag = "questions",
    params(
        ("code" = String, Path, description = "Club code"),
        ("id" = Uuid, Path, description = "Question ID")
    ),
    responses((status = 204), (status = 403), (status = 404)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, viewer))]
pub async fn delete_question(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((code, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ClubError> {
    let access = ClubAccess::load(&state.db, &code, &viewer).await?;
    let question = load_question(&state, &access, id).await?;
    authorize_on(&access, Action::Delete, &question)?;

    sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(question.id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
