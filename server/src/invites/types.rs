//! Invitation Type Definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::permissions::ClubRole;

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Invite {
    pub id: Uuid,
    pub email: String,
    #[schema(value_type = i16)]
    pub role: ClubRole,
    pub title: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MassInviteRequest {
    /// Addresses separated by commas or newlines.
    pub emails: String,
    #[serde(default)]
    #[schema(value_type = Option<i16>)]
    pub role: Option<ClubRole>,
    #[validate(length(max = 255, message = "Title must be at most 255 characters"))]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MassInviteResponse {
    pub detail: String,
    pub sent: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptInviteRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AcceptInviteResponse {
    pub club: String,
    #[schema(value_type = i16)]
    pub role: ClubRole,
    pub title: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DetailResponse {
    pub detail: String,
}
