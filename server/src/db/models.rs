//! Database Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::permissions::ClubRole;

/// User model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Club model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Club {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub subtitle: String,
    pub description: String,
    pub email: Option<String>,
    /// `None` pending review, `Some(true)` approved, `Some(false)` rejected.
    pub approved: Option<bool>,
    pub active: bool,
    pub accepting_members: bool,
    pub size: i16,
    pub application_required: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership joined with the member's user record.
#[derive(Debug, Clone, FromRow)]
pub struct MemberRow {
    pub id: Uuid,
    pub club_id: Uuid,
    pub user_id: Uuid,
    pub role: ClubRole,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub display_name: String,
    pub email: String,
}
