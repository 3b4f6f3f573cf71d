//! Club Type Definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::bookmarks::BookmarkState;
use crate::db::Club;
use crate::permissions::ClubRole;

// ============================================================================
// Choice Tables
// ============================================================================

/// Labels for the `size` field.
pub const SIZE_CHOICES: &[(i64, &str)] = &[(1, "1-20"), (2, "21-50"), (3, "51-100"), (4, "101+")];

/// Labels for the `application_required` field.
pub const APPLICATION_CHOICES: &[(i64, &str)] = &[
    (1, "Open Membership"),
    (2, "Tryouts Required"),
    (3, "Auditions Required"),
    (4, "Application Required"),
    (5, "Application and Interview Required"),
];

/// Labels for membership roles in roster exports.
pub const ROLE_CHOICES: &[(i64, &str)] = &[(1, "Owner"), (2, "Officer"), (3, "Member")];

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateClubRequest {
    /// Slug identifying the club. Derived from the name when omitted.
    #[validate(length(min = 1, max = 255, message = "Code must be 1-255 characters"))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[validate(length(max = 255, message = "Subtitle must be at most 255 characters"))]
    pub subtitle: Option<String>,
    pub description: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    /// Setting this requires the `approve_club` capability.
    #[serde(default, alias = "accepted")]
    pub approved: Option<bool>,
    pub active: Option<bool>,
    pub accepting_members: Option<bool>,
    #[validate(range(min = 1, max = 4, message = "Select a valid size."))]
    pub size: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Select a valid application requirement."))]
    pub application_required: Option<i16>,
    /// Tag names; unknown tags are created.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Codes of parent organizations.
    #[serde(default)]
    pub parent_orgs: Vec<String>,
}

/// Partial club update. Fields left out are unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateClubRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 255, message = "Subtitle must be at most 255 characters"))]
    pub subtitle: Option<String>,
    pub description: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[serde(default, alias = "accepted")]
    pub approved: Option<bool>,
    pub active: Option<bool>,
    pub accepting_members: Option<bool>,
    #[validate(range(min = 1, max = 4, message = "Select a valid size."))]
    pub size: Option<i16>,
    #[validate(range(min = 1, max = 5, message = "Select a valid application requirement."))]
    pub application_required: Option<i16>,
    pub tags: Option<Vec<String>>,
    pub parent_orgs: Option<Vec<String>>,
}

impl UpdateClubRequest {
    /// Whether anything besides the approval state is being changed.
    #[must_use]
    pub const fn touches_profile(&self) -> bool {
        self.name.is_some()
            || self.subtitle.is_some()
            || self.description.is_some()
            || self.email.is_some()
            || self.active.is_some()
            || self.accepting_members.is_some()
            || self.size.is_some()
            || self.application_required.is_some()
            || self.tags.is_some()
            || self.parent_orgs.is_some()
    }
}

/// Query parameters for the club list.
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct ClubListQuery {
    /// Case-insensitive match against name and subtitle.
    pub search: Option<String>,
    /// Comma separated subset of club codes.
    #[serde(rename = "in")]
    pub subset: Option<String>,
    /// Page number, starting at 1. Results are unpaginated without it.
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// `xlsx` to download a spreadsheet instead of JSON.
    pub format: Option<String>,
    /// Report name; also names the downloaded file.
    pub name: Option<String>,
    /// Report description.
    pub desc: Option<String>,
    /// Set when re-downloading a saved report.
    pub existing: Option<String>,
}

impl ClubListQuery {
    /// Parsed `in` filter: trimmed, non-empty codes.
    #[must_use]
    pub fn subset_codes(&self) -> Option<Vec<String>> {
        let raw = self.subset.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(ToString::to_string)
                .collect(),
        )
    }

    #[must_use]
    pub fn wants_xlsx(&self) -> bool {
        self.format.as_deref() == Some("xlsx")
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// Full club detail.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClubResponse {
    pub code: String,
    pub name: String,
    pub subtitle: String,
    pub description: String,
    pub email: Option<String>,
    pub approved: Option<bool>,
    pub active: bool,
    pub accepting_members: bool,
    pub size: i16,
    pub application_required: i16,
    pub tags: Vec<Tag>,
    pub parent_orgs: Vec<String>,
    /// The viewer's role in the club, if any.
    #[schema(value_type = Option<i16>)]
    pub is_member: Option<ClubRole>,
    pub favorite_count: i64,
    pub is_favorite: bool,
    pub is_subscribe: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClubResponse {
    #[must_use]
    pub fn new(club: Club, tags: Vec<Tag>, parent_orgs: Vec<String>, role: Option<ClubRole>) -> Self {
        Self {
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
            tags,
            parent_orgs,
            is_member: role,
            favorite_count: 0,
            is_favorite: false,
            is_subscribe: false,
            created_at: club.created_at,
            updated_at: club.updated_at,
        }
    }

    /// Fill in the viewer's bookmarks and the favorite count.
    #[must_use]
    pub fn with_bookmarks(mut self, bookmarks: BookmarkState) -> Self {
        self.favorite_count = bookmarks.favorite_count;
        self.is_favorite = bookmarks.is_favorite;
        self.is_subscribe = bookmarks.is_subscribe;
        self
    }
}

/// Club summary used in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClubListItem {
    pub code: String,
    pub name: String,
    pub subtitle: String,
    pub approved: Option<bool>,
    pub active: bool,
    pub accepting_members: bool,
    pub size: i16,
    pub application_required: i16,
    pub tags: Vec<Tag>,
    pub favorite_count: i64,
}

impl ClubListItem {
    #[must_use]
    pub fn new(club: Club, tags: Vec<Tag>, favorite_count: i64) -> Self {
        Self {
            code: club.code,
            name: club.name,
            subtitle: club.subtitle,
            approved: club.approved,
            active: club.active,
            accepting_members: club.accepting_members,
            size: club.size,
            application_required: club.application_required,
            tags,
            favorite_count,
        }
    }
}

/// One page of clubs.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClubPage {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<ClubListItem>,
}

/// A node of a club relationship tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClubTree {
    pub name: String,
    pub code: String,
    /// Absent on nodes where a cycle was cut.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(no_recursion)]
    pub children: Option<Vec<ClubTree>>,
}
