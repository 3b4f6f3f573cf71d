//! Database Queries
//!
//! Runtime queries (no compile-time `DATABASE_URL` required).
//!
//! All query functions include error context logging to aid debugging.

use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Club, MemberRow, User};

// ============================================================================
// User Queries
// ============================================================================

/// Find user by ID.
pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_id", user_id = %id))
}

/// Find user by username.
pub async fn find_user_by_username(pool: &PgPool, username: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_username", username = %username))
}

/// Find user by email (case-insensitive).
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_email", email = %email))
}

/// Check if username exists.
pub async fn username_exists(pool: &PgPool, username: &str) -> sqlx::Result<bool> {
    let result: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(pool)
        .await?;

    Ok(result.0)
}

/// Check if email exists.
pub async fn email_exists(pool: &PgPool, email: &str) -> sqlx::Result<bool> {
    let result: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
            .bind(email)
            .fetch_one(pool)
            .await?;

    Ok(result.0)
}

/// Create a new user.
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    display_name: &str,
    email: &str,
    password_hash: &str,
) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        r"
        INSERT INTO users (username, display_name, email, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(username)
    .bind(display_name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_user", username = %username))
}

// ============================================================================
// Club Queries
// ============================================================================

/// Find club by its code.
pub async fn find_club_by_code(pool: &PgPool, code: &str) -> sqlx::Result<Option<Club>> {
    sqlx::query_as::<_, Club>("SELECT * FROM clubs WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_club_by_code", code = %code))
}

/// Check if a club code is taken.
pub async fn club_code_exists(pool: &PgPool, code: &str) -> sqlx::Result<bool> {
    let result: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM clubs WHERE code = $1)")
        .bind(code)
        .fetch_one(pool)
        .await?;

    Ok(result.0)
}

// ============================================================================
// Membership Queries
// ============================================================================

const MEMBER_SELECT: &str = r"
    SELECT m.id, m.club_id, m.user_id, m.role, m.title, m.created_at,
           u.username, u.display_name, u.email
    FROM memberships m
    INNER JOIN users u ON u.id = m.user_id
";

/// List a club's roster, most privileged first.
pub async fn list_members(pool: &PgPool, club_id: Uuid) -> sqlx::Result<Vec<MemberRow>> {
    sqlx::query_as::<_, MemberRow>(&format!(
        "{MEMBER_SELECT} WHERE m.club_id = $1 ORDER BY m.role ASC, u.display_name ASC"
    ))
    .bind(club_id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_members", club_id = %club_id))
}

/// Find a single membership by the member's username.
pub async fn find_member(
    pool: &PgPool,
    club_id: Uuid,
    username: &str,
) -> sqlx::Result<Option<MemberRow>> {
    sqlx::query_as::<_, MemberRow>(&format!(
        "{MEMBER_SELECT} WHERE m.club_id = $1 AND u.username = $2"
    ))
    .bind(club_id)
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_member", club_id = %club_id, username = %username))
}

/// Emails (lowercased) of everyone holding a membership in a club.
pub async fn member_emails(pool: &PgPool, club_id: Uuid) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r"
        SELECT LOWER(u.email)
        FROM memberships m
        INNER JOIN users u ON u.id = m.user_id
        WHERE m.club_id = $1
        ",
    )
    .bind(club_id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("member_emails", club_id = %club_id))?;

    Ok(rows.into_iter().map(|(email,)| email).collect())
}
