//! Database queries for the permission system.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::role::ClubRole;
use super::system::SystemPermission;

/// Get a user's role in a club, `None` without a membership.
pub async fn get_club_role(
    pool: &PgPool,
    club_id: Uuid,
    user_id: Uuid,
) -> sqlx::Result<Option<ClubRole>> {
    let row: Option<(ClubRole,)> =
        sqlx::query_as("SELECT role FROM memberships WHERE club_id = $1 AND user_id = $2")
            .bind(club_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(role,)| role))
}

/// Get a user's roles in several clubs at once.
pub async fn get_club_roles(
    pool: &PgPool,
    club_ids: &[Uuid],
    user_id: Uuid,
) -> sqlx::Result<Vec<(Uuid, ClubRole)>> {
    sqlx::query_as(
        "SELECT club_id, role FROM memberships WHERE user_id = $1 AND club_id = ANY($2)",
    )
    .bind(user_id)
    .bind(club_ids)
    .fetch_all(pool)
    .await
}

/// Lock a club's owner memberships and count them.
///
/// Holds row locks until the surrounding transaction ends, so concurrent
/// demotions and removals of owners are serialized.
pub async fn lock_owners(conn: &mut PgConnection, club_id: Uuid) -> sqlx::Result<i64> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT id FROM memberships WHERE club_id = $1 AND role = $2 ORDER BY id FOR UPDATE")
            .bind(club_id)
            .bind(ClubRole::Owner)
            .fetch_all(&mut *conn)
            .await?;

    Ok(rows.len() as i64)
}

/// Load the organization-wide capabilities granted to a user.
///
/// Unknown names left over in the table are ignored.
pub async fn get_system_permissions(
    pool: &PgPool,
    user_id: Uuid,
) -> sqlx::Result<Vec<SystemPermission>> {
    let names: Vec<(String,)> =
        sqlx::query_as("SELECT permission FROM user_permissions WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(names
        .iter()
        .filter_map(|(name,)| SystemPermission::from_action_name(name))
        .collect())
}

/// Grant an organization-wide capability. Granting twice is a no-op.
pub async fn grant_system_permission(
    pool: &PgPool,
    user_id: Uuid,
    permission: SystemPermission,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO user_permissions (user_id, permission) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(permission.action_name())
    .execute(pool)
    .await?;

    Ok(())
}
