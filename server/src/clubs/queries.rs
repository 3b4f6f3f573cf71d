//! Club database queries.

use std::collections::HashMap;

use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::error::ClubError;
use super::types::Tag;
use crate::db::Club;

/// Filters for the club list.
#[derive(Debug, Default, Clone)]
pub struct ClubFilter {
    /// Show every club regardless of approval.
    pub include_pending: bool,
    /// Also show unapproved clubs this user belongs to.
    pub member_id: Option<Uuid>,
    pub search: Option<String>,
    pub codes: Option<Vec<String>>,
}

/// A club as listed, with its favorite count.
#[derive(Debug, Clone, FromRow)]
pub struct ListedClub {
    #[sqlx(flatten)]
    pub club: Club,
    pub favorite_count: i64,
}

const FILTER_SQL: &str = r"
    FROM clubs c
    WHERE ($1 OR c.approved IS TRUE
           OR ($2::uuid IS NOT NULL AND EXISTS (
               SELECT 1 FROM memberships m WHERE m.club_id = c.id AND m.user_id = $2)))
      AND ($3::text IS NULL OR c.name ILIKE $3 OR c.subtitle ILIKE $3)
      AND ($4::text[] IS NULL OR c.code = ANY($4))
";

fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let escaped = s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            format!("%{escaped}%")
        })
}

/// List clubs matching `filter`, most favorited first, then by name.
/// `page` is (limit, offset).
pub async fn list_clubs(
    pool: &PgPool,
    filter: &ClubFilter,
    page: Option<(i64, i64)>,
) -> sqlx::Result<Vec<ListedClub>> {
    let (limit, offset) = page.map_or((None, 0), |(limit, offset)| (Some(limit), offset));

    sqlx::query_as::<_, ListedClub>(&format!(
        r"
        SELECT c.*, (SELECT COUNT(*) FROM favorites f WHERE f.club_id = c.id) AS favorite_count
        {FILTER_SQL}
        ORDER BY favorite_count DESC, c.name ASC, c.code ASC
        LIMIT $5 OFFSET $6
        "
    ))
    .bind(filter.include_pending)
    .bind(filter.member_id)
    .bind(search_pattern(filter.search.as_deref()))
    .bind(filter.codes.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_clubs", search = ?filter.search))
}

/// Count clubs matching `filter`.
pub async fn count_clubs(pool: &PgPool, filter: &ClubFilter) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) {FILTER_SQL}"))
        .bind(filter.include_pending)
        .bind(filter.member_id)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(filter.codes.as_deref())
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Tags of several clubs, keyed by club ID.
pub async fn tags_for(pool: &PgPool, club_ids: &[Uuid]) -> sqlx::Result<HashMap<Uuid, Vec<Tag>>> {
    if club_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
        r"
        SELECT ct.club_id, t.id, t.name
        FROM club_tags ct
        INNER JOIN tags t ON t.id = ct.tag_id
        WHERE ct.club_id = ANY($1)
        ORDER BY t.name
        ",
    )
    .bind(club_ids)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for (club_id, id, name) in rows {
        map.entry(club_id).or_default().push(Tag { id, name });
    }
    Ok(map)
}

/// Replace a club's tags, creating unknown tag names.
pub async fn replace_tags(
    conn: &mut PgConnection,
    club_id: Uuid,
    names: &[String],
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM club_tags WHERE club_id = $1")
        .bind(club_id)
        .execute(&mut *conn)
        .await?;

    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let (tag_id,): (Uuid,) = sqlx::query_as(
            r"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            ",
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("INSERT INTO club_tags (club_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(club_id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Replace a club's parent organizations.
///
/// Rejects a club naming itself and codes that do not exist. Longer cycles
/// are allowed; the tree walker cuts them when reading.
pub async fn replace_parents(
    conn: &mut PgConnection,
    club: &Club,
    codes: &[String],
) -> Result<(), ClubError> {
    if codes.iter().any(|code| *code == club.code) {
        return Err(ClubError::field(
            "parent_orgs",
            "A club cannot be its own parent.",
        ));
    }

    let parents: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT id, code FROM clubs WHERE code = ANY($1)")
            .bind(codes)
            .fetch_all(&mut *conn)
            .await?;

    if let Some(missing) = codes
        .iter()
        .find(|code| !parents.iter().any(|(_, found)| found == *code))
    {
        return Err(ClubError::field(
            "parent_orgs",
            format!("Club with code \"{missing}\" does not exist."),
        ));
    }

    sqlx::query("DELETE FROM club_relationships WHERE child_id = $1")
        .bind(club.id)
        .execute(&mut *conn)
        .await?;

    for (parent_id, _) in &parents {
        sqlx::query(
            "INSERT INTO club_relationships (parent_id, child_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(parent_id)
        .bind(club.id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern(Some("labs")), Some("%labs%".into()));
        assert_eq!(search_pattern(Some("100%")), Some("%100\\%%".into()));
        assert_eq!(search_pattern(Some("a_b")), Some("%a\\_b%".into()));
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(None), None);
    }
}
