//! Club relationship trees.
//!
//! Parent/child links between clubs form an arbitrary directed graph, so
//! cycles are possible. The walker expands a club's ancestors or
//! descendants into a tree and cuts any edge that leads back to a club
//! already on the current path, emitting that club as a leaf instead.

use std::collections::{HashMap, HashSet};

use sqlx::PgPool;
use uuid::Uuid;

use super::types::ClubTree;
use crate::db::Club;

/// Which way to follow relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Children,
    Parents,
}

impl Direction {
    /// (`from`, `to`) columns of `club_relationships` for this direction.
    const fn columns(self) -> (&'static str, &'static str) {
        match self {
            Self::Children => ("parent_id", "child_id"),
            Self::Parents => ("child_id", "parent_id"),
        }
    }
}

/// In-memory adjacency keyed by club code.
#[derive(Debug, Default, Clone)]
pub struct ClubGraph {
    names: HashMap<String, String>,
    edges: HashMap<String, Vec<String>>,
}

impl ClubGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a club. Re-adding a code updates its name.
    pub fn add_club(&mut self, code: &str, name: &str) {
        self.names.insert(code.to_string(), name.to_string());
    }

    /// Add a directed edge in the walked direction.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
    }

    fn name(&self, code: &str) -> String {
        self.names.get(code).cloned().unwrap_or_default()
    }

    /// Expand the tree rooted at `root`.
    #[must_use]
    pub fn walk(&self, root: &str) -> ClubTree {
        let mut visited = HashSet::from([root.to_string()]);
        self.expand(root, &mut visited)
    }

    fn expand(&self, code: &str, visited: &mut HashSet<String>) -> ClubTree {
        let neighbors = self.edges.get(code).map(Vec::as_slice).unwrap_or_default();

        let children = neighbors
            .iter()
            .map(|next| {
                if visited.contains(next) {
                    ClubTree {
                        name: self.name(next),
                        code: next.clone(),
                        children: None,
                    }
                } else {
                    visited.insert(next.clone());
                    let subtree = self.expand(next, visited);
                    visited.remove(next);
                    subtree
                }
            })
            .collect();

        ClubTree {
            name: self.name(code),
            code: code.to_string(),
            children: Some(children),
        }
    }
}

/// Load every relationship reachable from `root` in `direction`.
pub async fn load_graph(pool: &PgPool, root: &Club, direction: Direction) -> sqlx::Result<ClubGraph> {
    let (from, to) = direction.columns();

    // UNION (not UNION ALL) stops the recursion on cycles.
    let rows: Vec<(String, String, String)> = sqlx::query_as(&format!(
        r"
        WITH RECURSIVE reach(id) AS (
            SELECT $1::uuid
            UNION
            SELECT r.{to} FROM club_relationships r INNER JOIN reach ON r.{from} = reach.id
        )
        SELECT src.code, dst.code, dst.name
        FROM club_relationships r
        INNER JOIN reach ON r.{from} = reach.id
        INNER JOIN clubs src ON src.id = r.{from}
        INNER JOIN clubs dst ON dst.id = r.{to}
        ORDER BY src.code, dst.name
        "
    ))
    .bind(root.id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("load_club_graph", club_id = %root.id))?;

    let mut graph = ClubGraph::new();
    graph.add_club(&root.code, &root.name);
    for (src, dst, dst_name) in &rows {
        graph.add_club(dst, dst_name);
        graph.add_edge(src, dst);
    }
    Ok(graph)
}

/// Codes of a club's direct parents.
pub async fn parent_codes(pool: &PgPool, club_id: Uuid) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r"
        SELECT c.code
        FROM club_relationships r
        INNER JOIN clubs c ON c.id = r.parent_id
        WHERE r.child_id = $1
        ORDER BY c.code
        ",
    )
    .bind(club_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(code,)| code).collect())
}
