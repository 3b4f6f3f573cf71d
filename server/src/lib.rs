//! Clubhub Server
//!
//! Student organization directory: clubs, rosters, events, invitations,
//! notes between clubs and spreadsheet exports.

/// Log a failed query with its context and pass the error through.
///
/// Used as `.map_err(db_error!("query_name", field = %value))`.
macro_rules! db_error {
    ($query:expr, $($field:tt)*) => {
        |e| {
            tracing::error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

pub mod api;
pub mod auth;
pub mod clubs;
pub mod config;
pub mod db;
pub mod email;
pub mod export;
pub mod invites;
pub mod notes;
pub mod permissions;
pub mod util;
