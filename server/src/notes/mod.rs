//! Notes clubs write about other clubs.
//!
//! Routes live under the club router; see [`crate::clubs::router`].

pub mod handlers;
pub mod visibility;

pub use visibility::{note_visible, NoteAudience, ViewerRoles};
