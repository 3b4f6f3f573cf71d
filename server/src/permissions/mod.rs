//! Permission system types and utilities.
//!
//! Two-tier permission model:
//! - System permissions: organization-wide capabilities granted per user
//! - Club roles: per-club Owner/Officer/Member hierarchy

pub mod queries;
pub mod resolver;
pub mod role;
pub mod rules;
pub mod system;

pub use queries::*;
pub use resolver::{
    authorize, check_membership_change, check_role_assignment, club_visibility,
    ensure_owner_remains, policy, Action, PermissionError, Resource,
};
pub use role::{ClubRole, Visibility};
pub use rules::{AccessContext, ClubContext, Principal, Rule};
pub use system::SystemPermission;
