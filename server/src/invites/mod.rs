//! Club invitations.
//!
//! Officers invite people by email; recipients accept with the token from
//! the link they were sent. Routes live under the club router.

pub mod handlers;
pub mod mass;
pub mod types;

pub use mass::{parse_emails, plan_invites, sent_message, InvitePlan};
pub use types::{Invite, MassInviteRequest, MassInviteResponse};
