//! Permission resolution.
//!
//! Maps each (resource, action) pair to the rule that guards it and holds
//! the membership-specific checks that go beyond a single rule: role
//! ceilings, hierarchy protection and the sole-owner guard.

use super::role::ClubRole;
use super::rules::{AccessContext, Principal, Rule};

/// A guarded resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Club,
    Membership,
    Event,
    Note,
    Invite,
    Request,
    Testimonial,
    Question,
    Subscription,
}

/// An operation on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// Rule that decides whether a club is visible to the principal.
///
/// Approved clubs are public. Members see their own clubs whatever the
/// approval state, and `see_pending_clubs` reveals everything.
#[must_use]
pub fn club_visibility() -> Rule {
    Rule::ClubApproved
        .or(Rule::ClubMember)
        .or(Rule::System(super::SystemPermission::SeePendingClubs))
}

/// Rule guarding `action` on `resource`.
///
/// Every policy ends in `OR Superuser`.
#[must_use]
pub fn policy(resource: Resource, action: Action) -> Rule {
    let rule = match (resource, action) {
        (Resource::Club, Action::Read)
        | (Resource::Membership | Resource::Event, Action::Read) => club_visibility(),
        (Resource::Club, Action::Create) => Rule::Authenticated,
        (Resource::Club, Action::Update) => Rule::RoleAtLeast(ClubRole::Officer),
        (Resource::Club, Action::Delete) => Rule::RoleAtLeast(ClubRole::Owner),

        (Resource::Membership, Action::Delete) => {
            Rule::RoleAtLeast(ClubRole::Officer).or(Rule::SelfTarget)
        }
        (Resource::Membership | Resource::Event, _) => Rule::RoleAtLeast(ClubRole::Officer),

        (Resource::Note, Action::Read) => Rule::RoleAtLeast(ClubRole::Member),
        (Resource::Note, Action::Update) => Rule::any(vec![]),
        (Resource::Note, _) => Rule::RoleAtLeast(ClubRole::Officer),

        (Resource::Invite, _) => Rule::RoleAtLeast(ClubRole::Officer),

        (Resource::Request, Action::Create) => Rule::Authenticated,
        (Resource::Request, Action::Read | Action::Delete) => {
            Rule::SelfTarget.or(Rule::RoleAtLeast(ClubRole::Officer))
        }
        (Resource::Request, Action::Update) => Rule::RoleAtLeast(ClubRole::Officer),

        (Resource::Testimonial, Action::Read) => club_visibility(),
        (Resource::Testimonial, _) => Rule::RoleAtLeast(ClubRole::Officer),

        (Resource::Question, Action::Read) => club_visibility(),
        (Resource::Question, Action::Create) => Rule::Authenticated,
        (Resource::Question, Action::Update | Action::Delete) => {
            Rule::SelfTarget.or(Rule::RoleAtLeast(ClubRole::Officer))
        }

        (Resource::Subscription, Action::Read) => Rule::RoleAtLeast(ClubRole::Officer),
        (Resource::Subscription, Action::Create | Action::Delete) => Rule::Authenticated,
        (Resource::Subscription, Action::Update) => Rule::any(vec![]),
    };
    rule.or(Rule::Superuser)
}

/// Check `action` on `resource` and turn a denial into an error.
pub fn authorize(
    resource: Resource,
    action: Action,
    ctx: &AccessContext<'_>,
) -> Result<(), PermissionError> {
    if policy(resource, action).evaluate(ctx) {
        Ok(())
    } else if !ctx.principal.is_authenticated() && action != Action::Read {
        Err(PermissionError::Unauthenticated)
    } else {
        Err(PermissionError::Forbidden)
    }
}

/// Check that an actor may hand out `assigned`.
///
/// Members cannot assign a role more privileged than their own. Superusers
/// and actors without a membership (already cleared by a policy) are not
/// capped.
pub fn check_role_assignment(
    principal: &Principal,
    actor_role: Option<ClubRole>,
    assigned: ClubRole,
) -> Result<(), PermissionError> {
    if principal.is_superuser {
        return Ok(());
    }
    match actor_role {
        Some(actor) if assigned < actor => Err(PermissionError::RoleCeiling { actor, assigned }),
        _ => Ok(()),
    }
}

/// Check that an actor may modify or remove a membership held at `target`.
///
/// Nobody but a superuser may touch a membership more privileged than their
/// own. A member acting on their own record passes this check.
pub fn check_membership_change(
    principal: &Principal,
    actor_role: Option<ClubRole>,
    target: ClubRole,
    is_self: bool,
) -> Result<(), PermissionError> {
    if principal.is_superuser || is_self {
        return Ok(());
    }
    match actor_role {
        Some(actor) if target < actor => Err(PermissionError::RoleHierarchy { actor, target }),
        Some(_) => Ok(()),
        None => Err(PermissionError::NotClubMember),
    }
}

/// Terminal-state guard keeping at least one owner in every club.
///
/// `new_role` is `None` when the membership is being removed. `owner_count`
/// must come from rows locked in the same transaction as the change. Runs
/// after the ordinary role checks have passed.
pub const fn ensure_owner_remains(
    current: ClubRole,
    new_role: Option<ClubRole>,
    owner_count: i64,
) -> Result<(), PermissionError> {
    if !matches!(current, ClubRole::Owner) || owner_count > 1 {
        return Ok(());
    }
    match new_role {
        Some(ClubRole::Owner) => Ok(()),
        _ => Err(PermissionError::SoleOwner),
    }
}

/// Permission check errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// The operation requires a signed-in user.
    Unauthenticated,

    /// The policy rejected the request.
    Forbidden,

    /// User is not a member of the club.
    NotClubMember,

    /// Assigned a role above the actor's own.
    RoleCeiling { actor: ClubRole, assigned: ClubRole },

    /// Acted on a membership above the actor's own.
    RoleHierarchy { actor: ClubRole, target: ClubRole },

    /// The last owner tried to step down or leave.
    SoleOwner,

    /// Setting the approval state requires the `approve_club` capability.
    ApprovalRequired,
}

impl std::fmt::Display for PermissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Authentication credentials were not provided"),
            Self::Forbidden => write!(f, "You do not have permission to perform this action"),
            Self::NotClubMember => write!(f, "You are not a member of this club"),
            Self::RoleCeiling { .. } => {
                write!(f, "You cannot assign a role higher than your own")
            }
            Self::RoleHierarchy { actor, target } => write!(
                f,
                "Cannot modify a {} membership as {}",
                target.label(),
                actor.label()
            ),
            Self::SoleOwner => write!(
                f,
                "A club must keep at least one owner; add another owner first"
            ),
            Self::ApprovalRequired => {
                write!(f, "You do not have permission to approve clubs")
            }
        }
    }
}

impl std::error::Error for PermissionError {}
