//! Authorization rules.
//!
//! A [`Rule`] is a small boolean expression over the facts known about a
//! request: who is asking, what they hold in the club being touched, and
//! whose record is targeted. Policies are built by combining rules with
//! [`Rule::or`] and [`Rule::and`] and evaluated against an [`AccessContext`].

use uuid::Uuid;

use super::role::ClubRole;
use super::system::SystemPermission;

/// The identity making a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    /// `None` for unauthenticated requests.
    pub user_id: Option<Uuid>,
    pub is_superuser: bool,
    pub permissions: Vec<SystemPermission>,
}

impl Principal {
    /// An unauthenticated visitor.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated user with no special capabilities.
    #[must_use]
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Whether the principal holds an organization-wide capability.
    ///
    /// Superusers hold every capability.
    #[must_use]
    pub fn has(&self, permission: SystemPermission) -> bool {
        self.is_superuser || self.permissions.contains(&permission)
    }
}

/// What the principal holds in the club being accessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClubContext {
    /// Approval state: `None` pending, `Some(true)` approved, `Some(false)` rejected.
    pub approved: Option<bool>,
    /// The principal's role, `None` without a membership.
    pub role: Option<ClubRole>,
}

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct AccessContext<'a> {
    pub principal: &'a Principal,
    pub club: Option<ClubContext>,
    /// Owner of the record being acted on (membership, request, ...).
    pub target_user: Option<Uuid>,
}

impl<'a> AccessContext<'a> {
    #[must_use]
    pub const fn new(principal: &'a Principal) -> Self {
        Self {
            principal,
            club: None,
            target_user: None,
        }
    }

    #[must_use]
    pub const fn with_club(mut self, club: ClubContext) -> Self {
        self.club = Some(club);
        self
    }

    #[must_use]
    pub const fn with_target(mut self, user_id: Uuid) -> Self {
        self.target_user = Some(user_id);
        self
    }

    const fn role(&self) -> Option<ClubRole> {
        match self.club {
            Some(club) => club.role,
            None => None,
        }
    }
}

/// A boolean authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Always passes.
    Allow,
    /// The request carries a valid identity.
    Authenticated,
    /// The principal is a superuser.
    Superuser,
    /// The principal holds an organization-wide capability.
    System(SystemPermission),
    /// The club has been approved.
    ClubApproved,
    /// The principal holds any membership in the club.
    ClubMember,
    /// The principal's club role is at least this privileged.
    RoleAtLeast(ClubRole),
    /// The targeted record belongs to the principal.
    SelfTarget,
    /// Passes if any inner rule passes. Empty never passes.
    Any(Vec<Rule>),
    /// Passes if every inner rule passes. Empty always passes.
    All(Vec<Rule>),
}

impl Rule {
    #[must_use]
    pub const fn any(rules: Vec<Self>) -> Self {
        Self::Any(rules)
    }

    #[must_use]
    pub const fn all(rules: Vec<Self>) -> Self {
        Self::All(rules)
    }

    /// Combine with logical OR, flattening nested `Any`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Any(mut rules) => {
                rules.push(other);
                Self::Any(rules)
            }
            rule => Self::Any(vec![rule, other]),
        }
    }

    /// Combine with logical AND, flattening nested `All`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::All(mut rules) => {
                rules.push(other);
                Self::All(rules)
            }
            rule => Self::All(vec![rule, other]),
        }
    }

    /// Evaluate the rule.
    #[must_use]
    pub fn evaluate(&self, ctx: &AccessContext<'_>) -> bool {
        match self {
            Self::Allow => true,
            Self::Authenticated => ctx.principal.is_authenticated(),
            Self::Superuser => ctx.principal.is_superuser,
            Self::System(permission) => ctx.principal.has(*permission),
            Self::ClubApproved => ctx.club.is_some_and(|c| c.approved == Some(true)),
            Self::ClubMember => ctx.role().is_some(),
            Self::RoleAtLeast(required) => ctx.role().is_some_and(|r| r.satisfies(*required)),
            Self::SelfTarget => match (ctx.principal.user_id, ctx.target_user) {
                (Some(me), Some(target)) => me == target,
                _ => false,
            },
            Self::Any(rules) => rules.iter().any(|r| r.evaluate(ctx)),
            Self::All(rules) => rules.iter().all(|r| r.evaluate(ctx)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_ctx(principal: &Principal, role: Option<ClubRole>) -> AccessContext<'_> {
        AccessContext::new(principal).with_club(ClubContext {
            approved: Some(true),
            role,
        })
    }

    #[test]
    fn test_role_at_least_follows_hierarchy() {
        let principal = Principal::user(Uuid::now_v7());
        let rule = Rule::RoleAtLeast(ClubRole::Officer);

        assert!(rule.evaluate(&member_ctx(&principal, Some(ClubRole::Owner))));
        assert!(rule.evaluate(&member_ctx(&principal, Some(ClubRole::Officer))));
        assert!(!rule.evaluate(&member_ctx(&principal, Some(ClubRole::Member))));
        assert!(!rule.evaluate(&member_ctx(&principal, None)));
    }

    #[test]
    fn test_role_rule_monotonic_over_all_roles() {
        let principal = Principal::user(Uuid::now_v7());
        for required in ClubRole::ALL {
            let rule = Rule::RoleAtLeast(required);
            for held in ClubRole::ALL {
                let allowed = rule.evaluate(&member_ctx(&principal, Some(held)));
                for stronger in ClubRole::ALL.iter().filter(|r| **r <= held) {
                    if allowed {
                        assert!(rule.evaluate(&member_ctx(&principal, Some(*stronger))));
                    }
                }
            }
        }
    }

    #[test]
    fn test_or_flattens_and_short_circuits() {
        let rule = Rule::RoleAtLeast(ClubRole::Officer)
            .or(Rule::SelfTarget)
            .or(Rule::Superuser);
        assert!(matches!(&rule, Rule::Any(rules) if rules.len() == 3));

        let me = Uuid::now_v7();
        let principal = Principal::user(me);
        let ctx = member_ctx(&principal, Some(ClubRole::Member)).with_target(me);
        assert!(rule.evaluate(&ctx));

        let ctx = member_ctx(&principal, Some(ClubRole::Member)).with_target(Uuid::now_v7());
        assert!(!rule.evaluate(&ctx));
    }

    #[test]
    fn test_and_requires_every_rule() {
        let rule = Rule::Authenticated.and(Rule::ClubMember);
        let principal = Principal::user(Uuid::now_v7());

        assert!(rule.evaluate(&member_ctx(&principal, Some(ClubRole::Member))));
        assert!(!rule.evaluate(&member_ctx(&principal, None)));

        let anonymous = Principal::anonymous();
        assert!(!rule.evaluate(&member_ctx(&anonymous, Some(ClubRole::Member))));
    }

    #[test]
    fn test_empty_combinators() {
        let principal = Principal::anonymous();
        let ctx = AccessContext::new(&principal);
        assert!(!Rule::any(vec![]).evaluate(&ctx));
        assert!(Rule::all(vec![]).evaluate(&ctx));
    }

    #[test]
    fn test_superuser_holds_every_capability() {
        let principal = Principal {
            user_id: Some(Uuid::now_v7()),
            is_superuser: true,
            permissions: vec![],
        };
        for perm in SystemPermission::all() {
            assert!(principal.has(*perm));
        }
    }

    #[test]
    fn test_club_approved_requires_true() {
        let principal = Principal::anonymous();
        for (approved, expected) in [(Some(true), true), (Some(false), false), (None, false)] {
            let ctx = AccessContext::new(&principal).with_club(ClubContext {
                approved,
                role: None,
            });
            assert_eq!(Rule::ClubApproved.evaluate(&ctx), expected);
        }
    }
}
