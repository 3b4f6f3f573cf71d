//! Mass invitation planning.
//!
//! Turns a pasted block of addresses into the list of invitations to
//! create. Nothing here touches the database, so the whole decision can be
//! tested in isolation.

use std::collections::HashSet;

use validator::ValidateEmail;

use crate::clubs::ClubError;
use crate::email::InviteTemplate;
use crate::permissions::{check_role_assignment, ClubRole, PermissionError, Principal};

/// Invitations to create for one mass invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitePlan {
    /// Addresses to invite, in the order given.
    pub emails: Vec<String>,
    pub template: InviteTemplate,
}

/// Split a block of addresses on commas and newlines.
///
/// Entries are trimmed, empty entries dropped and repeats removed
/// case-insensitively, keeping the first spelling.
#[must_use]
pub fn parse_emails(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .filter(|email| seen.insert(email.to_lowercase()))
        .map(ToString::to_string)
        .collect()
}

/// Decide which invitations a mass invite produces.
///
/// `existing` holds the lowercased addresses of current members.
pub fn plan_invites(
    raw: &str,
    role: ClubRole,
    principal: &Principal,
    actor_role: Option<ClubRole>,
    existing: &HashSet<String>,
) -> Result<InvitePlan, ClubError> {
    let is_officer = actor_role.is_some_and(|r| r.satisfies(ClubRole::Officer));
    if !principal.is_superuser && !is_officer {
        return Err(if principal.is_authenticated() {
            PermissionError::Forbidden
        } else {
            PermissionError::Unauthenticated
        }
        .into());
    }
    check_role_assignment(principal, actor_role, role)?;

    let emails: Vec<String> = parse_emails(raw)
        .into_iter()
        .filter(|email| !existing.contains(&email.to_lowercase()))
        .collect();

    if let Some(invalid) = emails.iter().find(|email| !email.validate_email()) {
        return Err(ClubError::field(
            "emails",
            format!("Enter a valid email address: \"{invalid}\"."),
        ));
    }

    let template = if role == ClubRole::Owner && actor_role.is_none() {
        InviteTemplate::OwnerInvite
    } else {
        InviteTemplate::Invite
    };

    Ok(InvitePlan { emails, template })
}

/// Summary returned to the caller.
#[must_use]
pub fn sent_message(count: usize) -> String {
    format!("Sent invite(s) to {count} email(s)!")
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn officer() -> (Principal, Option<ClubRole>) {
        (Principal::user(Uuid::now_v7()), Some(ClubRole::Officer))
    }

    fn superuser() -> Principal {
        Principal {
            user_id: Some(Uuid::now_v7()),
            is_superuser: true,
            permissions: Vec::new(),
        }
    }

    #[test]
    fn test_parse_dedupes_and_trims() {
        assert_eq!(
            parse_emails("a@x.com, a@x.com,\nb@x.com"),
            vec!["a@x.com", "b@x.com"]
        );
        assert_eq!(parse_emails(" A@x.com ,a@X.com,, \n"), vec!["A@x.com"]);
        assert!(parse_emails("  ,\n ").is_empty());
    }

    #[test]
    fn test_duplicates_produce_two_invites() {
        let (principal, role) = officer();
        let plan = plan_invites(
            "a@x.com, a@x.com,\nb@x.com",
            ClubRole::Member,
            &principal,
            role,
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(plan.emails.len(), 2);
        assert_eq!(plan.template, InviteTemplate::Invite);
    }

    #[test]
    fn test_existing_members_are_skipped() {
        let (principal, role) = officer();
        let existing: HashSet<String> = ["a@x.com".to_string(), "b@x.com".to_string()].into();
        let plan = plan_invites(
            "a@x.com, a@x.com,\nB@x.com",
            ClubRole::Member,
            &principal,
            role,
            &existing,
        )
        .unwrap();
        assert!(plan.emails.is_empty());
        assert_eq!(sent_message(plan.emails.len()), "Sent invite(s) to 0 email(s)!");
    }

    #[test]
    fn test_invalid_address_fails_whole_batch() {
        let (principal, role) = officer();
        let err = plan_invites(
            "good@x.com, not-an-email",
            ClubRole::Member,
            &principal,
            role,
            &HashSet::new(),
        )
        .unwrap_err();
        match err {
            ClubError::Validation(fields) => assert!(fields.get("emails").is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_members_cannot_invite() {
        let principal = Principal::user(Uuid::now_v7());
        let err = plan_invites("a@x.com", ClubRole::Member, &principal, Some(ClubRole::Member), &HashSet::new())
            .unwrap_err();
        assert!(matches!(err, ClubError::Permission(PermissionError::Forbidden)));

        let err = plan_invites("a@x.com", ClubRole::Member, &Principal::anonymous(), None, &HashSet::new())
            .unwrap_err();
        assert!(matches!(err, ClubError::Permission(PermissionError::Unauthenticated)));
    }

    #[test]
    fn test_officer_cannot_invite_owner() {
        let (principal, role) = officer();
        let err = plan_invites("a@x.com", ClubRole::Owner, &principal, role, &HashSet::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ClubError::Permission(PermissionError::RoleCeiling { .. })
        ));
    }

    #[test]
    fn test_bootstrap_owner_invite_template() {
        let admin = superuser();
        let plan = plan_invites("owner@x.com", ClubRole::Owner, &admin, None, &HashSet::new()).unwrap();
        assert_eq!(plan.template, InviteTemplate::OwnerInvite);

        // A superuser who is also a member sends the ordinary message.
        let plan = plan_invites(
            "owner@x.com",
            ClubRole::Owner,
            &admin,
            Some(ClubRole::Owner),
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(plan.template, InviteTemplate::Invite);
    }
}
