//! Organization-wide capabilities.
//!
//! These are granted per user, independent of any club membership, and
//! gate actions that belong to the platform administration rather than to
//! a single club.

/// Organization-wide capability held by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemPermission {
    /// Approve or reject clubs submitted for review
    ApproveClub,
    /// See clubs that are pending review or rejected
    SeePendingClubs,
}

impl SystemPermission {
    /// Returns the name stored in the `user_permissions` table.
    ///
    /// # Examples
    ///
    /// ```
    /// use clubhub_server::permissions::SystemPermission;
    ///
    /// let perm = SystemPermission::ApproveClub;
    /// assert_eq!(perm.action_name(), "approve_club");
    /// ```
    #[must_use]
    pub const fn action_name(&self) -> &'static str {
        match self {
            Self::ApproveClub => "approve_club",
            Self::SeePendingClubs => "see_pending_clubs",
        }
    }

    /// Parse a stored permission name. Unknown names yield `None`.
    #[must_use]
    pub fn from_action_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.action_name() == name)
    }

    /// Returns all system permissions as a slice.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::ApproveClub, Self::SeePendingClubs]
    }

    /// Returns a human-readable description of the permission.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::ApproveClub => "Approve or reject clubs",
            Self::SeePendingClubs => "View clubs that are not yet approved",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_are_snake_case() {
        for perm in SystemPermission::all() {
            let name = perm.action_name();
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "Action name '{name}' should be snake_case"
            );
        }
    }

    #[test]
    fn test_from_action_name() {
        assert_eq!(
            SystemPermission::from_action_name("approve_club"),
            Some(SystemPermission::ApproveClub)
        );
        assert_eq!(
            SystemPermission::from_action_name("see_pending_clubs"),
            Some(SystemPermission::SeePendingClubs)
        );
        assert_eq!(SystemPermission::from_action_name("delete_everything"), None);
    }

    #[test]
    fn test_descriptions_are_not_empty() {
        for perm in SystemPermission::all() {
            assert!(
                !perm.description().is_empty(),
                "Description for {perm:?} should not be empty"
            );
        }
    }

    #[test]
    fn test_serde_matches_action_name() {
        for perm in SystemPermission::all() {
            let json = serde_json::to_string(perm).unwrap();
            assert_eq!(json, format!("\"{}\"", perm.action_name()));
        }
    }
}
