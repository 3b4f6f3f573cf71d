//! Club role hierarchy.
//!
//! Roles are totally ordered with the most privileged role first:
//! `Owner < Officer < Member`. Comparisons always go through the derived
//! ordering; stored integers only exist at the database and wire boundary.

use serde::{Deserialize, Serialize};

/// A membership's privilege level within a club.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum ClubRole {
    Owner = 1,
    Officer = 2,
    #[default]
    Member = 3,
}

impl ClubRole {
    /// All roles, most privileged first.
    pub const ALL: [Self; 3] = [Self::Owner, Self::Officer, Self::Member];

    /// Whether this role grants at least the privileges of `required`.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self <= required
    }

    /// Human-readable label used in emails and exports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Officer => "Officer",
            Self::Member => "Member",
        }
    }
}

impl From<ClubRole> for i16 {
    fn from(role: ClubRole) -> Self {
        role as Self
    }
}

impl TryFrom<i16> for ClubRole {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Owner),
            2 => Ok(Self::Officer),
            3 => Ok(Self::Member),
            other => Err(format!("invalid club role: {other}")),
        }
    }
}

/// Minimum level required to see a note.
///
/// Extends the role hierarchy with `Public`, the level of anyone without a
/// membership (including unauthenticated viewers).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum Visibility {
    Owner = 1,
    Officer = 2,
    Member = 3,
    Public = 4,
}

impl Visibility {
    /// Level of a viewer holding the given role, or `Public` without one.
    #[must_use]
    pub const fn of(role: Option<ClubRole>) -> Self {
        match role {
            Some(ClubRole::Owner) => Self::Owner,
            Some(ClubRole::Officer) => Self::Officer,
            Some(ClubRole::Member) => Self::Member,
            None => Self::Public,
        }
    }

    /// Whether a viewer at level `viewer` meets this threshold.
    #[must_use]
    pub fn admits(self, viewer: Self) -> bool {
        viewer <= self
    }
}

impl From<Visibility> for i16 {
    fn from(level: Visibility) -> Self {
        level as Self
    }
}

impl TryFrom<i16> for Visibility {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Owner),
            2 => Ok(Self::Officer),
            3 => Ok(Self::Member),
            4 => Ok(Self::Public),
            other => Err(format!("invalid visibility level: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_order_is_owner_first() {
        assert!(ClubRole::Owner < ClubRole::Officer);
        assert!(ClubRole::Officer < ClubRole::Member);
    }

    #[test]
    fn test_satisfies_is_monotonic() {
        // A more privileged role satisfies every requirement a less privileged one does.
        for held in ClubRole::ALL {
            for required in ClubRole::ALL {
                let expected = (held as i16) <= (required as i16);
                assert_eq!(held.satisfies(required), expected, "{held:?} vs {required:?}");
            }
        }
        assert!(ClubRole::Owner.satisfies(ClubRole::Member));
        assert!(!ClubRole::Member.satisfies(ClubRole::Officer));
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_value(ClubRole::Officer).unwrap(), 2);
        let role: ClubRole = serde_json::from_value(serde_json::json!(1)).unwrap();
        assert_eq!(role, ClubRole::Owner);
        assert!(serde_json::from_value::<ClubRole>(serde_json::json!(0)).is_err());
        assert!(serde_json::from_value::<ClubRole>(serde_json::json!(4)).is_err());
    }

    #[test]
    fn test_visibility_of_non_member_is_public() {
        assert_eq!(Visibility::of(None), Visibility::Public);
        assert_eq!(Visibility::of(Some(ClubRole::Officer)), Visibility::Officer);
    }

    #[test]
    fn test_public_threshold_admits_everyone() {
        for viewer in [
            Visibility::Owner,
            Visibility::Officer,
            Visibility::Member,
            Visibility::Public,
        ] {
            assert!(Visibility::Public.admits(viewer));
        }
    }

    #[test]
    fn test_officer_threshold() {
        assert!(Visibility::Officer.admits(Visibility::Owner));
        assert!(Visibility::Officer.admits(Visibility::Officer));
        assert!(!Visibility::Officer.admits(Visibility::Member));
        assert!(!Visibility::Officer.admits(Visibility::Public));
    }
}
