//! Note visibility.
//!
//! A note carries two thresholds: one checked against the viewer's level in
//! the club that wrote it, one against the viewer's level in the club it is
//! about. Meeting either is enough.

use std::collections::HashMap;

use uuid::Uuid;

use crate::permissions::{ClubRole, Principal, Visibility};

/// The visibility-relevant part of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteAudience {
    pub creating_club_id: Uuid,
    pub subject_club_id: Uuid,
    pub creating_club_permission: Visibility,
    pub outside_club_permission: Visibility,
}

/// Whether a viewer at `creating_level` in the writing club and
/// `subject_level` in the subject club may see the note.
#[must_use]
pub fn note_visible(
    audience: &NoteAudience,
    creating_level: Visibility,
    subject_level: Visibility,
) -> bool {
    audience.creating_club_permission.admits(creating_level)
        || audience.outside_club_permission.admits(subject_level)
}

/// A viewer's club roles, used to check many notes at once.
#[derive(Debug, Clone, Default)]
pub struct ViewerRoles {
    is_superuser: bool,
    roles: HashMap<Uuid, ClubRole>,
}

impl ViewerRoles {
    #[must_use]
    pub fn new(principal: &Principal, roles: impl IntoIterator<Item = (Uuid, ClubRole)>) -> Self {
        Self {
            is_superuser: principal.is_superuser,
            roles: roles.into_iter().collect(),
        }
    }

    fn level(&self, club_id: Uuid) -> Visibility {
        Visibility::of(self.roles.get(&club_id).copied())
    }

    /// Whether this viewer may see a note. Superusers see everything.
    #[must_use]
    pub fn can_see(&self, audience: &NoteAudience) -> bool {
        self.is_superuser
            || note_visible(
                audience,
                self.level(audience.creating_club_id),
                self.level(audience.subject_club_id),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audience(creating: Visibility, outside: Visibility) -> NoteAudience {
        NoteAudience {
            creating_club_id: Uuid::now_v7(),
            subject_club_id: Uuid::now_v7(),
            creating_club_permission: creating,
            outside_club_permission: outside,
        }
    }

    #[test]
    fn test_officer_threshold_in_creating_club() {
        let note = audience(Visibility::Officer, Visibility::Member);

        // Officer of the writing club, nothing in the subject club.
        assert!(note_visible(&note, Visibility::Officer, Visibility::Public));
        assert!(note_visible(&note, Visibility::Owner, Visibility::Public));
        // Plain member of the writing club.
        assert!(!note_visible(&note, Visibility::Member, Visibility::Public));
    }

    #[test]
    fn test_subject_club_members_see_independently() {
        let note = audience(Visibility::Officer, Visibility::Member);
        assert!(note_visible(&note, Visibility::Public, Visibility::Member));
        assert!(note_visible(&note, Visibility::Public, Visibility::Owner));
        assert!(!note_visible(&note, Visibility::Public, Visibility::Public));
    }

    #[test]
    fn test_public_outside_threshold_shows_everyone() {
        let note = audience(Visibility::Owner, Visibility::Public);
        assert!(note_visible(&note, Visibility::Public, Visibility::Public));
    }

    #[test]
    fn test_viewer_roles() {
        let note = audience(Visibility::Officer, Visibility::Member);
        let user = Principal::user(Uuid::now_v7());

        let outsider = ViewerRoles::new(&user, []);
        assert!(!outsider.can_see(&note));

        let writer = ViewerRoles::new(&user, [(note.creating_club_id, ClubRole::Officer)]);
        assert!(writer.can_see(&note));

        let subject = ViewerRoles::new(&user, [(note.subject_club_id, ClubRole::Member)]);
        assert!(subject.can_see(&note));

        let admin = Principal {
            is_superuser: true,
            ..Principal::anonymous()
        };
        assert!(ViewerRoles::new(&admin, []).can_see(&note));
    }
}
