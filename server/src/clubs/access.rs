//! Per-request club access.
//!
//! Loads a club by code together with the caller's standing in it, so
//! handlers can authorize with a single call.

use sqlx::PgPool;
use uuid::Uuid;

use super::error::ClubError;
use crate::auth::Viewer;
use crate::db::{find_club_by_code, Club};
use crate::permissions::{
    authorize, get_club_role, AccessContext, Action, ClubContext, ClubRole, Principal, Resource,
};

/// A club and what the caller holds in it.
#[derive(Debug, Clone)]
pub struct ClubAccess {
    pub club: Club,
    pub principal: Principal,
    pub role: Option<ClubRole>,
}

impl ClubAccess {
    /// Load a club the caller may see. Invisible clubs are reported as missing.
    pub async fn load(pool: &PgPool, code: &str, viewer: &Viewer) -> Result<Self, ClubError> {
        let access = Self::load_unchecked(pool, code, viewer).await?;
        access
            .authorize(Resource::Club, Action::Read)
            .map_err(|_| ClubError::NotFound("Club"))?;
        Ok(access)
    }

    /// Load a club without checking that the caller may see it.
    pub async fn load_unchecked(pool: &PgPool, code: &str, viewer: &Viewer) -> Result<Self, ClubError> {
        let club = find_club_by_code(pool, code)
            .await?
            .ok_or(ClubError::NotFound("Club"))?;
        let role = match viewer.user_id() {
            Some(user_id) => get_club_role(pool, club.id, user_id).await?,
            None => None,
        };
        Ok(Self {
            club,
            principal: viewer.principal(),
            role,
        })
    }

    #[must_use]
    pub fn context(&self) -> AccessContext<'_> {
        AccessContext::new(&self.principal).with_club(ClubContext {
            approved: self.club.approved,
            role: self.role,
        })
    }

    pub fn authorize(&self, resource: Resource, action: Action) -> Result<(), ClubError> {
        Ok(authorize(resource, action, &self.context())?)
    }

    /// Authorize an action on a record owned by `target`.
    pub fn authorize_target(
        &self,
        resource: Resource,
        action: Action,
        target: Uuid,
    ) -> Result<(), ClubError> {
        Ok(authorize(resource, action, &self.context().with_target(target))?)
    }

    #[must_use]
    pub const fn is_superuser(&self) -> bool {
        self.principal.is_superuser
    }
}
