//! The caller on whose behalf an operation runs.
//!
//! Authentication happens elsewhere; this crate only consumes the resolved
//! identity and, during authority creation, records the new authority and
//! any bootstrap role grants on it.

use serde::{Deserialize, Serialize};

use crate::model::{AuthorityId, RoleId};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActingIdentity {
    /// Stable identifier, typically an email address.
    pub id: String,
    pub is_admin: bool,
    /// Held roles in grant order.
    #[serde(default)]
    pub roles: Vec<RoleId>,
    /// Authorities this identity created or was otherwise linked to.
    #[serde(default)]
    pub authorities: Vec<AuthorityId>,
}

impl ActingIdentity {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: true,
            ..Self::default()
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        for role in roles {
            self.grant_role(role);
        }
        self
    }

    pub fn holds_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }

    pub(crate) fn grant_role(&mut self, role: RoleId) {
        if !self.holds_role(role) {
            self.roles.push(role);
        }
    }

    pub(crate) fn link_authority(&mut self, authority: AuthorityId) {
        if !self.authorities.contains(&authority) {
            self.authorities.push(authority);
        }
    }
}
