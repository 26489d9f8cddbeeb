//! Turns issuer role descriptors into roles for a new authority.
//!
//! Role names are global. A descriptor naming an existing role reuses it
//! when the credential matches and is rejected otherwise.

use crate::error::{AuthorityError, Result};
use crate::identity::ActingIdentity;
use crate::issuer::RoleDescriptor;
use crate::model::{NewRole, Role, RoleId};
use crate::store::{StagedRole, Store};

/// Username that marks a role as the authority's administrative credential.
pub const ADMIN_USERNAME: &str = "admin";

/// Stage one role. Nothing is written until the provisioning batch commits.
pub fn provision_role(
    store: &Store,
    plugin_name: &str,
    descriptor: &RoleDescriptor,
) -> Result<StagedRole> {
    if descriptor.name.trim().is_empty() {
        return Err(AuthorityError::Validation(format!(
            "issuer {plugin_name} returned a role without a name"
        )));
    }

    match store.role_by_name(&descriptor.name) {
        Some(existing) if credential_matches(&existing, descriptor) => {
            tracing::debug!(role = %existing.name, id = %existing.id, "Reusing existing role");
            Ok(StagedRole::Existing(existing.id))
        }
        Some(existing) => Err(AuthorityError::DuplicateRole(existing.name)),
        None => Ok(StagedRole::New(NewRole {
            name: descriptor.name.clone(),
            username: descriptor.username.clone(),
            secret: descriptor.secret.clone(),
            description: format!("{plugin_name} auto generated role"),
        })),
    }
}

/// Stage every descriptor of an issuer response, in order.
///
/// Repeated names within one response collapse to a single role.
pub fn provision_roles(
    store: &Store,
    plugin_name: &str,
    descriptors: &[RoleDescriptor],
) -> Result<Vec<StagedRole>> {
    let mut seen: Vec<&RoleDescriptor> = Vec::with_capacity(descriptors.len());
    let mut staged = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        if let Some(prev) = seen.iter().find(|d| d.name == descriptor.name) {
            if prev.username != descriptor.username || prev.secret != descriptor.secret {
                return Err(AuthorityError::DuplicateRole(descriptor.name.clone()));
            }
            continue;
        }
        staged.push(provision_role(store, plugin_name, descriptor)?);
        seen.push(descriptor);
    }
    Ok(staged)
}

fn credential_matches(role: &Role, descriptor: &RoleDescriptor) -> bool {
    role.username == descriptor.username && role.secret == descriptor.secret
}

/// Grant the creator every committed role whose username is `admin`, so
/// whoever creates an authority can administer it.
///
/// Only authority creation calls this, after its batch has committed.
pub(crate) fn apply_admin_bootstrap(identity: &mut ActingIdentity, roles: &[Role]) -> Vec<RoleId> {
    let granted: Vec<RoleId> = roles
        .iter()
        .filter(|r| r.username.as_deref() == Some(ADMIN_USERNAME))
        .map(|r| r.id)
        .collect();
    for role in &granted {
        identity.grant_role(*role);
        tracing::info!(identity = %identity.id, role = %role, "Admin role granted to creator");
    }
    granted
}
