//! Which role an identity acts under for a named authority.

use crate::identity::ActingIdentity;
use crate::model::Role;
use crate::store::Store;

/// Resolve the role `identity` holds for the authority named `ca_name`.
///
/// Admins get the first role in the authority's role set. That is whatever
/// order the roles were attached in, not necessarily an administrative
/// role; callers must not read meaning into which role comes back when an
/// authority has several.
///
/// Non-admins get the first held role, in grant order, that the authority
/// lists in its role set.
pub fn resolve_role(store: &Store, ca_name: &str, identity: &ActingIdentity) -> Option<Role> {
    let authority = store.authority_by_name(ca_name)?;
    if identity.is_admin {
        let first = authority.role_ids.first()?;
        return store.role(*first);
    }

    identity
        .roles
        .iter()
        .find(|id| authority.role_ids.contains(id))
        .and_then(|id| store.role(*id))
}
