//! Table store for authorities, certificates and roles.
//!
//! All tables live behind one mutex. Writes are applied to a copy of the
//! tables, checked against the unique constraints (authority name, role
//! name), written to the snapshot file when one is configured, and only
//! then swapped in. A failed write therefore leaves nothing behind.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tern_common::persist;

use crate::error::{AuthorityError, Result};
use crate::model::{
    Authority, AuthorityId, Certificate, CertificateId, NewAuthority, NewCertificate, NewRole,
    Role, RoleId,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    authorities: Vec<Authority>,
    #[serde(default)]
    certificates: Vec<Certificate>,
    #[serde(default)]
    roles: Vec<Role>,
    #[serde(default)]
    last_authority_id: u64,
    #[serde(default)]
    last_certificate_id: u64,
    #[serde(default)]
    last_role_id: u64,
}

impl Tables {
    fn authority(&self, id: AuthorityId) -> Option<&Authority> {
        self.authorities.iter().find(|a| a.id == id)
    }

    fn authority_mut(&mut self, id: AuthorityId) -> Option<&mut Authority> {
        self.authorities.iter_mut().find(|a| a.id == id)
    }

    fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    fn insert_role(&mut self, new: NewRole) -> RoleId {
        self.last_role_id += 1;
        let id = RoleId(self.last_role_id);
        self.roles.push(Role {
            id,
            name: new.name,
            username: new.username,
            secret: new.secret,
            description: new.description,
            authority_id: None,
        });
        id
    }

    /// Resolve a staged role to an id, creating it when the name is free.
    fn claim_role(&mut self, staged: StagedRole) -> Result<RoleId> {
        match staged {
            StagedRole::Existing(id) => self
                .role(id)
                .map(|r| r.id)
                .ok_or_else(|| AuthorityError::NotFound(format!("role {id}"))),
            StagedRole::New(new) => match self.role_by_name(&new.name) {
                // Another writer created the same role between staging and
                // commit; the credential decides whether it is ours to reuse.
                Some(existing)
                    if existing.username == new.username && existing.secret == new.secret =>
                {
                    Ok(existing.id)
                }
                Some(_) => Err(AuthorityError::DuplicateRole(new.name)),
                None => Ok(self.insert_role(new)),
            },
        }
    }

    /// Point the back-reference of every role in `roles` at `authority`.
    /// A `released` role still pointing there moves to another authority
    /// that lists it, or to `None` when no authority does.
    fn bind_roles(&mut self, authority: AuthorityId, roles: &[RoleId], released: &[RoleId]) {
        let authorities = &self.authorities;
        for role in self.roles.iter_mut() {
            if roles.contains(&role.id) {
                role.authority_id = Some(authority);
            } else if released.contains(&role.id) && role.authority_id == Some(authority) {
                role.authority_id = authorities
                    .iter()
                    .rev()
                    .find(|a| a.id != authority && a.role_ids.contains(&role.id))
                    .map(|a| a.id);
            }
        }
    }
}

/// A role referenced by a provisioning batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedRole {
    Existing(RoleId),
    New(NewRole),
}

/// Everything written when an authority is created, committed as one unit.
#[derive(Debug, Clone)]
pub struct ProvisionBatch {
    pub certificate: NewCertificate,
    pub authority: NewAuthority,
    pub roles: Vec<StagedRole>,
}

/// Rows produced by a committed [`ProvisionBatch`].
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub authority: Authority,
    pub certificate: Certificate,
    pub roles: Vec<Role>,
}

/// Field-level changes to an authority. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityPatch {
    pub description: Option<String>,
    pub owner: Option<String>,
    pub active: Option<bool>,
    pub roles: Option<Vec<RoleId>>,
}

/// Authority columns that can be filtered and sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityField {
    Id,
    Name,
    Owner,
    Description,
    PluginName,
    Active,
    CreatedAt,
}

impl AuthorityField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "owner" => Some(Self::Owner),
            "description" => Some(Self::Description),
            "plugin_name" | "pluginName" | "plugin" => Some(Self::PluginName),
            "active" => Some(Self::Active),
            "created_at" | "createdAt" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    fn text(self, authority: &Authority) -> String {
        match self {
            Self::Id => authority.id.to_string(),
            Self::Name => authority.name.clone(),
            Self::Owner => authority.owner.clone(),
            Self::Description => authority.description.clone(),
            Self::PluginName => authority.plugin_name.clone(),
            Self::Active => authority.active.to_string(),
            Self::CreatedAt => authority.created_at.to_rfc3339(),
        }
    }

    fn compare(self, a: &Authority, b: &Authority) -> std::cmp::Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Active => a.active.cmp(&b.active),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            _ => self.text(a).cmp(&self.text(b)),
        }
    }
}

/// Row predicate applied before visibility and pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFilter {
    /// Literal comparison of the active flag's text form (`"true"`/`"false"`).
    ActiveEquals(String),
    /// Case-insensitive substring match on a column's text form.
    Contains { field: AuthorityField, needle: String },
}

impl FieldFilter {
    fn matches(&self, authority: &Authority) -> bool {
        match self {
            Self::ActiveEquals(value) => authority.active.to_string() == *value,
            Self::Contains { field, needle } => field
                .text(authority)
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityQuery {
    pub filter: Option<FieldFilter>,
    /// Restrict results to these ids. `None` means no restriction.
    pub within: Option<BTreeSet<AuthorityId>>,
    pub sort: Option<(AuthorityField, SortDirection)>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

/// One page of results plus the number of rows matching before paging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// The persistence boundary for this crate.
pub struct Store {
    tables: Mutex<Tables>,
    path: Option<PathBuf>,
}

impl Store {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            path: None,
        }
    }

    /// Open a snapshot-backed store, starting empty if the file is missing.
    pub fn open(path: &Path) -> Result<Self> {
        let tables: Tables = persist::read_json_or_default(path)?;
        tracing::debug!(
            path = %path.display(),
            authorities = tables.authorities.len(),
            "Store snapshot loaded"
        );
        Ok(Self {
            tables: Mutex::new(tables),
            path: Some(path.to_path_buf()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `write` to a copy of the tables and swap it in on success.
    ///
    /// File-backed stores write the snapshot while holding the lock, on the
    /// calling thread. Async callers of a file-backed store block their
    /// worker for the length of that write.
    fn commit<T>(&self, write: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut tables = self.lock();
        let mut next = tables.clone();
        let out = write(&mut next)?;
        if let Some(path) = &self.path {
            persist::write_json_atomic(path, &next)?;
            tracing::debug!(path = %path.display(), "Store snapshot written");
        }
        *tables = next;
        Ok(out)
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn authority(&self, id: AuthorityId) -> Option<Authority> {
        self.lock().authority(id).cloned()
    }

    pub fn authority_by_name(&self, name: &str) -> Option<Authority> {
        self.lock().authorities.iter().find(|a| a.name == name).cloned()
    }

    /// Every authority in insertion order.
    pub fn authorities(&self) -> Vec<Authority> {
        self.lock().authorities.clone()
    }

    pub fn certificate(&self, id: CertificateId) -> Option<Certificate> {
        self.lock().certificates.iter().find(|c| c.id == id).cloned()
    }

    pub fn certificate_count(&self) -> usize {
        self.lock().certificates.len()
    }

    pub fn role(&self, id: RoleId) -> Option<Role> {
        self.lock().role(id).cloned()
    }

    pub fn role_by_name(&self, name: &str) -> Option<Role> {
        self.lock().role_by_name(name).cloned()
    }

    pub fn role_count(&self) -> usize {
        self.lock().roles.len()
    }

    /// Authorities whose role set shares at least one role with `roles`.
    pub fn authorities_for_roles(&self, roles: &[RoleId]) -> BTreeSet<AuthorityId> {
        self.lock()
            .authorities
            .iter()
            .filter(|a| a.role_ids.iter().any(|r| roles.contains(r)))
            .map(|a| a.id)
            .collect()
    }

    pub fn query_authorities(&self, query: &AuthorityQuery) -> Page<Authority> {
        let tables = self.lock();
        let mut rows: Vec<&Authority> = tables
            .authorities
            .iter()
            .filter(|a| query.filter.as_ref().map_or(true, |f| f.matches(a)))
            .filter(|a| query.within.as_ref().map_or(true, |ids| ids.contains(&a.id)))
            .collect();

        if let Some((field, direction)) = query.sort {
            rows.sort_by(|a, b| {
                let ord = field.compare(a, b);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let total = rows.len();
        let skip = query.page.saturating_sub(1).saturating_mul(query.page_size);
        let items = rows
            .into_iter()
            .skip(skip)
            .take(query.page_size)
            .cloned()
            .collect();
        Page { items, total }
    }

    // ── Writes ────────────────────────────────────────────────────────

    /// Commit a certificate, its authority and the authority's roles.
    ///
    /// New roles get ids first, then the certificate, then the authority
    /// that references both.
    pub fn provision(&self, batch: ProvisionBatch) -> Result<Provisioned> {
        self.commit(|tables| {
            let name = batch.authority.name.clone();
            if tables.authorities.iter().any(|a| a.name == name) {
                return Err(AuthorityError::DuplicateName(name));
            }

            let mut role_ids = Vec::with_capacity(batch.roles.len());
            for staged in batch.roles {
                let id = tables.claim_role(staged)?;
                if !role_ids.contains(&id) {
                    role_ids.push(id);
                }
            }

            let now = Utc::now();
            tables.last_certificate_id += 1;
            let certificate = Certificate {
                id: CertificateId(tables.last_certificate_id),
                body: batch.certificate.body,
                chain: batch.certificate.chain,
                owner: batch.certificate.owner,
                description: batch.certificate.description,
                creator: batch.certificate.creator,
                notifications: batch.certificate.notifications,
                created_at: now,
            };
            tables.certificates.push(certificate.clone());

            tables.last_authority_id += 1;
            let authority = Authority {
                id: AuthorityId(tables.last_authority_id),
                name: batch.authority.name,
                owner: batch.authority.owner,
                description: batch.authority.description,
                plugin_name: batch.authority.plugin_name,
                active: true,
                certificate_id: certificate.id,
                body: batch.authority.body,
                chain: batch.authority.chain,
                role_ids: role_ids.clone(),
                created_at: now,
            };
            tables.authorities.push(authority.clone());
            tables.bind_roles(authority.id, &role_ids, &[]);

            let roles = role_ids
                .iter()
                .filter_map(|id| tables.role(*id).cloned())
                .collect();
            Ok(Provisioned {
                authority,
                certificate,
                roles,
            })
        })
    }

    /// Apply a patch. A role list replaces the authority's roles wholesale;
    /// repeated ids keep their first position.
    pub fn update_authority(&self, id: AuthorityId, patch: AuthorityPatch) -> Result<Authority> {
        self.commit(|tables| {
            if let Some(roles) = &patch.roles {
                if let Some(missing) = roles.iter().find(|r| tables.role(**r).is_none()) {
                    return Err(AuthorityError::NotFound(format!("role {missing}")));
                }
            }

            let authority = tables
                .authority_mut(id)
                .ok_or_else(|| AuthorityError::NotFound(format!("authority {id}")))?;
            if let Some(description) = patch.description {
                authority.description = description;
            }
            if let Some(owner) = patch.owner {
                authority.owner = owner;
            }
            if let Some(active) = patch.active {
                authority.active = active;
            }
            let mut rebind = None;
            if let Some(requested) = patch.roles {
                let mut roles = Vec::with_capacity(requested.len());
                for role in requested {
                    if !roles.contains(&role) {
                        roles.push(role);
                    }
                }
                let released = std::mem::replace(&mut authority.role_ids, roles.clone());
                rebind = Some((roles, released));
            }
            let updated = authority.clone();

            if let Some((roles, released)) = rebind {
                tables.bind_roles(id, &roles, &released);
            }
            Ok(updated)
        })
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_role(name: &str, username: &str) -> StagedRole {
        StagedRole::New(NewRole {
            name: name.to_string(),
            username: Some(username.to_string()),
            secret: Some(format!("{name}-secret")),
            description: "test role".to_string(),
        })
    }

    fn batch(name: &str, roles: Vec<StagedRole>) -> ProvisionBatch {
        ProvisionBatch {
            certificate: NewCertificate {
                body: format!("{name}-body"),
                chain: None,
                owner: "owner@example.com".to_string(),
                description: format!("root for {name}"),
                creator: "creator@example.com".to_string(),
                notifications: Vec::new(),
            },
            authority: NewAuthority {
                name: name.to_string(),
                owner: "owner@example.com".to_string(),
                description: format!("{name} authority"),
                plugin_name: "test-issuer".to_string(),
                body: format!("{name}-body"),
                chain: None,
            },
            roles,
        }
    }

    #[test]
    fn provision_links_certificate_and_roles() {
        let store = Store::in_memory();
        let out = store
            .provision(batch("alpha", vec![new_role("alpha_admin", "admin")]))
            .unwrap();

        assert_eq!(out.authority.certificate_id, out.certificate.id);
        assert_eq!(out.roles.len(), 1);
        assert_eq!(out.roles[0].authority_id, Some(out.authority.id));
        assert!(out.authority.active);
        assert!(store.certificate(out.certificate.id).is_some());
    }

    #[test]
    fn duplicate_name_leaves_no_trace() {
        let store = Store::in_memory();
        store
            .provision(batch("alpha", vec![new_role("alpha_admin", "admin")]))
            .unwrap();

        let err = store
            .provision(batch("alpha", vec![new_role("alpha_operator", "operator")]))
            .unwrap_err();
        assert!(matches!(err, AuthorityError::DuplicateName(ref n) if n == "alpha"));
        assert_eq!(store.certificate_count(), 1);
        assert_eq!(store.role_count(), 1);
        assert!(store.role_by_name("alpha_operator").is_none());
    }

    #[test]
    fn conflicting_role_credential_rolls_back() {
        let store = Store::in_memory();
        store
            .provision(batch("alpha", vec![new_role("shared", "admin")]))
            .unwrap();

        let err = store
            .provision(batch("beta", vec![new_role("shared", "operator")]))
            .unwrap_err();
        assert!(matches!(err, AuthorityError::DuplicateRole(ref n) if n == "shared"));
        assert!(store.authority_by_name("beta").is_none());
        assert_eq!(store.certificate_count(), 1);
    }

    #[test]
    fn matching_role_created_concurrently_is_reused() {
        let store = Store::in_memory();
        let first = store
            .provision(batch("alpha", vec![new_role("shared", "admin")]))
            .unwrap();
        let second = store
            .provision(batch("beta", vec![new_role("shared", "admin")]))
            .unwrap();

        assert_eq!(first.roles[0].id, second.roles[0].id);
        assert_eq!(store.role_count(), 1);
        // back-reference follows the most recent claim
        assert_eq!(
            store.role(first.roles[0].id).unwrap().authority_id,
            Some(second.authority.id)
        );
    }

    #[test]
    fn update_replaces_roles_and_releases_old_back_references() {
        let store = Store::in_memory();
        let alpha = store
            .provision(batch("alpha", vec![new_role("alpha_admin", "admin")]))
            .unwrap();
        let beta = store
            .provision(batch("beta", vec![new_role("beta_admin", "admin")]))
            .unwrap();
        let old = alpha.roles[0].id;
        let new = beta.roles[0].id;

        let updated = store
            .update_authority(
                alpha.authority.id,
                AuthorityPatch {
                    roles: Some(vec![new]),
                    ..AuthorityPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.role_ids, vec![new]);
        assert_eq!(store.role(old).unwrap().authority_id, None);
        assert_eq!(store.role(new).unwrap().authority_id, Some(alpha.authority.id));
    }

    #[test]
    fn update_collapses_repeated_role_ids() {
        let store = Store::in_memory();
        let alpha = store
            .provision(batch(
                "alpha",
                vec![new_role("alpha_admin", "admin"), new_role("alpha_ops", "ops")],
            ))
            .unwrap();
        let admin = alpha.roles[0].id;
        let ops = alpha.roles[1].id;

        let updated = store
            .update_authority(
                alpha.authority.id,
                AuthorityPatch {
                    roles: Some(vec![ops, admin, ops]),
                    ..AuthorityPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.role_ids, vec![ops, admin]);
    }

    #[test]
    fn shared_role_keeps_every_listing_authority_visible() {
        let store = Store::in_memory();
        let alpha = store
            .provision(batch(
                "alpha",
                vec![new_role("alpha_admin", "admin"), new_role("fleet_ops", "ops")],
            ))
            .unwrap();
        let shared = alpha.roles[1].id;
        let beta = store
            .provision(batch(
                "beta",
                vec![
                    new_role("beta_admin", "admin"),
                    StagedRole::Existing(shared),
                ],
            ))
            .unwrap();
        let both = BTreeSet::from([alpha.authority.id, beta.authority.id]);
        assert_eq!(store.authorities_for_roles(&[shared]), both);

        store
            .update_authority(
                beta.authority.id,
                AuthorityPatch {
                    roles: Some(vec![beta.roles[0].id]),
                    ..AuthorityPatch::default()
                },
            )
            .unwrap();

        assert_eq!(
            store.authorities_for_roles(&[shared]),
            BTreeSet::from([alpha.authority.id])
        );
        // released by beta, still listed by alpha
        assert_eq!(
            store.role(shared).unwrap().authority_id,
            Some(alpha.authority.id)
        );
    }

    #[test]
    fn update_with_unknown_role_changes_nothing() {
        let store = Store::in_memory();
        let alpha = store
            .provision(batch("alpha", vec![new_role("alpha_admin", "admin")]))
            .unwrap();

        let err = store
            .update_authority(
                alpha.authority.id,
                AuthorityPatch {
                    description: Some("changed".into()),
                    roles: Some(vec![RoleId(99)]),
                    ..AuthorityPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, AuthorityError::NotFound(_)));
        assert_eq!(
            store.authority(alpha.authority.id).unwrap().description,
            "alpha authority"
        );
    }

    #[test]
    fn query_filters_sorts_and_pages() {
        let store = Store::in_memory();
        for name in ["charlie", "alpha", "bravo"] {
            store
                .provision(batch(name, vec![new_role(&format!("{name}_admin"), "admin")]))
                .unwrap();
        }

        let page = store.query_authorities(&AuthorityQuery {
            filter: Some(FieldFilter::Contains {
                field: AuthorityField::Name,
                needle: "A".into(),
            }),
            within: None,
            sort: Some((AuthorityField::Name, SortDirection::Asc)),
            page: 1,
            page_size: 2,
        });
        assert_eq!(page.total, 3);
        let names: Vec<&str> = page.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "bravo"]);

        let second = store.query_authorities(&AuthorityQuery {
            filter: None,
            within: None,
            sort: None,
            page: 2,
            page_size: 2,
        });
        assert_eq!(second.total, 3);
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].name, "bravo");
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("tern-store-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("authorities.json");

        let store = Store::open(&path).unwrap();
        store
            .provision(batch("alpha", vec![new_role("alpha_admin", "admin")]))
            .unwrap();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        let alpha = reopened.authority_by_name("alpha").unwrap();
        assert_eq!(alpha.role_ids.len(), 1);
        // id counters continue where the snapshot left off
        let beta = reopened
            .provision(batch("beta", vec![new_role("beta_admin", "admin")]))
            .unwrap();
        assert!(beta.authority.id > alpha.id);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
