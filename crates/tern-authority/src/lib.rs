//! Tern Authority: provisioning and access-scoped queries for Certificate
//! Authorities.
//!
//! Authorities are minted by pluggable issuers. Creation wraps the issuer's
//! root certificate, provisions the roles it hands back, binds default
//! expiration notifications, and commits everything as one unit. Listings
//! are filtered per caller: admins see every authority, everyone else sees
//! the authorities their roles belong to.

pub mod audit;
pub mod config;
pub mod error;
pub mod identity;
pub mod issuer;
pub mod model;
pub mod notifications;
pub mod provision;
pub mod query;
pub mod resolve;
pub mod roles;
pub mod store;

use std::sync::Arc;

pub use config::AuthorityConfig;
pub use error::{AuthorityError, Result};
pub use identity::ActingIdentity;
pub use issuer::{
    IssuedAuthority, IssuerError, IssuerPlugin, IssuerRegistry, IssuerRequest, RoleDescriptor,
};
pub use model::{
    Authority, AuthorityId, Certificate, CertificateId, NotificationPolicy, Role, RoleId,
};
pub use provision::{AuthorityUpdate, CreateAuthority};
pub use query::ListParams;
pub use store::{Page, Store};

use notifications::{IntervalTemplates, NotificationTemplates};
use provision::Provisioner;

/// Domain facade over the store, issuers and notification templates.
///
/// Owns the store, the issuer registry and the notification templates.
/// Every operation takes the acting identity explicitly.
pub struct AuthorityService {
    store: Store,
    issuers: IssuerRegistry,
    templates: Arc<dyn NotificationTemplates>,
    config: AuthorityConfig,
}

impl AuthorityService {
    /// Build a service from configuration. Opens the snapshot-backed store
    /// when `config.store_path` is set.
    pub fn new(config: AuthorityConfig, issuers: IssuerRegistry) -> Result<Self> {
        let store = match &config.store_path {
            Some(path) => Store::open(path)?,
            None => Store::in_memory(),
        };
        let templates: Arc<dyn NotificationTemplates> =
            Arc::new(IntervalTemplates::new(config.notification_intervals.clone()));
        tracing::info!(
            issuers = ?issuers.slugs(),
            persistent = config.store_path.is_some(),
            "Authority service ready"
        );
        Ok(Self {
            store,
            issuers,
            templates,
            config,
        })
    }

    /// Replace the notification template service.
    pub fn with_templates(mut self, templates: Arc<dyn NotificationTemplates>) -> Self {
        self.templates = templates;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Create an authority through the issuer named in `params`.
    ///
    /// On success the authority is linked to `identity`, and any issued role
    /// with the `admin` username is granted to it. On failure nothing is
    /// persisted and `identity` is left untouched.
    pub async fn create(
        &self,
        identity: &mut ActingIdentity,
        params: CreateAuthority,
    ) -> Result<Authority> {
        let provisioner = Provisioner {
            store: &self.store,
            issuers: &self.issuers,
            templates: self.templates.as_ref(),
            security_team_email: &self.config.security_team_email,
            issuer_timeout: self.config.issuer_timeout_duration(),
            audit_log: self.config.audit_log.as_deref(),
        };
        provisioner.create(identity, params).await
    }

    pub fn update(&self, id: AuthorityId, update: AuthorityUpdate) -> Result<Authority> {
        provision::update(&self.store, self.config.audit_log.as_deref(), id, update)
    }

    /// Look up an authority by id.
    ///
    /// Unlike [`render`](Self::render) this does not check the caller's
    /// roles: anyone who knows an id can read the authority.
    pub fn get(&self, id: AuthorityId) -> Result<Authority> {
        self.store
            .authority(id)
            .ok_or_else(|| AuthorityError::NotFound(format!("authority {id}")))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Authority> {
        self.store
            .authority_by_name(name)
            .ok_or_else(|| AuthorityError::NotFound(format!("authority {name}")))
    }

    /// Every authority, unscoped, in creation order.
    pub fn get_all(&self) -> Vec<Authority> {
        self.store.authorities()
    }

    pub fn certificate(&self, id: CertificateId) -> Result<Certificate> {
        self.store
            .certificate(id)
            .ok_or_else(|| AuthorityError::NotFound(format!("certificate {id}")))
    }

    pub fn role(&self, id: RoleId) -> Result<Role> {
        self.store
            .role(id)
            .ok_or_else(|| AuthorityError::NotFound(format!("role {id}")))
    }

    pub fn role_by_name(&self, name: &str) -> Result<Role> {
        self.store
            .role_by_name(name)
            .ok_or_else(|| AuthorityError::NotFound(format!("role {name}")))
    }

    /// The roles attached to an authority, in attachment order.
    pub fn roles_of(&self, authority: &Authority) -> Vec<Role> {
        authority
            .role_ids
            .iter()
            .filter_map(|id| self.store.role(*id))
            .collect()
    }

    /// Filtered, sorted, paginated listing visible to `identity`.
    pub fn render(
        &self,
        identity: &ActingIdentity,
        params: &ListParams,
    ) -> Result<Page<Authority>> {
        query::render(&self.store, identity, params)
    }

    pub fn resolve_role(&self, ca_name: &str, identity: &ActingIdentity) -> Option<Role> {
        resolve::resolve_role(&self.store, ca_name, identity)
    }

    /// Audit log contents; empty when auditing is disabled.
    pub fn read_audit_log(&self) -> Result<String> {
        match &self.config.audit_log {
            Some(path) => Ok(audit::read_log(path)?),
            None => Ok(String::new()),
        }
    }
}

impl std::fmt::Debug for AuthorityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityService")
            .field("store", &self.store)
            .field("issuers", &self.issuers)
            .finish()
    }
}
