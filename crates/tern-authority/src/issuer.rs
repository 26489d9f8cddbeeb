//! Issuer plugin contract and the registry that resolves plugins by name.
//!
//! Plugins do the actual CA creation (talking to a vendor backend, an HSM,
//! a local signer). Calls may block for a long time, so the provisioner
//! runs them off the async executor and never while holding the store lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AuthorityError;

/// Everything an issuer needs to mint a root certificate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuerRequest {
    pub ca_name: String,
    pub owner_email: String,
    pub description: String,
    pub plugin_name: String,
    /// Identifier of the acting identity creating the authority.
    pub creator: String,
    /// Plugin-specific knobs (common name, validity, key type, ...).
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// A role the issuer wants attached to the new authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub secret: Option<String>,
}

/// Material returned by a successful issuer call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuedAuthority {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chain: Option<String>,
    pub roles: Vec<RoleDescriptor>,
}

#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<IssuerError> for AuthorityError {
    fn from(e: IssuerError) -> Self {
        Self::Provisioning(e.to_string())
    }
}

/// A backend capable of creating certificate authorities.
pub trait IssuerPlugin: Send + Sync {
    /// Registry key, matched against the `plugin_name` of create requests.
    fn slug(&self) -> &str;

    fn create_authority(&self, request: &IssuerRequest) -> Result<IssuedAuthority, IssuerError>;
}

/// Name-keyed set of issuer plugins.
#[derive(Clone, Default)]
pub struct IssuerRegistry {
    plugins: HashMap<String, Arc<dyn IssuerPlugin>>,
}

impl IssuerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under its slug. A later plugin with the same
    /// slug replaces the earlier one.
    pub fn register(&mut self, plugin: Arc<dyn IssuerPlugin>) {
        let slug = plugin.slug().to_string();
        if self.plugins.insert(slug.clone(), plugin).is_some() {
            tracing::warn!(slug = %slug, "Issuer plugin replaced");
        } else {
            tracing::debug!(slug = %slug, "Issuer plugin registered");
        }
    }

    pub fn with(mut self, plugin: Arc<dyn IssuerPlugin>) -> Self {
        self.register(plugin);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IssuerPlugin>> {
        self.plugins.get(name).cloned()
    }

    /// Registered slugs, sorted.
    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.plugins.keys().cloned().collect();
        slugs.sort();
        slugs
    }
}

impl std::fmt::Debug for IssuerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerRegistry")
            .field("plugins", &self.slugs())
            .finish()
    }
}
