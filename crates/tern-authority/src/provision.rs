//! Authority creation and partial updates.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit;
use crate::error::{AuthorityError, Result};
use crate::identity::ActingIdentity;
use crate::issuer::{IssuedAuthority, IssuerPlugin, IssuerRegistry, IssuerRequest};
use crate::model::{Authority, AuthorityId, NewAuthority, NewCertificate, RoleId};
use crate::notifications::{self, NotificationTemplates};
use crate::roles;
use crate::store::{AuthorityPatch, ProvisionBatch, Store};

/// Parameters for creating an authority.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateAuthority {
    pub ca_name: String,
    pub owner_email: String,
    pub plugin_name: String,
    pub description: String,
    /// Passed through to the issuer untouched.
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl CreateAuthority {
    fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("ca_name", &self.ca_name),
            ("owner_email", &self.owner_email),
            ("plugin_name", &self.plugin_name),
            ("description", &self.description),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthorityError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Changes applied by [`update`].
///
/// `description` and `owner` always overwrite the stored values, so callers
/// wanting to keep them must pass the current ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorityUpdate {
    pub description: String,
    pub owner: String,
    /// `Some(true)` activates. `Some(false)` is currently ignored: there is
    /// no deactivation path through update.
    #[serde(default)]
    pub active: Option<bool>,
    /// A non-empty list replaces the role set; empty or absent keeps it.
    #[serde(default)]
    pub roles: Option<Vec<RoleId>>,
}

/// Collaborators needed to provision an authority.
pub(crate) struct Provisioner<'a> {
    pub store: &'a Store,
    pub issuers: &'a IssuerRegistry,
    pub templates: &'a dyn NotificationTemplates,
    pub security_team_email: &'a str,
    pub issuer_timeout: Duration,
    pub audit_log: Option<&'a Path>,
}

impl Provisioner<'_> {
    /// Create an authority and its root certificate.
    ///
    /// 1. Validate parameters and resolve the issuer
    /// 2. Call the issuer (off the executor, under timeout, no lock held)
    /// 3. Bind default notifications and stage roles
    /// 4. Commit certificate, roles and authority as one unit
    /// 5. Link the authority to the creator and apply admin bootstrap
    pub async fn create(
        &self,
        identity: &mut ActingIdentity,
        params: CreateAuthority,
    ) -> Result<Authority> {
        params.validate()?;
        let plugin = self.issuers.get(&params.plugin_name).ok_or_else(|| {
            AuthorityError::Validation(format!("unknown issuer plugin: {}", params.plugin_name))
        })?;

        let request = IssuerRequest {
            ca_name: params.ca_name.clone(),
            owner_email: params.owner_email.clone(),
            description: params.description.clone(),
            plugin_name: params.plugin_name.clone(),
            creator: identity.id.clone(),
            options: params.options,
        };
        let issued = call_issuer(plugin, request, self.issuer_timeout).await?;
        if issued.roles.is_empty() {
            return Err(AuthorityError::Provisioning(format!(
                "issuer {} returned no roles for {}",
                params.plugin_name, params.ca_name
            )));
        }

        let notifications =
            notifications::bind_default_security(self.templates, self.security_team_email);
        let staged_roles = roles::provision_roles(self.store, &params.plugin_name, &issued.roles)?;

        let batch = ProvisionBatch {
            certificate: NewCertificate {
                body: issued.body.clone(),
                chain: issued.chain.clone(),
                owner: params.owner_email.clone(),
                description: format!(
                    "This is the ROOT certificate for the {} certificate authority",
                    params.ca_name
                ),
                creator: identity.id.clone(),
                notifications,
            },
            authority: NewAuthority {
                name: params.ca_name,
                owner: params.owner_email,
                description: params.description,
                plugin_name: params.plugin_name,
                body: issued.body,
                chain: issued.chain,
            },
            roles: staged_roles,
        };
        let provisioned = self.store.provision(batch)?;
        let authority = provisioned.authority;

        identity.link_authority(authority.id);
        roles::apply_admin_bootstrap(identity, &provisioned.roles);

        let id = authority.id.to_string();
        let role_count = provisioned.roles.len().to_string();
        audit::record(
            self.audit_log,
            "authority_created",
            &[
                ("id", id.as_str()),
                ("name", authority.name.as_str()),
                ("plugin", authority.plugin_name.as_str()),
                ("creator", identity.id.as_str()),
                ("roles", role_count.as_str()),
            ],
        );
        tracing::info!(
            id = %authority.id,
            name = %authority.name,
            plugin = %authority.plugin_name,
            creator = %identity.id,
            "Authority created"
        );
        Ok(authority)
    }
}

/// Run the blocking issuer call on the blocking pool, bounded by `timeout`.
async fn call_issuer(
    plugin: Arc<dyn IssuerPlugin>,
    request: IssuerRequest,
    timeout: Duration,
) -> Result<IssuedAuthority> {
    let slug = plugin.slug().to_string();
    let task = tokio::task::spawn_blocking(move || plugin.create_authority(&request));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(join_error)) => Err(AuthorityError::Internal(format!(
            "issuer {slug} task failed: {join_error}"
        ))),
        Err(_) => {
            tracing::warn!(
                slug = %slug,
                timeout_ms = timeout.as_millis() as u64,
                "Issuer timed out"
            );
            Err(AuthorityError::Provisioning(format!(
                "issuer {slug} timed out after {}ms",
                timeout.as_millis()
            )))
        }
    }
}

/// Apply a partial update to an authority.
pub(crate) fn update(
    store: &Store,
    audit_log: Option<&Path>,
    id: AuthorityId,
    update: AuthorityUpdate,
) -> Result<Authority> {
    let active = match update.active {
        Some(true) => Some(true),
        Some(false) => {
            tracing::warn!(id = %id, "Deactivation through update is not supported; ignored");
            None
        }
        None => None,
    };
    let roles = update.roles.filter(|roles| !roles.is_empty());

    let authority = store.update_authority(
        id,
        AuthorityPatch {
            description: Some(update.description),
            owner: Some(update.owner),
            active,
            roles,
        },
    )?;

    let id_text = authority.id.to_string();
    audit::record(
        audit_log,
        "authority_updated",
        &[
            ("id", id_text.as_str()),
            ("name", authority.name.as_str()),
            ("owner", authority.owner.as_str()),
        ],
    );
    tracing::info!(id = %authority.id, name = %authority.name, "Authority updated");
    Ok(authority)
}
