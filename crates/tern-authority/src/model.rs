//! Persisted entities: authorities, their root certificates, and roles.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Store-assigned identifier of an [`Authority`].
    AuthorityId
);
entity_id!(
    /// Store-assigned identifier of a [`Certificate`].
    CertificateId
);
entity_id!(
    /// Store-assigned identifier of a [`Role`].
    RoleId
);

/// A Certificate Authority known to Tern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Authority {
    pub id: AuthorityId,
    pub name: String,
    pub owner: String,
    pub description: String,
    pub plugin_name: String,
    pub active: bool,
    pub certificate_id: CertificateId,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chain: Option<String>,
    /// Ordered; the first entry is what admin role resolution returns.
    pub role_ids: Vec<RoleId>,
    pub created_at: DateTime<Utc>,
}

/// Root certificate issued for an authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Certificate {
    pub id: CertificateId,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chain: Option<String>,
    pub owner: String,
    pub description: String,
    /// Identifier of the acting identity that provisioned it.
    pub creator: String,
    #[serde(default)]
    pub notifications: Vec<NotificationPolicy>,
    pub created_at: DateTime<Utc>,
}

/// Named credential grant. Names are unique across the whole store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub secret: Option<String>,
    pub description: String,
    /// Authority whose role set currently contains this role.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub authority_id: Option<AuthorityId>,
}

/// Expiration notification bound to a certificate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPolicy {
    pub label: String,
    pub category: String,
    pub recipient: String,
    /// Days before expiry at which the notification fires.
    pub interval_days: u32,
    pub active: bool,
}

/// Role that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub description: String,
}

/// Certificate that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCertificate {
    pub body: String,
    pub chain: Option<String>,
    pub owner: String,
    pub description: String,
    pub creator: String,
    pub notifications: Vec<NotificationPolicy>,
}

/// Authority fields known before commit; the certificate and role
/// references are resolved by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuthority {
    pub name: String,
    pub owner: String,
    pub description: String,
    pub plugin_name: String,
    pub body: String,
    pub chain: Option<String>,
}
