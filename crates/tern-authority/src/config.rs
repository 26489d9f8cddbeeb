use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tern_common::{paths, persist};

/// Notification intervals (days before expiry) used when none are configured.
pub const DEFAULT_NOTIFICATION_INTERVALS: [u32; 3] = [30, 15, 2];

/// Upper bound on a single issuer plugin call.
pub const DEFAULT_ISSUER_TIMEOUT_MS: u64 = 120_000;

const STORE_FILENAME: &str = "authorities.json";
const AUDIT_FILENAME: &str = "authority-audit.log";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Recipient of the default expiration notifications on every root
    /// certificate.
    pub security_team_email: String,
    pub notification_intervals: Vec<u32>,
    pub issuer_timeout_ms: u64,
    /// JSON snapshot the store is written to after every commit.
    /// `None` keeps the store purely in memory.
    pub store_path: Option<PathBuf>,
    /// Append-only audit log. `None` disables auditing.
    pub audit_log: Option<PathBuf>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            security_team_email: String::new(),
            notification_intervals: DEFAULT_NOTIFICATION_INTERVALS.to_vec(),
            issuer_timeout_ms: DEFAULT_ISSUER_TIMEOUT_MS,
            store_path: None,
            audit_log: None,
        }
    }
}

impl AuthorityConfig {
    /// Load from a JSON file; missing file or missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let config: Self = persist::read_json_or_default(path)?;
        tracing::debug!(path = %path.display(), "Authority config loaded");
        Ok(config)
    }

    /// Config with store snapshot and audit log under the Tern data directory.
    pub fn persistent() -> Self {
        Self {
            store_path: Some(paths::tern_state_dir().join(STORE_FILENAME)),
            audit_log: Some(paths::tern_log_dir().join(AUDIT_FILENAME)),
            ..Self::default()
        }
    }

    pub fn security_team_email(mut self, email: impl Into<String>) -> Self {
        self.security_team_email = email.into();
        self
    }

    pub fn notification_intervals(mut self, intervals: impl Into<Vec<u32>>) -> Self {
        self.notification_intervals = intervals.into();
        self
    }

    pub fn issuer_timeout(mut self, timeout: Duration) -> Self {
        self.issuer_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn audit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log = Some(path.into());
        self
    }

    pub fn issuer_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.issuer_timeout_ms)
    }
}
