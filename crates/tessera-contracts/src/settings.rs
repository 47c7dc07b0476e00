//! Immutable configuration snapshot.
//!
//! A settings value is built once (usually from TOML, see
//! `tessera_policy::settings`) and handed to the policy engine, recorder, and
//! transport at construction. Nothing reads configuration ambiently; a reload
//! means constructing new components from a new snapshot.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Event categories enabled out of the box.
pub const DEFAULT_ENABLED_CATEGORIES: [&str; 8] = [
    "patient-record",
    "order",
    "security-administration",
    "scheduling",
    "lab-order",
    "lab-results",
    "backup",
    "other",
];

/// Audit policy switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Master switch. When off, only break-glass users under
    /// `force_log_breakglass` are still recorded.
    pub audit_log_enabled: bool,

    /// Record SELECT statements against mapped tables.
    pub audit_events_query: bool,

    /// Record every statement issued by a break-glass user.
    pub force_log_breakglass: bool,

    /// Encrypt comments and API payloads at rest.
    pub encryption_enabled: bool,

    /// Per-category enable flags keyed by event prefix
    /// (`patient-record`, `http-request`, ...). Missing keys are disabled.
    pub categories: BTreeMap<String, bool>,

    /// Remote audit repository.
    pub atna: AtnaSettings,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            audit_log_enabled: true,
            audit_events_query: false,
            force_log_breakglass: false,
            encryption_enabled: false,
            categories: DEFAULT_ENABLED_CATEGORIES
                .iter()
                .map(|c| ((*c).to_string(), true))
                .collect(),
            atna: AtnaSettings::default(),
        }
    }
}

impl AuditSettings {
    /// Whether events of `category` (an event prefix) are enabled.
    pub fn category_enabled(&self, category: &str) -> bool {
        self.categories.get(category).copied().unwrap_or(false)
    }

    /// Return a copy with `category` switched on or off.
    pub fn with_category(mut self, category: &str, enabled: bool) -> Self {
        self.categories.insert(category.to_string(), enabled);
        self
    }
}

/// Remote ATNA audit repository settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtnaSettings {
    pub enabled: bool,
    /// Repository host; empty means no repository is configured.
    pub host: String,
    pub port: u16,
    /// PEM file holding the client certificate chain and its private key.
    pub local_cert: Option<PathBuf>,
    /// PEM file of trusted CA certificates. When absent the server
    /// certificate is NOT verified.
    pub ca_cert: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// Local node name for the syslog header and source participant;
    /// defaults to the machine hostname.
    pub server_name: Option<String>,
    /// Local node network address for the source participant.
    pub server_addr: String,
}

impl Default for AtnaSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: 6514,
            local_cert: None,
            ca_cert: None,
            connect_timeout_secs: 60,
            server_name: None,
            server_addr: String::new(),
        }
    }
}

impl AtnaSettings {
    /// True only when forwarding is switched on and a host is configured.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.host.trim().is_empty()
    }
}
