//! Loading the audit settings snapshot from TOML.
//!
//! ```toml
//! audit_log_enabled = true
//! audit_events_query = false
//! force_log_breakglass = true
//! encryption_enabled = false
//!
//! [categories]
//! patient-record = true
//! http-request = false
//!
//! [atna]
//! enabled = true
//! host = "audit.example.org"
//! port = 6514
//! ca_cert = "/etc/tessera/ca.pem"
//! ```
//!
//! Every key is optional. A `[categories]` table replaces the default set
//! entirely, so categories it does not list are disabled.

use std::path::Path;

use tessera_contracts::{
    error::{AuditError, AuditResult},
    settings::AuditSettings,
};

/// Parse `s` as an `AuditSettings` TOML document.
///
/// Returns `AuditError::Config` if the TOML is malformed or a key has the
/// wrong type.
pub fn from_toml_str(s: &str) -> AuditResult<AuditSettings> {
    toml::from_str(s).map_err(|e| AuditError::Config {
        reason: format!("failed to parse audit settings TOML: {}", e),
    })
}

/// Read the file at `path` and parse it as audit settings.
pub fn from_file(path: &Path) -> AuditResult<AuditSettings> {
    let contents = std::fs::read_to_string(path).map_err(|e| AuditError::Config {
        reason: format!("failed to read settings file '{}': {}", path.display(), e),
    })?;
    from_toml_str(&contents)
}
