//! # tessera-policy
//!
//! Decides which statements are audited and how they are classified.
//!
//! ## Overview
//!
//! [`AuditPolicy`] implements the
//! [`StatementPolicy`](tessera_core::traits::StatementPolicy) trait from an
//! immutable [`AuditSettings`](tessera_contracts::settings::AuditSettings)
//! snapshot. Settings are loaded from TOML with [`settings::from_toml_str`] or
//! [`settings::from_file`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::{path::Path, sync::Arc};
//! use tessera_policy::{settings, AuditPolicy};
//!
//! let snapshot = Arc::new(settings::from_file(Path::new("audit.toml"))?);
//! let policy = AuditPolicy::new(snapshot, db.clone());
//! ```

pub mod breakglass;
pub mod engine;
pub mod settings;
pub mod taxonomy;

pub use breakglass::BreakglassCache;
pub use engine::AuditPolicy;
pub use taxonomy::{categorize, event_category, event_for_table, EventClass};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tessera_contracts::{
        error::{AuditError, AuditResult},
        session::SessionContext,
        settings::AuditSettings,
        value::{Row, SqlValue},
    };
    use tessera_core::traits::{Database, StatementPolicy};

    use crate::{settings, AuditPolicy, BreakglassCache};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// A group directory that answers the breakglass lookup from a fixed
    /// member list and counts lookups.
    struct MockDirectory {
        members: Vec<String>,
        lookups: Arc<Mutex<u32>>,
        fail: bool,
    }

    impl MockDirectory {
        fn new(members: &[&str]) -> Self {
            Self {
                members: members.iter().map(|s| s.to_string()).collect(),
                lookups: Arc::new(Mutex::new(0)),
                fail: false,
            }
        }
    }

    impl Database for MockDirectory {
        fn execute(&self, _sql: &str, _binds: &[SqlValue]) -> AuditResult<u64> {
            Ok(0)
        }

        fn query(&self, _sql: &str, binds: &[SqlValue]) -> AuditResult<Vec<Row>> {
            *self.lookups.lock().unwrap() += 1;
            if self.fail {
                return Err(AuditError::Database { reason: "no such table: gacl_aro".to_string() });
            }
            let user = match binds.first() {
                Some(SqlValue::Text(u)) => u.clone(),
                _ => return Ok(vec![]),
            };
            if self.members.contains(&user) {
                let mut row = Row::new();
                row.insert("value".to_string(), SqlValue::Text(user));
                Ok(vec![row])
            } else {
                Ok(vec![])
            }
        }
    }

    fn policy(settings: AuditSettings, members: &[&str]) -> AuditPolicy {
        AuditPolicy::new(Arc::new(settings), Arc::new(MockDirectory::new(members)))
    }

    fn session(user: &str) -> SessionContext {
        SessionContext::new(user, "Default")
    }

    // ── 1. settings loading ───────────────────────────────────────────────────

    #[test]
    fn toml_settings_parse_with_defaults() {
        let toml = r#"
            audit_events_query = true
            force_log_breakglass = true

            [categories]
            patient-record = true
            http-request = true

            [atna]
            enabled = true
            host = "audit.example.org"
        "#;
        let s = settings::from_toml_str(toml).unwrap();
        assert!(s.audit_log_enabled);
        assert!(s.audit_events_query);
        assert!(s.category_enabled("http-request"));
        assert!(!s.category_enabled("order"), "an explicit table replaces the defaults");
        assert_eq!(s.atna.port, 6514);
        assert_eq!(s.atna.connect_timeout_secs, 60);
        assert!(s.atna.is_active());
    }

    #[test]
    fn empty_toml_is_default_settings() {
        assert_eq!(settings::from_toml_str("").unwrap(), AuditSettings::default());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = settings::from_toml_str("audit_log_enabled = \"yes\"").unwrap_err();
        match err {
            AuditError::Config { reason } => assert!(reason.contains("failed to parse audit settings TOML")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn missing_settings_file_is_config_error() {
        let err = settings::from_file(std::path::Path::new("/nonexistent/audit.toml")).unwrap_err();
        assert!(matches!(err, AuditError::Config { .. }));
    }

    // ── 2. should_log ─────────────────────────────────────────────────────────

    #[test]
    fn ordinary_statements_are_logged() {
        let p = policy(AuditSettings::default(), &[]);
        assert!(p.should_log(&session("admin"), "UPDATE patient_data SET fname='Jane' WHERE id=42"));
    }

    #[test]
    fn recursion_guard_skips_audit_tables() {
        let p = policy(AuditSettings::default(), &["er-doc"]);
        let s = session("admin");
        assert!(!p.should_log(&s, "INSERT INTO log (event) VALUES ('x')"));
        assert!(!p.should_log(&s, "insert into `log` set event='x'"));
        assert!(!p.should_log(&s, "SELECT * FROM log WHERE id = 1"));
        assert!(!p.should_log(&s, "SELECT * FROM `log` WHERE id = 1"));
        assert!(!p.should_log(&s, "UPDATE sequences SET id = 5"));
        // "sequences" is matched case-sensitively.
        assert!(p.should_log(&s, "UPDATE SEQUENCES SET id = 5"));

        let forced = AuditSettings { force_log_breakglass: true, ..AuditSettings::default() };
        let p = policy(forced, &["er-doc"]);
        assert!(!p.should_log(&session("er-doc"), "INSERT INTO log (event) VALUES ('x')"));
    }

    #[test]
    fn disabled_logging_only_admits_forced_breakglass() {
        let off = AuditSettings { audit_log_enabled: false, ..AuditSettings::default() };
        let p = policy(off.clone(), &["er-doc"]);
        assert!(!p.should_log(&session("admin"), "DELETE FROM lists WHERE id=7"));
        assert!(!p.should_log(&session("er-doc"), "DELETE FROM lists WHERE id=7"));

        let forced = AuditSettings { force_log_breakglass: true, ..off };
        let p = policy(forced, &["er-doc"]);
        assert!(!p.should_log(&session("admin"), "DELETE FROM lists WHERE id=7"));
        assert!(p.should_log(&session("er-doc"), "DELETE FROM lists WHERE id=7"));
    }

    // ── 3. select / category gating ───────────────────────────────────────────

    #[test]
    fn selects_need_query_flag_or_forced_breakglass() {
        let p = policy(AuditSettings::default(), &["er-doc"]);
        assert!(!p.select_allowed("admin"));
        assert!(!p.select_allowed("er-doc"));

        let forced = AuditSettings { force_log_breakglass: true, ..AuditSettings::default() };
        let p = policy(forced, &["er-doc"]);
        assert!(!p.select_allowed("admin"));
        assert!(p.select_allowed("er-doc"));

        let queries = AuditSettings { audit_events_query: true, ..AuditSettings::default() };
        assert!(policy(queries, &[]).select_allowed("admin"));
    }

    #[test]
    fn disabled_category_is_overridden_only_by_forced_breakglass() {
        let s = AuditSettings::default().with_category("order", false);
        let p = policy(s.clone(), &["er-doc"]);
        assert!(!p.event_allowed("order", "er-doc"));
        assert!(p.event_allowed("patient-record", "admin"));

        let p = policy(AuditSettings { force_log_breakglass: true, ..s }, &["er-doc"]);
        assert!(p.event_allowed("order", "er-doc"));
        assert!(!p.event_allowed("order", "admin"));
    }

    // ── 4. break-glass cache ──────────────────────────────────────────────────

    #[test]
    fn breakglass_lookup_is_memoized_per_user() {
        let dir = Arc::new(MockDirectory::new(&["er-doc"]));
        let lookups = dir.lookups.clone();
        let cache = BreakglassCache::new(dir);

        assert!(cache.is_breakglass("er-doc"));
        assert!(cache.is_breakglass("er-doc"));
        assert_eq!(*lookups.lock().unwrap(), 1);

        assert!(!cache.is_breakglass("admin"));
        assert_eq!(*lookups.lock().unwrap(), 2);
        assert!(!cache.is_breakglass(""));
        assert_eq!(*lookups.lock().unwrap(), 2, "empty user never hits the database");
    }

    #[test]
    fn failed_lookup_is_not_breakglass_and_not_memoized() {
        let mut dir = MockDirectory::new(&["er-doc"]);
        dir.fail = true;
        let lookups = dir.lookups.clone();
        let cache = BreakglassCache::new(Arc::new(dir));

        assert!(!cache.is_breakglass("er-doc"));
        assert!(!cache.is_breakglass("er-doc"));
        assert_eq!(*lookups.lock().unwrap(), 2);
    }
}
