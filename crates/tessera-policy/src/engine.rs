//! The audit policy engine.
//!
//! `AuditPolicy` holds an immutable `AuditSettings` snapshot and the
//! break-glass cache. It answers three questions:
//!
//! 1. `should_log`: is this statement recorded at all? Checked before the
//!    statement runs.
//! 2. `select_allowed`: may a SELECT be recorded for this user?
//! 3. `event_allowed`: is the resolved event's category switched on?
//!
//! Break-glass users override 1–3 whenever `force_log_breakglass` is set,
//! except for the recursion guard, which always wins.

use std::sync::Arc;

use tracing::debug;

use tessera_contracts::{session::SessionContext, settings::AuditSettings};
use tessera_core::traits::{Database, StatementPolicy};

use crate::{
    breakglass::BreakglassCache,
    taxonomy::{self, EventClass},
};

/// Statement fragments that touch the audit tables themselves, matched
/// case-insensitively.
const RECURSION_MARKERS: [&str; 4] = ["insert into log", "insert into `log`", "from log ", "from `log` "];

/// Matched case-sensitively.
const SEQUENCE_MARKER: &str = "sequences";

/// Settings-driven implementation of `StatementPolicy`.
pub struct AuditPolicy {
    settings: Arc<AuditSettings>,
    breakglass: BreakglassCache,
}

impl AuditPolicy {
    /// Build a policy over `settings`. `db` is used only for the break-glass
    /// membership lookup, which is never audited.
    pub fn new(settings: Arc<AuditSettings>, db: Arc<dyn Database>) -> Self {
        Self {
            settings,
            breakglass: BreakglassCache::new(db),
        }
    }

    pub fn settings(&self) -> &AuditSettings {
        &self.settings
    }

    /// True when `user` is break-glass and forced logging is on.
    pub fn breakglass_forced(&self, user: &str) -> bool {
        self.settings.force_log_breakglass && self.breakglass.is_breakglass(user)
    }

    pub fn is_breakglass_user(&self, user: &str) -> bool {
        self.breakglass.is_breakglass(user)
    }

    /// Whether a SELECT may be recorded for `user`.
    pub fn select_allowed(&self, user: &str) -> bool {
        self.settings.audit_events_query || self.breakglass_forced(user)
    }

    /// Whether events of `event` (e.g. `patient-record`) may be recorded.
    pub fn event_allowed(&self, event: &str, user: &str) -> bool {
        self.settings.category_enabled(event) || self.breakglass_forced(user)
    }

    /// Event and category for a statement against `table`.
    pub fn categorize(&self, table: &str, sql: &str) -> EventClass {
        taxonomy::categorize(table, sql)
    }

    /// True for statements that read or write the audit log itself.
    pub fn is_recursive(sql: &str) -> bool {
        let lower = sql.to_ascii_lowercase();
        RECURSION_MARKERS.iter().any(|m| lower.contains(m)) || sql.contains(SEQUENCE_MARKER)
    }
}

impl StatementPolicy for AuditPolicy {
    fn should_log(&self, session: &SessionContext, sql: &str) -> bool {
        let sql = sql.trim();

        if !self.settings.audit_log_enabled && !self.breakglass_forced(&session.user) {
            debug!(user = %session.user, "audit logging disabled");
            return false;
        }

        if Self::is_recursive(sql) {
            debug!("statement touches audit tables, not logged");
            return false;
        }

        true
    }
}
