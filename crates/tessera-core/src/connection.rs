//! The audited connection: every host statement passes through here.
//!
//!   Policy → [capture previous values] → Execute → Record → Result
//!
//! The previous-value snapshot is only taken when the statement will be
//! logged, and it is always taken before the statement runs. A statement that
//! fails on the host database is still recorded, with a failure status,
//! before the database error is handed back to the caller.

use std::sync::Arc;

use tracing::{debug, warn};

use tessera_contracts::{
    error::AuditResult,
    session::SessionContext,
    value::{Row, SqlValue},
};

use crate::traits::{Database, SqlEventRecorder, StatementPolicy};

/// A database handle that audits every statement it executes.
///
/// Build one per host connection. The policy and recorder are shared, so
/// several connections may point at the same audit store.
pub struct AuditedConnection {
    db: Arc<dyn Database>,
    policy: Arc<dyn StatementPolicy>,
    recorder: Arc<dyn SqlEventRecorder>,
}

impl AuditedConnection {
    pub fn new(
        db: Arc<dyn Database>,
        policy: Arc<dyn StatementPolicy>,
        recorder: Arc<dyn SqlEventRecorder>,
    ) -> Self {
        Self { db, policy, recorder }
    }

    /// Execute a data-modifying statement on behalf of `session`.
    ///
    /// # Errors
    ///
    /// Returns the host database error when the statement fails (after the
    /// failure has been recorded), or the audit persistence error when the
    /// event could not be stored. Persistence errors win: an unrecorded
    /// statement is never reported as a plain success.
    pub fn execute(&self, session: &SessionContext, sql: &str, binds: &[SqlValue]) -> AuditResult<u64> {
        self.run(session, sql, binds, |db| db.execute(sql, binds))
    }

    /// Run a read on behalf of `session`. Reads are audited like any other
    /// statement, subject to the SELECT rules of the policy and recorder.
    pub fn query(&self, session: &SessionContext, sql: &str, binds: &[SqlValue]) -> AuditResult<Vec<Row>> {
        self.run(session, sql, binds, |db| db.query(sql, binds))
    }

    /// Execute without producing an audit event.
    ///
    /// For engine-internal statements only; host code must use `execute`.
    pub fn execute_unaudited(&self, sql: &str, binds: &[SqlValue]) -> AuditResult<u64> {
        self.db.execute(sql, binds)
    }

    /// The underlying database, for unaudited reads.
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    fn run<T>(
        &self,
        session: &SessionContext,
        sql: &str,
        binds: &[SqlValue],
        op: impl FnOnce(&dyn Database) -> AuditResult<T>,
    ) -> AuditResult<T> {
        // ── Step 1: Policy gate ──────────────────────────────────────────────
        if !self.policy.should_log(session, sql) {
            debug!(user = %session.user, "statement not audited");
            return op(self.db.as_ref());
        }

        // ── Step 2: Snapshot rows an UPDATE is about to change ───────────────
        let previous = self.recorder.capture_previous_values(session, sql, binds);

        // ── Step 3: Execute on the host database ─────────────────────────────
        let result = op(self.db.as_ref());
        let success = result.is_ok();
        if let Err(err) = &result {
            warn!(user = %session.user, error = %err, "audited statement failed");
        }

        // ── Step 4: Record ───────────────────────────────────────────────────
        self.recorder
            .record_sql_event(session, sql, success, binds, previous)?;

        result
    }
}
