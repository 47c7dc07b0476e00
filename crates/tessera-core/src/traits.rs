//! Capability traits for the tessera audit pipeline.
//!
//! These traits are the seams between the engine and its environment:
//!
//! - `Database`           the host data store whose statements are audited
//! - `StatementPolicy`    decides whether a statement is recorded at all
//! - `SqlEventRecorder`   turns an executed statement into a persisted event
//! - `AuditStore`         durable, append-only storage for audit rows
//! - `EncryptionProvider` symmetric encryption of comments at rest
//! - `AuditTransport`     best-effort forwarding to a remote repository
//!
//! `AuditedConnection` wires the first three together. The remaining traits
//! are consumed by the recorder and the query service.

use tessera_contracts::{
    error::AuditResult,
    event::{DisclosureRecord, NewAuditRecord, StoredEvent},
    query::{DisclosureQuery, EventQuery},
    session::SessionContext,
    value::{Row, SqlValue},
};

/// The host database.
///
/// Calls made directly on this trait are NOT audited. Host code goes through
/// `AuditedConnection`; the recorder and policy engine use this trait for
/// their own lookups so they never recurse into auditing.
pub trait Database: Send + Sync {
    /// Execute a data-modifying statement and return the affected row count.
    fn execute(&self, sql: &str, binds: &[SqlValue]) -> AuditResult<u64>;

    /// Run a read and return every row, columns in select order.
    fn query(&self, sql: &str, binds: &[SqlValue]) -> AuditResult<Vec<Row>>;

    /// Run a read and return the first row, if any.
    fn query_row(&self, sql: &str, binds: &[SqlValue]) -> AuditResult<Option<Row>> {
        Ok(self.query(sql, binds)?.into_iter().next())
    }
}

/// Gate evaluated before a statement executes.
///
/// Implementations read only the settings snapshot they were built with plus
/// the cached break-glass status of the session user.
pub trait StatementPolicy: Send + Sync {
    /// Whether this statement should produce an audit event.
    fn should_log(&self, session: &SessionContext, sql: &str) -> bool;
}

/// Builds and persists the audit event for one statement.
pub trait SqlEventRecorder: Send + Sync {
    /// Read the current values of the columns an UPDATE is about to change,
    /// or the existing row a REPLACE with an explicit `id` will overwrite.
    ///
    /// Returns `None` for other statements, for anything that cannot be
    /// parsed, when the event's category is switched off for `session`, and
    /// when the lookup itself fails. Must run before the statement executes.
    fn capture_previous_values(&self, session: &SessionContext, sql: &str, binds: &[SqlValue]) -> Option<Row>;

    /// Record an executed statement. `previous` is the snapshot from
    /// `capture_previous_values`.
    ///
    /// Returns `Ok(())` without writing when the category filter or the
    /// SELECT rules suppress the event. A storage failure is an error.
    fn record_sql_event(
        &self,
        session: &SessionContext,
        sql: &str,
        success: bool,
        binds: &[SqlValue],
        previous: Option<Row>,
    ) -> AuditResult<()>;
}

/// Durable storage for audit rows.
///
/// The log, envelope, and API rows of one event are written atomically by
/// `append`. Nothing here updates or deletes a log row; only disclosure
/// records are mutable.
pub trait AuditStore: Send + Sync {
    /// Persist one event and return the assigned log id.
    fn append(&self, record: &NewAuditRecord) -> AuditResult<i64>;

    /// Read events from the main log family.
    fn fetch_events(&self, query: &EventQuery) -> AuditResult<Vec<StoredEvent>>;

    /// Read records from the disclosure family.
    fn fetch_disclosures(&self, query: &DisclosureQuery) -> AuditResult<Vec<DisclosureRecord>>;

    fn insert_disclosure(&self, record: &DisclosureRecord) -> AuditResult<i64>;

    /// Replace event, date, recipient, and description of the disclosure with
    /// `record.id`.
    fn update_disclosure(&self, record: &DisclosureRecord) -> AuditResult<()>;

    fn delete_disclosure(&self, id: i64) -> AuditResult<()>;

    /// Distinct event names present in the main log.
    fn event_names(&self) -> AuditResult<Vec<String>>;

    /// Whether the disclosure log holds any record.
    fn has_disclosures(&self) -> AuditResult<bool>;

    /// Resolve a patient-portal menu label to its numeric id.
    fn portal_menu_id(&self, menu_name: &str) -> AuditResult<Option<i64>>;
}

/// Symmetric encryption for comments and API payloads.
pub trait EncryptionProvider: Send + Sync {
    /// Encrypt with the current key. The result is ASCII-safe.
    fn encrypt(&self, plaintext: &[u8]) -> AuditResult<String>;

    /// Decrypt a value produced by `encrypt`, by this or an earlier key.
    fn decrypt(&self, ciphertext: &str) -> AuditResult<Vec<u8>>;
}

/// One event as handed to a remote audit repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    pub user: String,
    pub group: String,
    pub event: String,
    /// 0 when the event carries no patient.
    pub patient_id: i64,
    pub success: bool,
    /// Plaintext comment as recorded locally.
    pub comments: String,
}

/// Forwarding to a remote audit repository.
///
/// Delivery is best effort: implementations log failures and return. A
/// transport problem must never fail the statement or the local write.
pub trait AuditTransport: Send + Sync {
    fn send(&self, event: &OutboundEvent);
}

/// A transport that drops everything. Used when no repository is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl AuditTransport for NullTransport {
    fn send(&self, _event: &OutboundEvent) {}
}
