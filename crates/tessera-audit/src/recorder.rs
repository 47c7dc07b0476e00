//! The event recorder.
//!
//! Two entry points share one write path (`record_log_item`):
//!
//! - SQL events arrive through `SqlEventRecorder::record_sql_event` from an
//!   `AuditedConnection` and carry a structured (version 5) payload.
//! - Generic events (`new_event`, `audit_setting_changed`,
//!   `log_http_request`) carry a free-text (version 4) comment.
//!
//! Write order is fixed: seal comment, checksum over plaintext, append log +
//! envelope + API row in one transaction, then hand the event to the
//! transport. The transport never sees an event that failed to persist.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Timelike};
use tracing::{debug, info};

use tessera_contracts::{
    comment::{CommentPayload, StatementKind, PLAIN_COMMENT_VERSION, STRUCTURED_COMMENT_VERSION},
    error::{AuditError, AuditResult},
    event::{ApiDetail, ApiPayload, LogEntry, NewAuditRecord, SourceContext, DEFAULT_LOG_FROM},
    session::SessionContext,
    value::{FieldMap, FieldValue, Row, SqlValue},
};
use tessera_core::traits::{
    AuditStore, AuditTransport, Database, EncryptionProvider, NullTransport, OutboundEvent,
    SqlEventRecorder,
};
use tessera_policy::{event_category, taxonomy::OTHER_EVENT, AuditPolicy};
use tessera_sql::{
    apply_binds, classify, fields_from_row, mark_binary_fields, parse_insert, parse_set_clause,
    parse_update, statement_kind, ParseConfidence,
};

use crate::{checksum, codec::CommentCodec};

/// `log_from` value that routes menu labels through the portal menu table.
pub const PATIENT_PORTAL: &str = "patient-portal";

/// `log_from` value for HTTP request events.
pub const HTTP_REQUEST: &str = "http-request";

/// Comment of a log item before it is sealed.
#[derive(Debug, Clone, PartialEq)]
pub enum EventComment {
    Text(String),
    Structured(CommentPayload),
}

impl EventComment {
    fn version(&self) -> u8 {
        match self {
            EventComment::Text(_) => PLAIN_COMMENT_VERSION,
            EventComment::Structured(_) => STRUCTURED_COMMENT_VERSION,
        }
    }

    fn plaintext(&self) -> AuditResult<String> {
        match self {
            EventComment::Text(s) => Ok(s.clone()),
            EventComment::Structured(payload) => {
                serde_json::to_string(payload).map_err(|e| AuditError::Persistence {
                    reason: format!("failed to serialize comment payload: {e}"),
                })
            }
        }
    }
}

/// One event handed to `record_log_item`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogItem {
    pub success: bool,
    pub event: String,
    pub user: String,
    pub group: String,
    pub comment: EventComment,
    pub patient_id: Option<i64>,
    pub category: Option<String>,
    pub source: SourceContext,
    pub user_notes: String,
    pub cert_user: String,
    /// Plaintext API detail; sealed before storage.
    pub api: Option<ApiDetail>,
}

impl LogItem {
    pub fn new(event: impl Into<String>, user: impl Into<String>, group: impl Into<String>, success: bool) -> Self {
        Self {
            success,
            event: event.into(),
            user: user.into(),
            group: group.into(),
            comment: EventComment::Text(String::new()),
            patient_id: None,
            category: None,
            source: SourceContext::default(),
            user_notes: String::new(),
            cert_user: String::new(),
            api: None,
        }
    }

    pub fn with_text(mut self, comment: impl Into<String>) -> Self {
        self.comment = EventComment::Text(comment.into());
        self
    }

    pub fn with_payload(mut self, payload: CommentPayload) -> Self {
        self.comment = EventComment::Structured(payload);
        self
    }

    pub fn with_patient(mut self, patient_id: Option<i64>) -> Self {
        self.patient_id = patient_id;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_api(mut self, api: ApiDetail) -> Self {
        self.api = Some(api);
        self
    }
}

/// A non-SQL event from application code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericEvent {
    pub event: String,
    pub user: String,
    pub group: String,
    pub success: bool,
    pub comments: String,
    pub patient_id: Option<i64>,
    pub log_from: String,
    /// Patient-portal menu label, resolved to an id for portal events.
    pub menu_item: Option<String>,
    pub ccda_doc_id: Option<i64>,
}

impl GenericEvent {
    pub fn new(event: impl Into<String>, user: impl Into<String>, group: impl Into<String>, success: bool) -> Self {
        Self {
            event: event.into(),
            user: user.into(),
            group: group.into(),
            success,
            comments: String::new(),
            patient_id: None,
            log_from: DEFAULT_LOG_FROM.to_string(),
            menu_item: None,
            ccda_doc_id: None,
        }
    }
}

/// Current local time truncated to whole seconds, the stored resolution.
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Records SQL and generic events into an `AuditStore`.
pub struct AuditRecorder {
    policy: Arc<AuditPolicy>,
    db: Arc<dyn Database>,
    store: Arc<dyn AuditStore>,
    codec: CommentCodec,
    transport: Arc<dyn AuditTransport>,
}

impl AuditRecorder {
    /// A recorder without encryption provider or transport.
    ///
    /// With `encryption_enabled` set in the policy settings and no provider
    /// attached, every write fails with `AuditError::Encryption`.
    pub fn new(policy: Arc<AuditPolicy>, db: Arc<dyn Database>, store: Arc<dyn AuditStore>) -> Self {
        let encrypt = policy.settings().encryption_enabled;
        Self {
            policy,
            db,
            store,
            codec: CommentCodec::new(encrypt, None),
            transport: Arc::new(NullTransport),
        }
    }

    pub fn with_encryption(mut self, provider: Arc<dyn EncryptionProvider>) -> Self {
        self.codec = CommentCodec::new(self.policy.settings().encryption_enabled, Some(provider));
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn AuditTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    pub fn codec(&self) -> &CommentCodec {
        &self.codec
    }

    /// Persist one event and forward it to the transport.
    ///
    /// # Errors
    ///
    /// `AuditError::Encryption` when sealing fails, `AuditError::Persistence`
    /// when the store rejects the write. Transport problems are never
    /// reported.
    pub fn record_log_item(&self, item: LogItem) -> AuditResult<i64> {
        let plaintext = item.comment.plaintext()?;
        let version = item.comment.version();
        let stored_comments = self.codec.seal_comment(&plaintext)?;

        let entry = LogEntry {
            id: None,
            timestamp: now(),
            event: item.event,
            category: item.category,
            user: item.user,
            group: item.group,
            comments: stored_comments,
            user_notes: item.user_notes,
            patient_id: item.patient_id,
            success: item.success,
            cert_user: item.cert_user,
            source: item.source,
        };
        let checksum = checksum::log_checksum(&entry, &plaintext);

        let api = match item.api {
            Some(plain) => {
                let stored = ApiDetail {
                    request_url: self.codec.seal_field(&plain.request_url)?,
                    request_body: self.codec.seal_field(&plain.request_body)?,
                    response: self.codec.seal_field(&plain.response)?,
                    ..plain.clone()
                };
                Some(ApiPayload { plaintext: plain, stored })
            }
            None => None,
        };

        let record = NewAuditRecord {
            entry,
            encrypted: self.codec.encrypts(),
            version,
            checksum,
            api,
        };
        let log_id = self.store.append(&record)?;
        info!(
            log_id,
            event = %record.entry.event,
            user = %record.entry.user,
            success = record.entry.success,
            "audit event recorded"
        );

        self.transport.send(&OutboundEvent {
            user: record.entry.user.clone(),
            group: record.entry.group.clone(),
            event: record.entry.event.clone(),
            patient_id: record.entry.patient_id.unwrap_or(0),
            success: record.entry.success,
            comments: plaintext,
        });

        Ok(log_id)
    }

    /// Record an application event.
    ///
    /// A bare `delete` event takes its category from the comment text.
    /// Portal events are categorised `Patient Portal` and carry the id of
    /// their menu item.
    pub fn new_event(&self, event: &GenericEvent) -> AuditResult<i64> {
        let mut category = if event.event == "delete" {
            event_category(&event.comments, "delete", "")
        } else {
            event.event.clone()
        };

        let mut source = SourceContext {
            log_from: event.log_from.clone(),
            menu_item_id: None,
            ccda_doc_id: event.ccda_doc_id,
        };
        if event.log_from == PATIENT_PORTAL {
            category = "Patient Portal".to_string();
            source.menu_item_id = match &event.menu_item {
                Some(name) => self.store.portal_menu_id(name)?,
                None => None,
            };
        }

        let mut item = LogItem::new(&event.event, &event.user, &event.group, event.success)
            .with_text(&event.comments)
            .with_patient(event.patient_id)
            .with_category(category);
        item.source = source;
        self.record_log_item(item)
    }

    /// Record a change to one of the audit switches themselves.
    pub fn audit_setting_changed(&self, session: &SessionContext, setting: &str, enabled: bool) -> AuditResult<i64> {
        let label = match setting {
            "audit_log_enabled" | "enable_auditlog" => "Audit Logging",
            "force_log_breakglass" | "gbl_force_log_breakglass" => "Force Breakglass Logging",
            other => other,
        };
        let state = if enabled { "Enabled." } else { "Disabled." };
        let item = LogItem::new("security-administration-insert", &session.user, &session.group, true)
            .with_text(format!("{label} {state}"));
        self.record_log_item(item)
    }

    /// Record an inbound HTTP request.
    ///
    /// Returns `Ok(None)` when audit logging or the `http-request` category
    /// is switched off.
    pub fn log_http_request(
        &self,
        session: &SessionContext,
        method: &str,
        path: &str,
        query: Option<&str>,
    ) -> AuditResult<Option<i64>> {
        let settings = self.policy.settings();
        if !settings.audit_log_enabled || !settings.category_enabled(HTTP_REQUEST) {
            return Ok(None);
        }

        let action = match method.to_ascii_uppercase().as_str() {
            "POST" | "PUT" | "PATCH" => "update",
            "DELETE" => "delete",
            _ => "select",
        };
        let mut comments = path.to_string();
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            comments.push('?');
            comments.push_str(q);
        }

        let mut event = GenericEvent::new(format!("{HTTP_REQUEST}-{action}"), &session.user, &session.group, true);
        event.comments = comments;
        event.patient_id = session.patient_id;
        event.log_from = HTTP_REQUEST.to_string();
        self.new_event(&event).map(Some)
    }

    // ── Previous-value capture ───────────────────────────────────────────────

    /// Whether a write to `table` would pass the category filter for `user`.
    /// Checked before any previous-value read so a suppressed event costs no
    /// extra query.
    fn write_recorded(&self, table: &str, raw_query: &str, user: &str) -> bool {
        let class = self.policy.categorize(table, raw_query);
        let allowed = self.policy.event_allowed(&class.event, user);
        if !allowed {
            debug!(event = %class.event, user, "category disabled, previous values not read");
        }
        allowed
    }

    fn previous_update_values(&self, user: &str, sql: &str, binds: &[SqlValue]) -> Option<Row> {
        let parts = parse_update(sql)?;
        let columns = parts.changed_columns();
        if columns.is_empty() || !self.write_recorded(&parts.table, &apply_binds(sql, binds), user) {
            return None;
        }
        let where_count = parts.where_placeholder_count();
        if binds.len() < where_count {
            debug!(table = %parts.table, "fewer binds than WHERE placeholders");
            return None;
        }
        let where_binds = &binds[binds.len() - where_count..];

        let column_list = columns
            .iter()
            .map(|c| format!("`{c}`"))
            .collect::<Vec<_>>()
            .join(", ");
        let select = format!("SELECT {column_list} FROM `{}` WHERE {}", parts.table, parts.where_clause);

        match self.db.query_row(&select, where_binds) {
            Ok(row) => row,
            Err(e) => {
                debug!(table = %parts.table, error = %e, "previous value lookup failed");
                None
            }
        }
    }

    fn existing_replaced_row(&self, user: &str, sql: &str, binds: &[SqlValue]) -> Option<Row> {
        let raw_query = apply_binds(sql, binds);
        let image = parse_insert(&raw_query);
        if !image.is_replace || image.table.is_empty() || !self.write_recorded(&image.table, &raw_query, user) {
            return None;
        }
        let id = match image.primary_key()? {
            FieldValue::Text(s) => match s.trim().parse::<i64>() {
                Ok(n) => SqlValue::Integer(n),
                Err(_) => SqlValue::Text(s.clone()),
            },
            _ => return None,
        };
        let select = format!("SELECT * FROM `{}` WHERE id = ?", image.table);
        match self.db.query_row(&select, &[id]) {
            Ok(row) => row,
            Err(e) => {
                debug!(table = %image.table, error = %e, "existing row lookup failed");
                None
            }
        }
    }
}

/// `before` keyed exactly like `after`, taking values from `previous` and
/// an empty string for columns it lacks.
fn before_image(after: &FieldMap, previous: &Row) -> FieldMap {
    let previous = fields_from_row(previous);
    after
        .keys()
        .map(|k| {
            let value = previous.get(k).cloned().unwrap_or_else(|| FieldValue::text(""));
            (k.clone(), value)
        })
        .collect()
}

/// Build the structured payload for an executed statement.
fn build_payload(sql: &str, raw_query: &str, success: bool, binds: &[SqlValue], previous: Option<&Row>) -> CommentPayload {
    let kind = statement_kind(sql);
    let classification = classify(raw_query);
    let mut payload = CommentPayload::new(kind, success, raw_query);
    payload.table = classification.table;

    match kind {
        StatementKind::Update => {
            if let Some(parts) = parse_update(raw_query) {
                payload.where_clause = Some(parts.where_clause.clone());
                if let (Some(prev), ParseConfidence::Full) = (previous, classification.confidence) {
                    let mut after = parse_set_clause(&parts.set_clause);
                    mark_binary_fields(&mut after);
                    payload.before = Some(before_image(&after, prev));
                    payload.after = Some(after);
                }
            }
        }
        StatementKind::Insert | StatementKind::Replace => {
            let mut image = parse_insert(raw_query);
            if image.confidence == ParseConfidence::Full {
                mark_binary_fields(&mut image.after);
                let before = match previous {
                    Some(prev) if image.is_replace => before_image(&image.after, prev),
                    _ => image.before,
                };
                payload.before = Some(before);
                payload.after = Some(image.after);
            }
        }
        StatementKind::Select | StatementKind::Delete => {}
    }

    if !binds.is_empty() {
        payload.bind_parameters = Some(binds.to_vec());
    }
    payload
}

impl SqlEventRecorder for AuditRecorder {
    fn capture_previous_values(&self, session: &SessionContext, sql: &str, binds: &[SqlValue]) -> Option<Row> {
        let sql = sql.trim();
        match statement_kind(sql) {
            StatementKind::Update => self.previous_update_values(&session.user, sql, binds),
            StatementKind::Replace => self.existing_replaced_row(&session.user, sql, binds),
            _ => None,
        }
    }

    fn record_sql_event(
        &self,
        session: &SessionContext,
        sql: &str,
        success: bool,
        binds: &[SqlValue],
        previous: Option<Row>,
    ) -> AuditResult<()> {
        let sql = sql.trim();
        let user = session.user.as_str();
        let kind = statement_kind(sql);

        if kind == StatementKind::Select && !self.policy.select_allowed(user) {
            debug!(user, "select logging disabled");
            return Ok(());
        }

        let raw_query = apply_binds(sql, binds);
        let payload = build_payload(sql, &raw_query, success, binds, previous.as_ref());
        let class = self.policy.categorize(&payload.table, &raw_query);

        if kind == StatementKind::Select && class.event == OTHER_EVENT {
            debug!(table = %payload.table, "select on unmapped table not logged");
            return Ok(());
        }
        if !self.policy.event_allowed(&class.event, user) {
            debug!(event = %class.event, user, "event category disabled");
            return Ok(());
        }

        let patient_id = if class.event == "patient-record" {
            session.patient_id
        } else {
            None
        };

        let mut item = LogItem::new(format!("{}-{kind}", class.event), user, &session.group, success)
            .with_payload(payload)
            .with_patient(patient_id)
            .with_category(class.category);
        item.cert_user = session.cert_user.clone();
        self.record_log_item(item).map(|_| ())
    }
}
