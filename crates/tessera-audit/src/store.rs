//! SQLite-backed `AuditStore`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension};
use tracing::debug;

use tessera_contracts::{
    error::{AuditError, AuditResult},
    event::{
        ApiDetail, ApiLogEntry, DisclosureRecord, EncryptionEnvelope, LogEntry, NewAuditRecord,
        SourceContext, StoredEvent, TIMESTAMP_FORMAT,
    },
    query::{DisclosureQuery, EventQuery},
};
use tessera_core::traits::AuditStore;

use crate::{checksum, schema};

fn persistence(context: &str, e: impl std::fmt::Display) -> AuditError {
    AuditError::Persistence {
        reason: format!("{context}: {e}"),
    }
}

fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn encrypt_flag(encrypted: bool) -> &'static str {
    if encrypted {
        "Yes"
    } else {
        "No"
    }
}

const EVENT_COLUMNS: &str = "el.log_id, el.encrypt, el.checksum, el.checksum_api, el.version, \
     l.id, l.date, l.event, l.category, l.user, l.groupname, l.comments, l.user_notes, \
     l.patient_id, l.success, l.crt_user, l.log_from, l.menu_item_id, l.ccda_doc_id, \
     al.log_id, al.user_id, al.patient_id, al.ip_address, al.method, al.request, \
     al.request_url, al.request_body, al.response, al.created_time";

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredEvent> {
    let envelope = EncryptionEnvelope {
        log_id: row.get(0)?,
        encrypted: row.get::<_, String>(1)? == "Yes",
        checksum: row.get(2)?,
        checksum_api: row.get(3)?,
        version: row.get(4)?,
    };

    let entry = match row.get::<_, Option<i64>>(5)? {
        Some(id) => Some(LogEntry {
            id: Some(id),
            timestamp: parse_ts(6, &row.get::<_, String>(6)?)?,
            event: row.get(7)?,
            category: row.get(8)?,
            user: row.get(9)?,
            group: row.get(10)?,
            comments: row.get(11)?,
            user_notes: row.get(12)?,
            patient_id: row.get(13)?,
            success: row.get::<_, i64>(14)? != 0,
            cert_user: row.get(15)?,
            source: SourceContext {
                log_from: row.get(16)?,
                menu_item_id: row.get(17)?,
                ccda_doc_id: row.get(18)?,
            },
        }),
        None => None,
    };

    let api = match row.get::<_, Option<i64>>(19)? {
        Some(log_id) => Some(ApiLogEntry {
            log_id,
            detail: ApiDetail {
                user_id: row.get(20)?,
                patient_id: row.get(21)?,
                ip_address: row.get(22)?,
                method: row.get(23)?,
                request: row.get(24)?,
                request_url: row.get(25)?,
                request_body: row.get(26)?,
                response: row.get(27)?,
            },
            created_time: parse_ts(28, &row.get::<_, String>(28)?)?,
        }),
        None => None,
    };

    Ok(StoredEvent { entry, envelope, api })
}

fn disclosure_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DisclosureRecord> {
    Ok(DisclosureRecord {
        id: Some(row.get(0)?),
        date: parse_ts(1, &row.get::<_, String>(1)?)?,
        event: row.get(2)?,
        user: row.get(3)?,
        recipient: row.get(4)?,
        patient_id: row.get(5)?,
        description: row.get(6)?,
    })
}

/// Audit store on a SQLite connection.
///
/// The connection may be shared with the host database; every method takes
/// the lock for the duration of one call only.
#[derive(Clone)]
pub struct SqliteAuditStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteAuditStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: &Path) -> AuditResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| persistence("failed to create audit database directory", e))?;
        }
        let conn = Connection::open(path).map_err(|e| persistence("failed to open audit database", e))?;
        Self::with_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn open_in_memory() -> AuditResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| persistence("failed to create in-memory audit database", e))?;
        Self::with_connection(Arc::new(Mutex::new(conn)))
    }

    /// Use an existing connection, creating the audit tables on it.
    pub fn with_connection(db: Arc<Mutex<Connection>>) -> AuditResult<Self> {
        {
            let conn = db
                .lock()
                .map_err(|e| persistence("failed to acquire database lock", e))?;
            schema::init_schema(&conn).map_err(|e| persistence("failed to initialise audit schema", e))?;
        }
        Ok(Self { db })
    }

    /// The underlying connection.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.db.clone()
    }

    /// Register a patient-portal menu label.
    pub fn add_portal_menu(&self, menu_name: &str) -> AuditResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO patient_portal_menu (menu_name) VALUES (?1)",
            params![menu_name],
        )
        .map_err(|e| persistence("failed to insert portal menu", e))?;
        conn.query_row(
            "SELECT patient_portal_menu_id FROM patient_portal_menu WHERE menu_name = ?1",
            params![menu_name],
            |row| row.get(0),
        )
        .map_err(|e| persistence("failed to read portal menu", e))
    }

    fn lock(&self) -> AuditResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| persistence("failed to acquire database lock", e))
    }
}

impl AuditStore for SqliteAuditStore {
    fn append(&self, record: &NewAuditRecord) -> AuditResult<i64> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| persistence("failed to begin audit transaction", e))?;

        let entry = &record.entry;
        tx.execute(
            r#"
            INSERT INTO log (
                date, event, category, user, groupname, comments, user_notes,
                patient_id, success, crt_user, log_from, menu_item_id, ccda_doc_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                format_ts(entry.timestamp),
                entry.event,
                entry.category,
                entry.user,
                entry.group,
                entry.comments,
                entry.user_notes,
                entry.patient_id,
                entry.success as i64,
                entry.cert_user,
                entry.source.log_from,
                entry.source.menu_item_id,
                entry.source.ccda_doc_id,
            ],
        )
        .map_err(|e| persistence("failed to insert log row", e))?;
        let log_id = tx.last_insert_rowid();

        let checksum_api = record
            .api
            .as_ref()
            .map(|api| checksum::api_checksum(log_id, &api.plaintext, entry.timestamp))
            .unwrap_or_default();

        tx.execute(
            "INSERT INTO log_envelope (log_id, encrypt, checksum, checksum_api, version) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                log_id,
                encrypt_flag(record.encrypted),
                record.checksum,
                checksum_api,
                record.version,
            ],
        )
        .map_err(|e| persistence("failed to insert log envelope", e))?;

        if let Some(api) = &record.api {
            let d = &api.stored;
            tx.execute(
                r#"
                INSERT INTO api_log (
                    log_id, user_id, patient_id, ip_address, method, request,
                    request_url, request_body, response, created_time
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    log_id,
                    d.user_id,
                    d.patient_id,
                    d.ip_address,
                    d.method,
                    d.request,
                    d.request_url,
                    d.request_body,
                    d.response,
                    format_ts(entry.timestamp),
                ],
            )
            .map_err(|e| persistence("failed to insert api log row", e))?;
        }

        tx.commit()
            .map_err(|e| persistence("failed to commit audit transaction", e))?;
        debug!(log_id, event = %entry.event, "audit event stored");
        Ok(log_id)
    }

    fn fetch_events(&self, query: &EventQuery) -> AuditResult<Vec<StoredEvent>> {
        let mut sql = format!(
            "SELECT {EVENT_COLUMNS} FROM log_envelope el \
             LEFT JOIN log l ON el.log_id = l.id \
             LEFT JOIN api_log al ON el.log_id = al.log_id \
             WHERE (l.date IS NULL OR (l.date >= ? AND l.date <= ?))"
        );
        let mut binds: Vec<Value> = vec![
            Value::Text(format_ts(query.start)),
            Value::Text(format_ts(query.end)),
        ];
        if let Some(user) = &query.user {
            sql.push_str(" AND l.user LIKE ?");
            binds.push(Value::Text(user.clone()));
        }
        if let Some(patient) = &query.patient {
            sql.push_str(" AND l.patient_id LIKE ?");
            binds.push(Value::Text(patient.clone()));
        }
        if let Some(prefix) = &query.event_prefix {
            sql.push_str(" AND l.event LIKE ?");
            binds.push(Value::Text(format!("{prefix}%")));
        }
        if let Some(suffix) = &query.event_suffix {
            sql.push_str(" AND l.event LIKE ?");
            binds.push(Value::Text(format!("%{suffix}")));
        }
        match query.sort {
            Some((column, direction)) => {
                sql.push_str(&format!(" ORDER BY {} {}", column.as_sql(), direction.as_sql()))
            }
            None => sql.push_str(" ORDER BY el.log_id DESC"),
        }
        sql.push_str(" LIMIT ?");
        binds.push(Value::Integer(query.limit as i64));

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| persistence("failed to prepare event query", e))?;
        let rows = stmt
            .query_map(params_from_iter(binds.iter()), event_from_row)
            .map_err(|e| persistence("failed to query events", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| persistence("failed to read events", e))
    }

    fn fetch_disclosures(&self, query: &DisclosureQuery) -> AuditResult<Vec<DisclosureRecord>> {
        let mut sql = String::from(
            "SELECT id, date, event, user, recipient, patient_id, description \
             FROM disclosure_log WHERE date >= ? AND date <= ?",
        );
        let mut binds: Vec<Value> = vec![
            Value::Text(format_ts(query.start)),
            Value::Text(format_ts(query.end)),
        ];
        if let Some(user) = &query.user {
            sql.push_str(" AND user LIKE ?");
            binds.push(Value::Text(user.clone()));
        }
        if let Some(patient) = &query.patient {
            sql.push_str(" AND patient_id LIKE ?");
            binds.push(Value::Text(patient.clone()));
        }
        if let Some(prefix) = &query.event_prefix {
            sql.push_str(" AND event LIKE ?");
            binds.push(Value::Text(format!("{prefix}%")));
        }
        if let Some(column) = query.sort {
            sql.push_str(&format!(" ORDER BY {} DESC", column.as_sql()));
        }
        sql.push_str(" LIMIT ?");
        binds.push(Value::Integer(query.limit as i64));

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| persistence("failed to prepare disclosure query", e))?;
        let rows = stmt
            .query_map(params_from_iter(binds.iter()), disclosure_from_row)
            .map_err(|e| persistence("failed to query disclosures", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| persistence("failed to read disclosures", e))
    }

    fn insert_disclosure(&self, record: &DisclosureRecord) -> AuditResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO disclosure_log (date, event, user, recipient, patient_id, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                format_ts(record.date),
                record.event,
                record.user,
                record.recipient,
                record.patient_id,
                record.description,
            ],
        )
        .map_err(|e| persistence("failed to insert disclosure", e))?;
        Ok(conn.last_insert_rowid())
    }

    fn update_disclosure(&self, record: &DisclosureRecord) -> AuditResult<()> {
        let id = record.id.ok_or_else(|| AuditError::Persistence {
            reason: "disclosure update requires an id".to_string(),
        })?;
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE disclosure_log SET event = ?1, date = ?2, recipient = ?3, description = ?4 \
                 WHERE id = ?5",
                params![record.event, format_ts(record.date), record.recipient, record.description, id],
            )
            .map_err(|e| persistence("failed to update disclosure", e))?;
        if changed == 0 {
            debug!(id, "disclosure update matched no row");
        }
        Ok(())
    }

    fn delete_disclosure(&self, id: i64) -> AuditResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM disclosure_log WHERE id = ?1", params![id])
            .map_err(|e| persistence("failed to delete disclosure", e))?;
        Ok(())
    }

    fn event_names(&self) -> AuditResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT event FROM log ORDER BY event")
            .map_err(|e| persistence("failed to prepare event name query", e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| persistence("failed to query event names", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| persistence("failed to read event names", e))
    }

    fn has_disclosures(&self) -> AuditResult<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row("SELECT 1 FROM disclosure_log LIMIT 1", [], |_| Ok(()))
            .optional()
            .map_err(|e| persistence("failed to check disclosure log", e))?;
        Ok(found.is_some())
    }

    fn portal_menu_id(&self, menu_name: &str) -> AuditResult<Option<i64>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT patient_portal_menu_id FROM patient_portal_menu WHERE menu_name = ?1",
            params![menu_name],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| persistence("failed to look up portal menu", e))
    }
}
