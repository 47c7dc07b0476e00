//! Persisted audit records.
//!
//! `LogEntry` is the immutable row in `log`. `EncryptionEnvelope` is its 1:1
//! companion in `log_envelope` holding the checksums and encoding metadata.
//! `ApiLogEntry` is the optional HTTP detail row. `DisclosureRecord` lives in
//! its own table and, unlike the others, may be edited by administrators.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp layout used for stored rows and for checksum input.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default origin subsystem for events.
pub const DEFAULT_LOG_FROM: &str = "ehr";

/// Where an event originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContext {
    /// Origin subsystem, e.g. "ehr", "patient-portal", "http-request".
    pub log_from: String,
    pub menu_item_id: Option<i64>,
    pub ccda_doc_id: Option<i64>,
}

impl Default for SourceContext {
    fn default() -> Self {
        Self {
            log_from: DEFAULT_LOG_FROM.to_string(),
            menu_item_id: None,
            ccda_doc_id: None,
        }
    }
}

/// A row of the append-only `log` table.
///
/// `comments` holds the stored form (base64 or ciphertext), never the
/// plaintext. Once written a row is never updated by this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Surrogate key; `None` until the row has been inserted.
    pub id: Option<i64>,
    pub timestamp: NaiveDateTime,
    /// `<category>-<action>`, e.g. `patient-record-update`.
    pub event: String,
    pub category: Option<String>,
    pub user: String,
    pub group: String,
    pub comments: String,
    pub user_notes: String,
    pub patient_id: Option<i64>,
    pub success: bool,
    /// TLS client-certificate common name of the requester, if any.
    pub cert_user: String,
    pub source: SourceContext,
}

/// Checksum and encoding metadata for one log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionEnvelope {
    pub log_id: i64,
    pub encrypted: bool,
    /// SHA3-512 hex over the ordered log fields.
    pub checksum: String,
    /// SHA3-512 hex over the ordered API fields; empty when there is no API row.
    pub checksum_api: String,
    /// Stored comment format version (see `StoredComment`).
    pub version: u8,
}

/// HTTP request metadata supplied by an API-originated caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDetail {
    pub user_id: Option<i64>,
    pub patient_id: Option<i64>,
    pub ip_address: String,
    pub method: String,
    pub request: String,
    pub request_url: String,
    pub request_body: String,
    pub response: String,
}

/// A row of `api_log`, keyed 1:1 by the log row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiLogEntry {
    pub log_id: i64,
    /// URL, body, and response are in stored form (ciphertext when encrypted).
    pub detail: ApiDetail,
    pub created_time: NaiveDateTime,
}

/// A regulatory disclosure of patient information to a third party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureRecord {
    pub id: Option<i64>,
    pub date: NaiveDateTime,
    /// Disclosure label, e.g. `disclosure-treatment`.
    pub event: String,
    pub user: String,
    pub recipient: String,
    pub patient_id: i64,
    pub description: String,
}

/// A log row joined with its envelope and optional API row, as read back by
/// the query service.
///
/// `entry` is `None` when the envelope survives but its log row was removed;
/// viewers skip such rows and tamper tooling reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub entry: Option<LogEntry>,
    pub envelope: EncryptionEnvelope,
    pub api: Option<ApiLogEntry>,
}

/// Everything the store writes for one event, in one transaction.
///
/// `entry.id` is ignored; the store assigns it and keys the envelope and API
/// row by the generated id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditRecord {
    pub entry: LogEntry,
    pub encrypted: bool,
    pub version: u8,
    /// Log-row checksum, computed over the plaintext comment.
    pub checksum: String,
    pub api: Option<ApiPayload>,
}

/// API detail for a new record in both forms.
///
/// The API checksum covers the log id, so the store computes it from
/// `plaintext` once the id is known and persists `stored`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPayload {
    pub plaintext: ApiDetail,
    pub stored: ApiDetail,
}
