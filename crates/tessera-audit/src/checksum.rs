//! SHA3-512 integrity checksums.
//!
//! Input layout for a log row (UTF-8, concatenated with no delimiter):
//!   timestamp, event, category, user, group, comments, user_notes,
//!   patient_id, success, cert_user, log_from, menu_item_id, ccda_doc_id
//!
//! For an API row:
//!   log_id, user_id, patient_id, ip_address, method, request, request_url,
//!   request_body, response, created_time
//!
//! `comments` and the API URL/body/response are the plaintext values, never
//! the stored (base64 or encrypted) form, so the checksum does not depend on
//! the encryption setting. Absent optional values contribute nothing; the
//! success flag contributes `1` or `0`.

use chrono::NaiveDateTime;
use sha3::{Digest, Sha3_512};

use tessera_contracts::event::{ApiDetail, LogEntry, TIMESTAMP_FORMAT};

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn digest(fields: &[&str]) -> String {
    let mut hasher = Sha3_512::new();
    for field in fields {
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Checksum of a log row. `plaintext_comments` replaces `entry.comments`.
///
/// Returns a lowercase 128-character hex string.
pub fn log_checksum(entry: &LogEntry, plaintext_comments: &str) -> String {
    let timestamp = entry.timestamp.format(TIMESTAMP_FORMAT).to_string();
    let category = entry.category.clone().unwrap_or_default();
    let patient_id = opt(entry.patient_id);
    let success = if entry.success { "1" } else { "0" };
    let menu_item_id = opt(entry.source.menu_item_id);
    let ccda_doc_id = opt(entry.source.ccda_doc_id);

    digest(&[
        &timestamp,
        &entry.event,
        &category,
        &entry.user,
        &entry.group,
        plaintext_comments,
        &entry.user_notes,
        &patient_id,
        success,
        &entry.cert_user,
        &entry.source.log_from,
        &menu_item_id,
        &ccda_doc_id,
    ])
}

/// Checksum of an API detail row. `detail` must hold plaintext values.
pub fn api_checksum(log_id: i64, detail: &ApiDetail, created_time: NaiveDateTime) -> String {
    let log_id = log_id.to_string();
    let user_id = opt(detail.user_id);
    let patient_id = opt(detail.patient_id);
    let created = created_time.format(TIMESTAMP_FORMAT).to_string();

    digest(&[
        &log_id,
        &user_id,
        &patient_id,
        &detail.ip_address,
        &detail.method,
        &detail.request,
        &detail.request_url,
        &detail.request_body,
        &detail.response,
        &created,
    ])
}
