//! # tessera-audit
//!
//! Records, stores, and reads back audit events.
//!
//! ## Overview
//!
//! - [`AuditRecorder`] implements
//!   [`SqlEventRecorder`](tessera_core::traits::SqlEventRecorder): it turns an
//!   executed statement into a structured comment, seals it, checksums it,
//!   and appends it to the store. It also records application events
//!   (`new_event`), audit setting changes, and HTTP requests.
//! - [`SqliteAuditStore`] keeps the `log`, `log_envelope`, `api_log`, and
//!   `disclosure_log` tables in SQLite.
//! - [`QueryService`] resolves viewer filters, decodes every stored comment
//!   version, and manages disclosures.
//! - [`integrity`] recomputes checksums to detect tampering.
//!
//! ## Write path
//!
//! ```text
//! statement ─► payload (v5 JSON) ─► seal (base64 | encrypt)
//!                    │
//!                    └─► SHA3-512 over plaintext ─► append(log, envelope, api) ─► transport
//! ```

pub mod checksum;
pub mod codec;
pub mod integrity;
pub mod query;
pub mod recorder;
pub mod schema;
pub mod store;
pub mod viewer;

pub use codec::{CommentCodec, DecodedComment, StoredComment};
pub use query::QueryService;
pub use recorder::{AuditRecorder, EventComment, GenericEvent, LogItem};
pub use store::SqliteAuditStore;
pub use viewer::ViewerEntry;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use chrono::NaiveDateTime;

    use tessera_contracts::{
        comment::{CommentPayload, StatementKind, PLAIN_COMMENT_VERSION, STRUCTURED_COMMENT_VERSION},
        error::AuditError,
        event::{ApiDetail, ApiPayload, DisclosureRecord, LogEntry, NewAuditRecord, SourceContext},
        query::{DisclosureQuery, EventQuery},
    };
    use tessera_core::traits::{AuditStore, EncryptionProvider};
    use tessera_crypto::KeyringEncryptor;

    use crate::{checksum, codec, CommentCodec, DecodedComment, SqliteAuditStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn entry(event: &str, comments: &str) -> LogEntry {
        LogEntry {
            id: None,
            timestamp: ts("2024-03-15 10:30:00"),
            event: event.to_string(),
            category: Some("Patient Demographics".to_string()),
            user: "admin".to_string(),
            group: "Default".to_string(),
            comments: comments.to_string(),
            user_notes: String::new(),
            patient_id: Some(42),
            success: true,
            cert_user: String::new(),
            source: SourceContext::default(),
        }
    }

    fn record(entry: LogEntry, plaintext: &str) -> NewAuditRecord {
        let checksum = checksum::log_checksum(&entry, plaintext);
        NewAuditRecord {
            entry,
            encrypted: false,
            version: PLAIN_COMMENT_VERSION,
            checksum,
            api: None,
        }
    }

    fn wide_query() -> EventQuery {
        EventQuery {
            start: ts("2000-01-01 00:00:00"),
            end: ts("2100-01-01 00:00:00"),
            user: None,
            patient: None,
            event_prefix: None,
            event_suffix: None,
            sort: None,
            limit: 5000,
        }
    }

    fn encryptor() -> Arc<dyn EncryptionProvider> {
        Arc::new(KeyringEncryptor::new(KeyringEncryptor::generate_key()))
    }

    // ── 1. checksums ──────────────────────────────────────────────────────────

    #[test]
    fn log_checksum_is_sha3_512_hex_over_plaintext() {
        let e = entry("patient-record-update", "stored-form-a");
        let sum = checksum::log_checksum(&e, "plain");
        assert_eq!(sum.len(), 128);
        assert!(sum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let other_stored = entry("patient-record-update", "stored-form-b");
        assert_eq!(sum, checksum::log_checksum(&other_stored, "plain"));
        assert_ne!(sum, checksum::log_checksum(&e, "plain!"));
    }

    #[test]
    fn log_checksum_covers_every_field() {
        let base = entry("patient-record-update", "x");
        let sum = checksum::log_checksum(&base, "p");

        let mut e = base.clone();
        e.user = "mallory".to_string();
        assert_ne!(sum, checksum::log_checksum(&e, "p"));

        let mut e = base.clone();
        e.success = false;
        assert_ne!(sum, checksum::log_checksum(&e, "p"));

        let mut e = base;
        e.patient_id = Some(43);
        assert_ne!(sum, checksum::log_checksum(&e, "p"));
    }

    #[test]
    fn api_checksum_depends_on_log_id() {
        let detail = ApiDetail {
            method: "GET".to_string(),
            request_url: "/api/patient/42".to_string(),
            ..ApiDetail::default()
        };
        let t = ts("2024-03-15 10:30:00");
        assert_ne!(checksum::api_checksum(1, &detail, t), checksum::api_checksum(2, &detail, t));
    }

    // ── 2. comment codec ──────────────────────────────────────────────────────

    #[test]
    fn plain_codec_base64_encodes() {
        let c = CommentCodec::plain();
        let sealed = c.seal_comment("Audit Logging Enabled.").unwrap();
        assert_eq!(sealed, BASE64.encode("Audit Logging Enabled."));
        assert_eq!(
            c.open(&sealed, false, PLAIN_COMMENT_VERSION),
            DecodedComment::Text("Audit Logging Enabled.".to_string())
        );
    }

    #[test]
    fn structured_comment_round_trips_through_encryption() {
        let c = CommentCodec::new(true, Some(encryptor()));
        let mut payload = CommentPayload::new(StatementKind::Update, true, "UPDATE t SET a='1' WHERE id=2");
        payload.table = "t".to_string();
        let json = serde_json::to_string(&payload).unwrap();

        let sealed = c.seal_comment(&json).unwrap();
        assert!(sealed.starts_with("v1:"));
        match c.open(&sealed, true, STRUCTURED_COMMENT_VERSION) {
            DecodedComment::Structured(p) => {
                assert_eq!(p, payload);
                assert_eq!(p.decoded_raw_query().unwrap(), "UPDATE t SET a='1' WHERE id=2");
            }
            other => panic!("expected structured comment, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_versions_decode_to_placeholders() {
        let c = CommentCodec::plain();
        assert_eq!(c.open("xx", true, 0), DecodedComment::Unreadable(codec::LEGACY_MCRYPT_UNAVAILABLE));
        assert_eq!(c.open("xx", true, 2), DecodedComment::Unreadable(codec::LEGACY_OPENSSL_UNAVAILABLE));
        assert_eq!(c.open("xx", true, 3), DecodedComment::Unreadable(codec::NO_PROVIDER));

        let other_key = CommentCodec::new(false, Some(encryptor()));
        let sealed = CommentCodec::new(true, Some(encryptor())).seal_comment("secret").unwrap();
        assert_eq!(other_key.open(&sealed, true, 4), DecodedComment::Unreadable(codec::DECRYPT_FAILED));
    }

    #[test]
    fn old_unencrypted_versions_are_raw_text() {
        let c = CommentCodec::plain();
        assert_eq!(c.open("patient-record: viewed", false, 3), DecodedComment::Text("patient-record: viewed".into()));
    }

    #[test]
    fn invalid_json_in_structured_row_falls_back_to_text() {
        let c = CommentCodec::plain();
        let sealed = c.seal_comment("not json").unwrap();
        assert_eq!(c.open(&sealed, false, 5), DecodedComment::Text("not json".into()));
    }

    #[test]
    fn encryption_without_provider_is_a_hard_error() {
        let c = CommentCodec::new(true, None);
        assert!(matches!(c.seal_comment("x"), Err(AuditError::Encryption { .. })));
        assert!(matches!(c.seal_field("x"), Err(AuditError::Encryption { .. })));
        assert_eq!(c.seal_field("").unwrap(), "", "empty API fields stay empty");
    }

    // ── 3. SQLite store ───────────────────────────────────────────────────────

    #[test]
    fn append_writes_log_envelope_and_api_rows() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        let mut rec = record(entry("patient-record-select", "c3RvcmVk"), "stored");
        let api = ApiDetail {
            user_id: Some(1),
            patient_id: Some(42),
            ip_address: "10.0.0.5".to_string(),
            method: "GET".to_string(),
            request: "patient".to_string(),
            request_url: "/api/patient/42".to_string(),
            request_body: String::new(),
            response: "{}".to_string(),
        };
        rec.api = Some(ApiPayload { plaintext: api.clone(), stored: api.clone() });

        let id = store.append(&rec).unwrap();
        let events = store.fetch_events(&wide_query()).unwrap();
        assert_eq!(events.len(), 1);

        let got = &events[0];
        assert_eq!(got.envelope.log_id, id);
        assert_eq!(got.envelope.checksum, rec.checksum);
        assert_eq!(got.envelope.version, PLAIN_COMMENT_VERSION);
        assert_eq!(
            got.envelope.checksum_api,
            checksum::api_checksum(id, &api, rec.entry.timestamp)
        );
        let stored_entry = got.entry.as_ref().unwrap();
        assert_eq!(stored_entry.id, Some(id));
        assert_eq!(stored_entry.timestamp, rec.entry.timestamp);
        assert_eq!(got.api.as_ref().unwrap().detail, api);
    }

    #[test]
    fn event_filters_and_default_order() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        store.append(&record(entry("patient-record-update", "a"), "a")).unwrap();
        let mut other = entry("security-administration-insert", "b");
        other.user = "nurse".to_string();
        other.patient_id = None;
        store.append(&record(other, "b")).unwrap();

        let all = store.fetch_events(&wide_query()).unwrap();
        let ids: Vec<i64> = all.iter().map(|e| e.envelope.log_id).collect();
        assert_eq!(ids, vec![2, 1], "newest first by default");

        let q = EventQuery { user: Some("nurse".into()), ..wide_query() };
        assert_eq!(store.fetch_events(&q).unwrap().len(), 1);

        let q = EventQuery { event_prefix: Some("patient-record".into()), ..wide_query() };
        assert_eq!(store.fetch_events(&q).unwrap().len(), 1);

        let q = EventQuery { event_suffix: Some("insert".into()), ..wide_query() };
        assert_eq!(store.fetch_events(&q).unwrap()[0].envelope.log_id, 2);

        let q = EventQuery { patient: Some("42".into()), ..wide_query() };
        assert_eq!(store.fetch_events(&q).unwrap().len(), 1);

        let q = EventQuery { start: ts("2030-01-01 00:00:00"), ..wide_query() };
        assert!(store.fetch_events(&q).unwrap().is_empty());
    }

    fn row_count(store: &SqliteAuditStore, table: &str) -> i64 {
        let conn = store.connection();
        let conn = conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn failed_envelope_insert_leaves_no_log_row() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        {
            let conn = store.connection();
            let conn = conn.lock().unwrap();
            conn.execute("INSERT INTO log_envelope (log_id, checksum) VALUES (1, 'stale')", []).unwrap();
        }

        let err = store.append(&record(entry("patient-record-update", "a"), "a")).unwrap_err();
        assert!(matches!(err, AuditError::Persistence { .. }));
        assert_eq!(row_count(&store, "log"), 0);
        assert_eq!(row_count(&store, "log_envelope"), 1);
    }

    #[test]
    fn failed_api_insert_rolls_back_log_and_envelope() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        {
            let conn = store.connection();
            let conn = conn.lock().unwrap();
            conn.execute("INSERT INTO api_log (log_id, created_time) VALUES (1, '2024-01-01 00:00:00')", [])
                .unwrap();
        }
        let mut rec = record(entry("patient-record-select", "a"), "a");
        let api = ApiDetail { method: "GET".to_string(), ..ApiDetail::default() };
        rec.api = Some(ApiPayload { plaintext: api.clone(), stored: api });

        let err = store.append(&rec).unwrap_err();
        assert!(matches!(err, AuditError::Persistence { .. }));
        assert_eq!(row_count(&store, "log"), 0);
        assert_eq!(row_count(&store, "log_envelope"), 0);
        assert_eq!(row_count(&store, "api_log"), 1);
    }

    #[test]
    fn envelope_without_log_row_is_still_returned() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        let id = store.append(&record(entry("patient-record-update", "a"), "a")).unwrap();
        {
            let conn = store.connection();
            let conn = conn.lock().unwrap();
            conn.execute("DELETE FROM log WHERE id = ?1", [id]).unwrap();
        }
        let events = store.fetch_events(&wide_query()).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].entry.is_none());
    }

    #[test]
    fn disclosure_crud() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        assert!(!store.has_disclosures().unwrap());

        let mut d = DisclosureRecord {
            id: None,
            date: ts("2024-03-15 09:00:00"),
            event: "disclosure-treatment".to_string(),
            user: "admin".to_string(),
            recipient: "Dr. Who".to_string(),
            patient_id: 42,
            description: "Lab results".to_string(),
        };
        let id = store.insert_disclosure(&d).unwrap();
        assert!(store.has_disclosures().unwrap());

        d.id = Some(id);
        d.recipient = "Dr. Watson".to_string();
        store.update_disclosure(&d).unwrap();

        let q = DisclosureQuery {
            start: ts("2024-03-15 00:00:00"),
            end: ts("2024-03-15 23:59:59"),
            user: None,
            patient: Some("42".into()),
            event_prefix: None,
            sort: None,
            limit: 5000,
        };
        let got = store.fetch_disclosures(&q).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].recipient, "Dr. Watson");

        store.delete_disclosure(id).unwrap();
        assert!(store.fetch_disclosures(&q).unwrap().is_empty());
    }

    #[test]
    fn event_names_and_portal_menu() {
        let store = SqliteAuditStore::open_in_memory().unwrap();
        store.append(&record(entry("patient-record-update", "a"), "a")).unwrap();
        store.append(&record(entry("patient-record-update", "b"), "b")).unwrap();
        store.append(&record(entry("login", "c"), "c")).unwrap();
        assert_eq!(store.event_names().unwrap(), vec!["login", "patient-record-update"]);

        let id = store.add_portal_menu("dashboard").unwrap();
        assert_eq!(store.add_portal_menu("dashboard").unwrap(), id);
        assert_eq!(store.portal_menu_id("dashboard").unwrap(), Some(id));
        assert_eq!(store.portal_menu_id("nope").unwrap(), None);
    }
}
