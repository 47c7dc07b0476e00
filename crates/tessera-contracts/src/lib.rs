//! # tessera-contracts
//!
//! Shared types, settings, and error contracts for the tessera audit engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, the configuration snapshot and error
//! types.

pub mod comment;
pub mod error;
pub mod event;
pub mod query;
pub mod session;
pub mod settings;
pub mod value;

#[cfg(test)]
mod tests {
    use super::*;
    use comment::{CommentPayload, EventStatus, StatementKind};
    use error::AuditError;
    use settings::{AtnaSettings, AuditSettings};
    use value::{FieldMap, FieldValue, SqlValue};

    // ── FieldValue serde ─────────────────────────────────────────────────────

    #[test]
    fn binary_field_serializes_as_tagged_base64() {
        let value = FieldValue::Binary(vec![0x00, 0xff, 0x10]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["type"], "binary");
        assert_eq!(json["value"], "AP8Q");
    }

    #[test]
    fn field_map_keeps_column_order_through_json() {
        let mut map = FieldMap::new();
        map.insert("lname".to_string(), FieldValue::text("Doe"));
        map.insert("fname".to_string(), FieldValue::text("Jane"));
        map.insert("mname".to_string(), FieldValue::Null);
        map.insert("uuid".to_string(), FieldValue::Binary(vec![1, 2, 3]));

        let json = serde_json::to_string(&map).unwrap();
        assert!(json.find("lname").unwrap() < json.find("fname").unwrap());

        let decoded: FieldMap = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn numeric_json_field_decodes_as_text() {
        let decoded: FieldValue = serde_json::from_str("42").unwrap();
        assert_eq!(decoded, FieldValue::text("42"));
    }

    // ── SqlValue ─────────────────────────────────────────────────────────────

    #[test]
    fn sql_value_numeric_detection() {
        assert!(SqlValue::Integer(7).is_numeric());
        assert!(SqlValue::Real(1.5).is_numeric());
        assert!(SqlValue::from("42").is_numeric());
        assert!(SqlValue::from("-3.25").is_numeric());
        assert!(SqlValue::from("1e3").is_numeric());
        assert!(!SqlValue::from("").is_numeric());
        assert!(!SqlValue::from("12abc").is_numeric());
        assert!(!SqlValue::from("inf").is_numeric());
        assert!(!SqlValue::Null.is_numeric());
    }

    #[test]
    fn blob_displays_as_uppercase_hex_literal() {
        assert_eq!(SqlValue::Blob(vec![0x0a, 0xbc, 0xff]).to_string(), "X'0ABCFF'");
        assert_eq!(SqlValue::Blob(vec![]).to_string(), "X''");
    }

    #[test]
    fn sql_value_from_option() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".to_string()));
    }

    #[test]
    fn bind_parameters_serialize_as_plain_json() {
        let binds = vec![SqlValue::from("Jane"), SqlValue::Integer(42), SqlValue::Null];
        let json = serde_json::to_string(&binds).unwrap();
        assert_eq!(json, r#"["Jane",42,null]"#);
    }

    // ── CommentPayload ───────────────────────────────────────────────────────

    #[test]
    fn comment_payload_uses_stored_key_names() {
        let mut payload = CommentPayload::new(StatementKind::Update, true, "UPDATE t SET a=1 WHERE id=2");
        payload.where_clause = Some("id=2".to_string());
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["version"], 5);
        assert_eq!(json["type"], "update");
        assert_eq!(json["status"], "success");
        assert_eq!(json["where"], "id=2");
        assert!(json.get("before").is_none());
        assert_eq!(
            payload.decoded_raw_query().as_deref(),
            Some("UPDATE t SET a=1 WHERE id=2")
        );
    }

    #[test]
    fn event_status_from_outcome() {
        assert_eq!(EventStatus::from(true), EventStatus::Success);
        assert_eq!(EventStatus::from(false), EventStatus::Failure);
    }

    // ── Settings ─────────────────────────────────────────────────────────────

    #[test]
    fn default_settings_enable_domain_categories_only() {
        let settings = AuditSettings::default();
        assert!(settings.audit_log_enabled);
        assert!(!settings.audit_events_query);
        assert!(settings.category_enabled("patient-record"));
        assert!(settings.category_enabled("lab-results"));
        assert!(!settings.category_enabled("http-request"));
        assert!(!settings.category_enabled("made-up"));
    }

    #[test]
    fn atna_inactive_without_host() {
        let mut atna = AtnaSettings { enabled: true, ..AtnaSettings::default() };
        assert!(!atna.is_active());
        atna.host = "audit.example.org".to_string();
        assert!(atna.is_active());
        atna.enabled = false;
        assert!(!atna.is_active());
    }

    // ── AuditError display messages ──────────────────────────────────────────

    #[test]
    fn error_persistence_display() {
        let err = AuditError::Persistence { reason: "disk full".to_string() };
        let msg = err.to_string();
        assert!(msg.contains("audit persistence failed"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn error_encryption_display() {
        let err = AuditError::Encryption { reason: "no key for version 3".to_string() };
        assert!(err.to_string().contains("no key for version 3"));
    }
}
