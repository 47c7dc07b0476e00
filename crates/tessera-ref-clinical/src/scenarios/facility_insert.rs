//! Scenario 2: New Facility
//!
//! An administrator registers a clinic site. Facilities are security
//! administration data, and an INSERT has no previous row, so the before
//! image is empty strings keyed like the after image.

use tessera_contracts::{
    comment::CommentPayload,
    error::{AuditError, AuditResult},
    event::StoredEvent,
    value::SqlValue,
};

use crate::{
    clinic::{clinic_settings, session, Clinic},
    mock_data::DR_SMITH,
    scenarios::render,
};

pub const STATEMENT: &str = "INSERT INTO facility (name, npi) VALUES (?, ?)";

pub fn execute(clinic: &Clinic) -> AuditResult<(StoredEvent, CommentPayload)> {
    clinic.connection.execute(
        &session(DR_SMITH),
        STATEMENT,
        &[SqlValue::from("Clinic A"), SqlValue::from("1234567890")],
    )?;

    match clinic.latest()? {
        Some((event, Some(payload))) => Ok((event, payload)),
        _ => Err(AuditError::Integrity {
            reason: "facility insert left no structured audit event".to_string(),
        }),
    }
}

/// Run Scenario 2: New Facility.
pub fn run_scenario() -> AuditResult<()> {
    println!("=== Scenario 2: New Facility ===");
    println!();
    println!("  User:       {DR_SMITH}");
    println!("  Statement:  {STATEMENT}");
    println!("  Binds:      ['Clinic A', '1234567890']");

    let clinic = Clinic::open(clinic_settings()?)?;
    let (event, payload) = execute(&clinic)?;
    let entry = event.entry.as_ref();

    println!("  Event:      {}", entry.map_or("-", |e| e.event.as_str()));
    println!("  Category:   {}", entry.and_then(|e| e.category.as_deref()).unwrap_or("-"));
    println!("  Patient:    {}", entry.and_then(|e| e.patient_id).map_or("none".to_string(), |p| p.to_string()));
    println!("  Before:     {}", render(payload.before.as_ref()));
    println!("  After:      {}", render(payload.after.as_ref()));
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use tessera_contracts::{comment::StatementKind, value::FieldValue};

    use super::*;

    #[test]
    fn insert_is_security_administration() {
        let clinic = Clinic::open(clinic_settings().unwrap()).unwrap();
        let (event, payload) = execute(&clinic).unwrap();

        let entry = event.entry.unwrap();
        assert_eq!(entry.event, "security-administration-insert");
        assert_eq!(entry.category.as_deref(), Some("Security"));
        assert_eq!(entry.patient_id, None);

        assert_eq!(payload.kind, StatementKind::Insert);
        assert_eq!(payload.table, "facility");
        let after = payload.after.unwrap();
        assert_eq!(after.get("name"), Some(&FieldValue::text("Clinic A")));
        assert_eq!(after.get("npi"), Some(&FieldValue::text("1234567890")));
    }

    #[test]
    fn before_is_empty_placeholders() {
        let clinic = Clinic::open(clinic_settings().unwrap()).unwrap();
        let (_, payload) = execute(&clinic).unwrap();

        let before = payload.before.unwrap();
        let keys: Vec<&str> = before.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "npi"]);
        assert!(before.values().all(|v| *v == FieldValue::text("")));
    }

    #[test]
    fn runs_end_to_end() {
        run_scenario().unwrap();
    }
}
