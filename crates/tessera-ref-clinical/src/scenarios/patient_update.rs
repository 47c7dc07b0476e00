//! Scenario 1: Patient Demographics Update
//!
//! Dr. Smith corrects John Doe's first name. The recorder reads the old
//! value before the UPDATE runs, so the trail carries both images.

use tessera_contracts::{
    comment::CommentPayload,
    error::{AuditError, AuditResult},
    event::StoredEvent,
    value::SqlValue,
};

use crate::{
    clinic::{clinic_settings, session, Clinic},
    mock_data::{DR_SMITH, PATIENT_JOHN_DOE},
    scenarios::render,
};

pub const STATEMENT: &str = "UPDATE patient_data SET fname = ? WHERE id = ?";

/// Run the update and return the recorded event with its payload.
pub fn execute(clinic: &Clinic) -> AuditResult<(StoredEvent, CommentPayload)> {
    let session = session(DR_SMITH).with_patient(PATIENT_JOHN_DOE);
    clinic.connection.execute(
        &session,
        STATEMENT,
        &[SqlValue::from("Jane"), SqlValue::Integer(PATIENT_JOHN_DOE)],
    )?;

    match clinic.latest()? {
        Some((event, Some(payload))) => Ok((event, payload)),
        _ => Err(AuditError::Integrity {
            reason: "patient update left no structured audit event".to_string(),
        }),
    }
}

/// Run Scenario 1: Patient Demographics Update.
pub fn run_scenario() -> AuditResult<()> {
    println!("=== Scenario 1: Patient Demographics Update ===");
    println!();
    println!("  User:       {DR_SMITH} (patient context {PATIENT_JOHN_DOE})");
    println!("  Statement:  {STATEMENT}");
    println!("  Binds:      ['Jane', {PATIENT_JOHN_DOE}]");

    let clinic = Clinic::open(clinic_settings()?)?;
    let (event, payload) = execute(&clinic)?;
    let entry = event.entry.as_ref();

    println!("  Event:      {}", entry.map_or("-", |e| e.event.as_str()));
    println!("  Category:   {}", entry.and_then(|e| e.category.as_deref()).unwrap_or("-"));
    println!("  Patient:    {}", entry.and_then(|e| e.patient_id).map_or("-".to_string(), |p| p.to_string()));
    println!("  Table:      {}", payload.table);
    println!("  Before:     {}", render(payload.before.as_ref()));
    println!("  After:      {}", render(payload.after.as_ref()));
    println!("  Checksum:   {}...", &event.envelope.checksum[..16.min(event.envelope.checksum.len())]);

    let report = clinic.verify()?;
    println!(
        "  Integrity:  {} ({} event(s) checked)",
        if report.is_clean() { "VERIFIED" } else { "FAILED" },
        report.checked
    );
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use tessera_contracts::{comment::StatementKind, value::FieldValue};

    use super::*;

    #[test]
    fn update_records_both_images() {
        let clinic = Clinic::open(clinic_settings().unwrap()).unwrap();
        let (event, payload) = execute(&clinic).unwrap();

        let entry = event.entry.unwrap();
        assert_eq!(entry.event, "patient-record-update");
        assert_eq!(entry.category.as_deref(), Some("Patient Demographics"));
        assert_eq!(entry.patient_id, Some(PATIENT_JOHN_DOE));
        assert!(entry.success);

        assert_eq!(payload.kind, StatementKind::Update);
        assert_eq!(payload.table, "patient_data");
        let before = payload.before.unwrap();
        let after = payload.after.unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(before.get("fname"), Some(&FieldValue::text("John")));
        assert_eq!(after.get("fname"), Some(&FieldValue::text("Jane")));
    }

    #[test]
    fn question_mark_in_where_literal_keeps_images() {
        let clinic = Clinic::open(clinic_settings().unwrap()).unwrap();
        let sql = "UPDATE patient_data SET fname = ? WHERE id = ? AND lname <> 'who?'";
        clinic
            .connection
            .execute(
                &session(DR_SMITH).with_patient(PATIENT_JOHN_DOE),
                sql,
                &[SqlValue::from("Jane"), SqlValue::Integer(PATIENT_JOHN_DOE)],
            )
            .unwrap();

        let (_, payload) = clinic.latest().unwrap().unwrap();
        let payload = payload.unwrap();
        assert_eq!(payload.where_clause.as_deref(), Some("id = 42 AND lname <> 'who?'"));
        assert_eq!(payload.before.unwrap().get("fname"), Some(&FieldValue::text("John")));
        assert_eq!(payload.after.unwrap().get("fname"), Some(&FieldValue::text("Jane")));
    }

    #[test]
    fn host_row_is_actually_updated() {
        let clinic = Clinic::open(clinic_settings().unwrap()).unwrap();
        execute(&clinic).unwrap();

        let row = clinic
            .connection
            .database()
            .query_row("SELECT fname FROM patient_data WHERE id = ?", &[SqlValue::Integer(PATIENT_JOHN_DOE)])
            .unwrap()
            .unwrap();
        assert_eq!(row.get("fname"), Some(&SqlValue::Text("Jane".to_string())));
        assert!(clinic.verify().unwrap().is_clean());
    }

    #[test]
    fn runs_end_to_end() {
        run_scenario().unwrap();
    }
}
