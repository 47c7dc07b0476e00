//! Scenario 4: Medication Removed From the Issue List
//!
//! `lists` holds problems, medications, and allergies side by side. The
//! category comes from the quoted `type` literal in the statement.

use tessera_contracts::{
    comment::CommentPayload,
    error::{AuditError, AuditResult},
    event::StoredEvent,
    value::SqlValue,
};

use crate::{
    clinic::{clinic_settings, session, Clinic},
    mock_data::{DR_SMITH, LISINOPRIL_LIST_ID, PATIENT_JOHN_DOE},
};

pub const STATEMENT: &str = "DELETE FROM lists WHERE id = ? AND type = 'medication'";

pub fn execute(clinic: &Clinic) -> AuditResult<(StoredEvent, CommentPayload, u64)> {
    let session = session(DR_SMITH).with_patient(PATIENT_JOHN_DOE);
    let deleted = clinic
        .connection
        .execute(&session, STATEMENT, &[SqlValue::Integer(LISINOPRIL_LIST_ID)])?;

    match clinic.latest()? {
        Some((event, Some(payload))) => Ok((event, payload, deleted)),
        _ => Err(AuditError::Integrity {
            reason: "list delete left no structured audit event".to_string(),
        }),
    }
}

/// Run Scenario 4: Medication Removed From the Issue List.
pub fn run_scenario() -> AuditResult<()> {
    println!("=== Scenario 4: Medication Removed From the Issue List ===");
    println!();
    println!("  User:       {DR_SMITH} (patient context {PATIENT_JOHN_DOE})");
    println!("  Statement:  {STATEMENT}");
    println!("  Binds:      [{LISINOPRIL_LIST_ID}]");

    let clinic = Clinic::open(clinic_settings()?)?;
    let (event, payload, deleted) = execute(&clinic)?;
    let entry = event.entry.as_ref();

    println!("  Rows deleted: {deleted}");
    println!("  Event:      {}", entry.map_or("-", |e| e.event.as_str()));
    println!("  Category:   {}", entry.and_then(|e| e.category.as_deref()).unwrap_or("-"));
    println!("  Table:      {}", payload.table);

    for row in clinic.viewer()? {
        println!("  Viewer:     {} | {} | {}", row.event, row.category, row.summary.as_deref().unwrap_or("-"));
    }
    println!();
    Ok(())
}
