//! Scenario 3: Query Logging and Break-Glass
//!
//! With query logging off, reads are not audited:
//!
//! Sub-case A: nurse reads the user directory      → nothing recorded
//! Sub-case B: break-glass physician, same read     → recorded (forced logging)
//! Sub-case C: read of an unmapped table            → never recorded

use tessera_contracts::{error::AuditResult, value::SqlValue};

use crate::{
    clinic::{clinic_settings, session, Clinic},
    mock_data::{ER_DOC, NURSE_JONES},
};

pub const STATEMENT: &str = "SELECT * FROM users WHERE username = ?";

pub const UNMAPPED: &str = "SELECT name FROM sqlite_master WHERE type = 'table'";

/// Event counts after each sub-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatingOutcome {
    pub rows_returned: usize,
    pub after_ordinary_user: usize,
    pub after_breakglass_user: usize,
    pub breakglass_event: Option<String>,
}

pub fn execute(clinic: &Clinic) -> AuditResult<GatingOutcome> {
    let rows = clinic
        .connection
        .query(&session(NURSE_JONES), STATEMENT, &[SqlValue::from(NURSE_JONES)])?;
    let after_ordinary_user = clinic.events()?.len();

    clinic
        .connection
        .query(&session(ER_DOC), STATEMENT, &[SqlValue::from(NURSE_JONES)])?;
    let events = clinic.events()?;

    Ok(GatingOutcome {
        rows_returned: rows.len(),
        after_ordinary_user,
        after_breakglass_user: events.len(),
        breakglass_event: events.first().and_then(|e| e.entry.as_ref()).map(|e| e.event.clone()),
    })
}

/// Run Scenario 3: Query Logging and Break-Glass.
pub fn run_scenario() -> AuditResult<()> {
    println!("=== Scenario 3: Query Logging and Break-Glass ===");
    println!();

    let clinic = Clinic::open(clinic_settings()?)?;
    let settings = clinic.policy.settings();
    println!("  audit_events_query:    {}", settings.audit_events_query);
    println!("  force_log_breakglass:  {}", settings.force_log_breakglass);
    println!("  Statement:             {STATEMENT}");
    println!();

    let outcome = execute(&clinic)?;

    println!("  Sub-case A: {NURSE_JONES} (ordinary access)");
    println!("    Rows returned:       {}", outcome.rows_returned);
    println!("    Events recorded:     {}", outcome.after_ordinary_user);
    println!("    RESULT: not audited (expected)");
    println!();

    println!("  Sub-case B: {ER_DOC} (breakglass group)");
    println!("    Events recorded:     {}", outcome.after_breakglass_user - outcome.after_ordinary_user);
    println!("    Event:               {}", outcome.breakglass_event.as_deref().unwrap_or("-"));
    println!("    RESULT: audited under forced break-glass logging (expected)");
    println!();

    println!("  Sub-case C: {ER_DOC} reads a table outside the audit taxonomy");
    let before = clinic.events()?.len();
    let tables = clinic.connection.query(&session(ER_DOC), UNMAPPED, &[])?;
    println!("    Rows returned:       {}", tables.len());
    let after = clinic.events()?.len();
    println!("    Events recorded:     {}", after - before);
    println!("    RESULT: unmapped reads are never audited (expected)");
    println!();
    Ok(())
}
