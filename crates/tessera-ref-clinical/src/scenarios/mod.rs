//! Runnable audit scenarios against the reference clinic.
//!
//! Each scenario opens its own seeded clinic, drives statements through the
//! audited connection, and reads the trail back through the query service.
//! `execute` returns what was recorded so tests can check it; `run_scenario`
//! prints a walkthrough.

pub mod facility_insert;
pub mod list_delete;
pub mod patient_update;
pub mod remote_disabled;
pub mod select_gating;
pub mod tamper_evidence;

use tessera_contracts::value::{FieldMap, FieldValue};

/// `{col='value', ...}` for printing an image.
pub(crate) fn render(image: Option<&FieldMap>) -> String {
    let Some(image) = image else {
        return "(none)".to_string();
    };
    let fields: Vec<String> = image
        .iter()
        .map(|(column, value)| match value {
            FieldValue::Null => format!("{column}=NULL"),
            FieldValue::Text(s) => format!("{column}='{s}'"),
            FieldValue::Binary(b) => format!("{column}=<{} bytes>", b.len()),
        })
        .collect();
    format!("{{{}}}", fields.join(", "))
}
