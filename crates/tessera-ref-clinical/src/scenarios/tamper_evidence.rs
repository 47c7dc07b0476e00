//! Scenario 6: Encrypted Trail and Tamper Evidence
//!
//! Comments are sealed with AES-256-GCM before they reach the `log` table.
//! The envelope checksum covers the plaintext, so a row edited behind the
//! engine's back no longer verifies.

use std::sync::Arc;

use tessera_audit::{codec::DecodedComment, integrity::IntegrityReport};
use tessera_contracts::{error::AuditResult, settings::AuditSettings, value::SqlValue};
use tessera_core::traits::{Database, EncryptionProvider, NullTransport};
use tessera_crypto::KeyringEncryptor;

use crate::{
    clinic::{clinic_settings, session, Clinic},
    mock_data::{DR_SMITH, PATIENT_JOHN_DOE},
};

#[derive(Debug)]
pub struct TamperOutcome {
    pub stored_comment: String,
    pub decoded: DecodedComment,
    pub before_tamper: IntegrityReport,
    pub after_tamper: IntegrityReport,
}

pub fn execute() -> AuditResult<TamperOutcome> {
    let settings = AuditSettings { encryption_enabled: true, ..clinic_settings()? };
    let provider: Arc<dyn EncryptionProvider> = Arc::new(KeyringEncryptor::new(KeyringEncryptor::generate_key()));
    let clinic = Clinic::open_with(settings, Some(provider), Arc::new(NullTransport))?;

    clinic.connection.execute(
        &session(DR_SMITH).with_patient(PATIENT_JOHN_DOE),
        "UPDATE patient_data SET DOB = ? WHERE id = ?",
        &[SqlValue::from("1968-04-21"), SqlValue::Integer(PATIENT_JOHN_DOE)],
    )?;

    let stored_comment = clinic
        .events()?
        .first()
        .and_then(|e| e.entry.as_ref())
        .map(|e| e.comments.clone())
        .unwrap_or_default();
    let decoded = clinic
        .viewer()?
        .into_iter()
        .next()
        .map_or(DecodedComment::Text(String::new()), |row| row.comments);
    let before_tamper = clinic.verify()?;

    // Straight to the host database, bypassing the audited connection.
    clinic
        .db
        .execute("UPDATE log SET user = ? WHERE user = ?", &[SqlValue::from("nurse_jones"), SqlValue::from(DR_SMITH)])?;
    let after_tamper = clinic.verify()?;

    Ok(TamperOutcome {
        stored_comment,
        decoded,
        before_tamper,
        after_tamper,
    })
}

/// Run Scenario 6: Encrypted Trail and Tamper Evidence.
pub fn run_scenario() -> AuditResult<()> {
    println!("=== Scenario 6: Encrypted Trail and Tamper Evidence ===");
    println!();

    let outcome = execute()?;
    let preview: String = outcome.stored_comment.chars().take(48).collect();
    println!("  Stored comment:      {preview}...");
    match &outcome.decoded {
        DecodedComment::Structured(payload) => {
            println!("  Decrypted payload:   {} on {}", payload.kind, payload.table)
        }
        other => println!("  Decrypted payload:   {}", other.display_text()),
    }
    println!(
        "  Before tampering:    {} ({} finding(s))",
        if outcome.before_tamper.is_clean() { "VERIFIED" } else { "FAILED" },
        outcome.before_tamper.findings.len()
    );
    println!("  Tamper:              UPDATE log SET user = 'nurse_jones' (unaudited)");
    for finding in &outcome.after_tamper.findings {
        println!("  Finding:             log #{} {:?}", finding.log_id, finding.problem);
    }
    println!(
        "  After tampering:     {}",
        if outcome.after_tamper.is_clean() { "VERIFIED" } else { "TAMPERING DETECTED" }
    );
    println!();
    Ok(())
}
