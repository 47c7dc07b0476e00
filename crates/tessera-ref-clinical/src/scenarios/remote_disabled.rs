//! Scenario 5: Remote Repository Not Configured
//!
//! The ATNA transport is wired in, but `atna.host` is empty. Every event is
//! still recorded locally and the connector is never asked to open a
//! connection. A second clinic with a host configured shows one frame per
//! event reaching the connector.

use std::sync::{Arc, Mutex};

use tessera_atna::{AtnaTransport, Connector};
use tessera_contracts::{
    error::{AuditError, AuditResult},
    settings::AuditSettings,
    value::SqlValue,
};

use crate::{
    clinic::{clinic_settings, session, Clinic},
    mock_data::{DR_SMITH, PATIENT_JOHN_DOE},
};

/// Stands in for the TLS connector and counts what it is asked to deliver.
/// Clones share one frame list.
#[derive(Clone, Default)]
pub struct CountingConnector {
    frames: Arc<Mutex<Vec<String>>>,
}

impl CountingConnector {
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl Connector for CountingConnector {
    fn deliver(&self, _host: &str, _port: u16, frame: &[u8]) -> AuditResult<()> {
        let mut frames = self.frames.lock().map_err(|e| AuditError::Transport {
            reason: format!("connector lock poisoned: {e}"),
        })?;
        frames.push(String::from_utf8_lossy(frame).into_owned());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutcome {
    pub local_events: usize,
    pub frames: Vec<String>,
}

/// Run one audited update through a clinic whose transport uses `settings.atna`.
pub fn execute(settings: AuditSettings) -> AuditResult<RemoteOutcome> {
    let connector = CountingConnector::default();
    let transport = AtnaTransport::with_connector(&settings.atna, Some(Box::new(connector.clone())));
    let clinic = Clinic::open_with(settings, None, Arc::new(transport))?;

    clinic.connection.execute(
        &session(DR_SMITH).with_patient(PATIENT_JOHN_DOE),
        "UPDATE patient_data SET lname = ? WHERE id = ?",
        &[SqlValue::from("Doe-Smith"), SqlValue::Integer(PATIENT_JOHN_DOE)],
    )?;

    Ok(RemoteOutcome {
        local_events: clinic.events()?.len(),
        frames: connector.frames(),
    })
}

/// Run Scenario 5: Remote Repository Not Configured.
pub fn run_scenario() -> AuditResult<()> {
    println!("=== Scenario 5: Remote Repository Not Configured ===");
    println!();

    let settings = clinic_settings()?;
    println!("  Sub-case A: atna.enabled = {}, atna.host = {:?}", settings.atna.enabled, settings.atna.host);
    let outcome = execute(settings.clone())?;
    println!("    Local events:        {}", outcome.local_events);
    println!("    Connections opened:  {}", outcome.frames.len());
    println!("    RESULT: transport is a no-op (expected)");
    println!();

    let mut active = settings;
    active.atna.enabled = true;
    active.atna.host = "audit.example.org".to_string();
    println!("  Sub-case B: atna.enabled = true, atna.host = {:?} (counting connector)", active.atna.host);
    let outcome = execute(active)?;
    println!("    Local events:        {}", outcome.local_events);
    println!("    Frames delivered:    {}", outcome.frames.len());
    if let Some(frame) = outcome.frames.first() {
        for line in frame.lines().take(4) {
            println!("    | {line}");
        }
    }
    println!();
    Ok(())
}
