//! tessera Clinical Audit Reference: Demo CLI
//!
//! Runs the reference clinic scenarios, prints the log viewer for a populated
//! clinic, or verifies every stored checksum.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- patient-update
//!   cargo run -p demo -- log --event patient-record --sort date --direction desc
//!   cargo run -p demo -- verify --settings audit.toml

use std::path::PathBuf;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tessera_audit::GenericEvent;
use tessera_contracts::{error::AuditResult, query::EventFilter, settings::AuditSettings};
use tessera_policy::settings;
use tessera_ref_clinical::{
    clinic::{clinic_settings, everything, session, Clinic},
    mock_data::{DEFAULT_GROUP, DR_SMITH, NURSE_JONES, PATIENT_JOHN_DOE},
    scenarios::{facility_insert, list_delete, patient_update, remote_disabled, select_gating, tamper_evidence},
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// tessera: tamper-evident SQL audit logging, clinical reference demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "tessera clinical audit reference demo",
    long_about = "Runs tessera reference scenarios showing statement capture,\n\
                  break-glass logging, encrypted comments, and checksum verification."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Scenario 1: UPDATE with before/after images.
    PatientUpdate,
    /// Scenario 2: INSERT into a security-administration table.
    FacilityInsert,
    /// Scenario 3: SELECT gating and forced break-glass logging.
    SelectGating,
    /// Scenario 4: DELETE categorized from the statement text.
    ListDelete,
    /// Scenario 5: ATNA transport with no repository configured.
    RemoteDisabled,
    /// Scenario 6: encrypted comments and tamper detection.
    TamperEvidence,
    /// Populate a clinic and print its audit log.
    Log(LogArgs),
    /// Populate a clinic and verify every stored checksum.
    Verify(SettingsArg),
}

#[derive(Args)]
struct SettingsArg {
    /// Audit settings TOML. Defaults to the reference clinic settings.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Args)]
struct LogArgs {
    #[command(flatten)]
    settings: SettingsArg,
    /// Event name prefix, e.g. `patient-record` or `disclosure`.
    #[arg(long, default_value = "")]
    event: String,
    /// Action suffix, e.g. `update`.
    #[arg(long = "type", default_value = "")]
    event_type: String,
    #[arg(long, default_value = "")]
    user: String,
    #[arg(long, default_value = "")]
    patient: String,
    /// Sort column; unknown columns are ignored.
    #[arg(long, default_value = "")]
    sort: String,
    #[arg(long, default_value = "asc")]
    direction: String,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for the engine's decisions.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::PatientUpdate => patient_update::run_scenario(),
        Command::FacilityInsert => facility_insert::run_scenario(),
        Command::SelectGating => select_gating::run_scenario(),
        Command::ListDelete => list_delete::run_scenario(),
        Command::RemoteDisabled => remote_disabled::run_scenario(),
        Command::TamperEvidence => tamper_evidence::run_scenario(),
        Command::Log(args) => print_log(&args),
        Command::Verify(args) => verify(&args),
    };

    match result {
        Ok(()) => {
            println!("Done.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all() -> AuditResult<()> {
    patient_update::run_scenario()?;
    facility_insert::run_scenario()?;
    select_gating::run_scenario()?;
    list_delete::run_scenario()?;
    remote_disabled::run_scenario()?;
    tamper_evidence::run_scenario()?;
    Ok(())
}

// ── Populated clinic ──────────────────────────────────────────────────────────

fn load_settings(arg: &SettingsArg) -> AuditResult<AuditSettings> {
    match &arg.settings {
        Some(path) => settings::from_file(path),
        None => clinic_settings(),
    }
}

/// A clinic with a morning's worth of activity.
fn populated_clinic(settings: AuditSettings) -> AuditResult<Clinic> {
    let clinic = Clinic::open(settings)?;
    let recorder = &clinic.recorder;

    let mut login = GenericEvent::new("login", DR_SMITH, DEFAULT_GROUP, true);
    login.comments = "success: 10.20.0.31".to_string();
    recorder.new_event(&login)?;

    patient_update::execute(&clinic)?;
    facility_insert::execute(&clinic)?;
    list_delete::execute(&clinic)?;

    recorder.audit_setting_changed(&session(DR_SMITH), "force_log_breakglass", true)?;
    recorder.log_http_request(
        &session(NURSE_JONES).with_patient(PATIENT_JOHN_DOE),
        "GET",
        "/api/patient/42/medication",
        Some("active=1"),
    )?;

    clinic.query_service().record_disclosure(
        Local::now().naive_local(),
        "disclosure-treatment",
        PATIENT_JOHN_DOE,
        "Riverside Cardiology",
        "Medication list and recent vitals",
        DR_SMITH,
    )?;

    info!(events = clinic.events()?.len(), "demo clinic populated");
    Ok(clinic)
}

fn print_log(args: &LogArgs) -> AuditResult<()> {
    let clinic = populated_clinic(load_settings(&args.settings)?)?;
    let filter = EventFilter {
        user: args.user.clone(),
        patient: args.patient.clone(),
        event_name: args.event.clone(),
        event_type: args.event_type.clone(),
        sort_by: args.sort.clone(),
        direction: args.direction.clone(),
        ..everything()
    };

    let service = clinic.query_service();
    println!("Event families: {}", service.event_names()?.join(", "));
    println!();

    let rows = service.viewer_entries(&filter)?;
    println!(
        "{:<19}  {:<34}  {:<22}  {:<12}  {:<7}  {:<7}  Comments",
        "Date", "Event", "Category", "User", "Patient", "Success"
    );
    for row in &rows {
        let comments = row.summary.clone().unwrap_or_else(|| row.comments.display_text());
        println!(
            "{:<19}  {:<34}  {:<22}  {:<12}  {:<7}  {:<7}  {}",
            row.date.format("%Y-%m-%d %H:%M:%S").to_string(),
            row.event,
            row.category,
            row.user,
            row.patient_id.map_or(String::new(), |p| p.to_string()),
            row.success.map_or("-", |s| if s { "yes" } else { "no" }),
            comments
        );
    }
    println!();
    println!("{} row(s)", rows.len());
    Ok(())
}

fn verify(args: &SettingsArg) -> AuditResult<()> {
    let clinic = populated_clinic(load_settings(args)?)?;
    let report = clinic.verify()?;
    println!("Checked:  {} event(s)", report.checked);
    for finding in &report.findings {
        println!("Finding:  log #{} {:?}", finding.log_id, finding.problem);
    }
    println!("Status:   {}", if report.is_clean() { "VERIFIED" } else { "TAMPERING DETECTED" });
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("tessera: Tamper-evident Clinical Audit Trail");
    println!("Reference Clinic Demo");
    println!("=============================================");
    println!();
    println!("Per audited statement:");
    println!("  [1] Policy gate: audit switches, category flags, break-glass override");
    println!("  [2] Previous values read for UPDATE / REPLACE");
    println!("  [3] Statement executes on the host database");
    println!("  [4] Structured comment built, sealed, SHA3-512 checksummed");
    println!("  [5] Log row, envelope, and API row written in one transaction");
    println!("  [6] Best-effort forward to the ATNA repository");
    println!();
}
