//! # tessera-ref-clinical
//!
//! Reference clinic for the tessera audit engine.
//!
//! A seeded in-memory SQLite database plays the host clinical records
//! system. The audit tables live on the same connection. Six scenarios drive
//! real statements through [`AuditedConnection`](tessera_core::AuditedConnection):
//!
//! 1. **Patient Demographics Update**: before/after images of an UPDATE.
//! 2. **New Facility**: INSERT into a security-administration table.
//! 3. **Query Logging and Break-Glass**: reads skipped, except forced
//!    logging of break-glass users.
//! 4. **Medication Removed**: list category sniffed from the statement.
//! 5. **Remote Repository Not Configured**: ATNA transport stays silent.
//! 6. **Encrypted Trail and Tamper Evidence**: checksums catch edited rows.
//!
//! All data is hardcoded and fictional. Nothing leaves the process.

pub mod clinic;
pub mod clinical_db;
pub mod mock_data;
pub mod scenarios;

pub use clinic::Clinic;
pub use clinical_db::ClinicalDb;
