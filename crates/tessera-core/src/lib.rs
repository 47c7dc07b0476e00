//! # tessera-core
//!
//! The statement interception layer of the tessera audit engine.
//!
//! This crate provides:
//! - The capability traits (`Database`, `StatementPolicy`, `SqlEventRecorder`,
//!   `AuditStore`, `EncryptionProvider`, `AuditTransport`)
//! - `AuditedConnection`, which runs the policy gate, snapshot, execution, and
//!   recording steps in order for every host statement
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_core::{AuditedConnection, traits::{Database, StatementPolicy, SqlEventRecorder}};
//! ```

pub mod connection;
pub mod traits;

pub use connection::AuditedConnection;
