//! Error types for the tessera audit engine.
//!
//! Only failures that a caller has to act on are represented here. SQL parse
//! misses never become errors (the classifier reports a confidence tag
//! instead), and transport failures are swallowed inside the ATNA crate after
//! being logged.

use thiserror::Error;

/// The unified error type for the tessera crates.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Writing the log row, its envelope, or its API detail row failed.
    ///
    /// Propagated to the caller: a committed mutation without an audit row is
    /// a compliance gap.
    #[error("audit persistence failed: {reason}")]
    Persistence { reason: String },

    /// The encryption provider could not encrypt or decrypt a payload.
    ///
    /// Fatal on the write path. The read path substitutes a placeholder.
    #[error("audit encryption failed: {reason}")]
    Encryption { reason: String },

    /// The host database rejected a statement or an unaudited lookup.
    #[error("database error: {reason}")]
    Database { reason: String },

    /// Delivery to the remote audit repository failed.
    #[error("audit transport failed: {reason}")]
    Transport { reason: String },

    /// A settings document is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A stored checksum does not match its recomputed value.
    #[error("integrity check failed: {reason}")]
    Integrity { reason: String },
}

/// Convenience alias used throughout the tessera crates.
pub type AuditResult<T> = Result<T, AuditError>;
