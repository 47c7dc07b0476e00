//! The structured (version 5) comment payload.
//!
//! Every SQL-originated event carries one of these, serialized to JSON before
//! it is encoded or encrypted for storage. Older stored formats are decoded by
//! `tessera-audit`; this module only describes the current shape.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::value::{FieldMap, SqlValue};

/// Comment format version written by the recorder.
pub const STRUCTURED_COMMENT_VERSION: u8 = 5;

/// Comment format version for plain-text comments (base64-encoded at rest).
pub const PLAIN_COMMENT_VERSION: u8 = 4;

/// The statement kinds the classifier distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Update,
    Insert,
    Delete,
    Replace,
}

impl StatementKind {
    /// Keyword order used when classifying a statement.
    pub const ALL: [StatementKind; 5] = [
        StatementKind::Select,
        StatementKind::Update,
        StatementKind::Insert,
        StatementKind::Delete,
        StatementKind::Replace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Update => "update",
            StatementKind::Insert => "insert",
            StatementKind::Delete => "delete",
            StatementKind::Replace => "replace",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the audited statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Failure,
}

impl From<bool> for EventStatus {
    fn from(success: bool) -> Self {
        if success {
            EventStatus::Success
        } else {
            EventStatus::Failure
        }
    }
}

/// The JSON document stored in `log.comments` for SQL events.
///
/// For UPDATE statements `before` and `after` always carry the same key set:
/// the viewer diffs them per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPayload {
    pub version: u8,

    #[serde(rename = "type")]
    pub kind: StatementKind,

    pub status: EventStatus,

    /// Bind-substituted statement text, base64-encoded.
    pub raw_query: String,

    /// Best-effort target table; empty when nothing could be parsed.
    #[serde(default)]
    pub table: String,

    /// Raw WHERE clause text (UPDATE only).
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<FieldMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<FieldMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_parameters: Option<Vec<SqlValue>>,
}

impl CommentPayload {
    /// Start a payload for `kind` with the raw query base64-encoded.
    pub fn new(kind: StatementKind, success: bool, raw_query: &str) -> Self {
        Self {
            version: STRUCTURED_COMMENT_VERSION,
            kind,
            status: success.into(),
            raw_query: BASE64.encode(raw_query.as_bytes()),
            table: String::new(),
            where_clause: None,
            before: None,
            after: None,
            bind_parameters: None,
        }
    }

    /// Decode `raw_query` back into statement text.
    ///
    /// Returns `None` when the stored value is not valid base64 or UTF-8.
    pub fn decoded_raw_query(&self) -> Option<String> {
        let bytes = BASE64.decode(&self.raw_query).ok()?;
        String::from_utf8(bytes).ok()
    }
}
