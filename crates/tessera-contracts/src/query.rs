//! Viewer filters and the validated queries built from them.
//!
//! `EventFilter` is raw viewer input. `tessera_audit::query` resolves it into
//! either an `EventQuery` (main structured log) or a `DisclosureQuery`
//! (disclosure log). Sort columns are closed enums, so an unknown column name
//! can never reach SQL text.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Maximum rows returned by any viewer query.
pub const RESULT_CAP: usize = 5000;

/// Raw filter parameters from a log viewer. Empty strings mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub user: String,
    /// Patient id pattern (SQL LIKE semantics).
    pub patient: String,
    /// Event name prefix, e.g. `patient-record`.
    pub event_name: String,
    /// Action suffix, e.g. `update`.
    pub event_type: String,
    /// Requested sort column, validated against the target family.
    pub sort_by: String,
    /// `asc` or `desc`; anything else falls back to ascending.
    pub direction: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse a direction, clamping unknown input to ascending.
    pub fn parse_or_default(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sortable columns of the main log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSortColumn {
    Date,
    Event,
    Category,
    User,
    GroupName,
    PatientId,
    Success,
    Comments,
    CertUser,
    Id,
}

impl LogSortColumn {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "date" => LogSortColumn::Date,
            "event" => LogSortColumn::Event,
            "category" => LogSortColumn::Category,
            "user" => LogSortColumn::User,
            "groupname" => LogSortColumn::GroupName,
            "patient_id" => LogSortColumn::PatientId,
            "success" => LogSortColumn::Success,
            "comments" => LogSortColumn::Comments,
            "crt_user" => LogSortColumn::CertUser,
            "id" => LogSortColumn::Id,
            _ => return None,
        })
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            LogSortColumn::Date => "l.date",
            LogSortColumn::Event => "l.event",
            LogSortColumn::Category => "l.category",
            LogSortColumn::User => "l.user",
            LogSortColumn::GroupName => "l.groupname",
            LogSortColumn::PatientId => "l.patient_id",
            LogSortColumn::Success => "l.success",
            LogSortColumn::Comments => "l.comments",
            LogSortColumn::CertUser => "l.crt_user",
            LogSortColumn::Id => "l.id",
        }
    }
}

/// Sortable columns of the disclosure log. There is no category, success, or
/// group column in this family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisclosureSortColumn {
    Date,
    Event,
    User,
    Recipient,
    PatientId,
    Description,
}

impl DisclosureSortColumn {
    /// Parse a viewer column name. `comments` maps to `description`.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "date" => DisclosureSortColumn::Date,
            "event" => DisclosureSortColumn::Event,
            "user" => DisclosureSortColumn::User,
            "recipient" => DisclosureSortColumn::Recipient,
            "patient_id" => DisclosureSortColumn::PatientId,
            "comments" | "description" => DisclosureSortColumn::Description,
            _ => return None,
        })
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            DisclosureSortColumn::Date => "date",
            DisclosureSortColumn::Event => "event",
            DisclosureSortColumn::User => "user",
            DisclosureSortColumn::Recipient => "recipient",
            DisclosureSortColumn::PatientId => "patient_id",
            DisclosureSortColumn::Description => "description",
        }
    }
}

/// Validated query against the main log joined with envelopes and API rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub user: Option<String>,
    pub patient: Option<String>,
    /// LIKE `<prefix>%` on the event name.
    pub event_prefix: Option<String>,
    /// LIKE `%<suffix>` on the event name.
    pub event_suffix: Option<String>,
    /// `None` sorts by log id, newest first.
    pub sort: Option<(LogSortColumn, SortDirection)>,
    pub limit: usize,
}

/// Validated query against the disclosure log. Sorting is always descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureQuery {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub user: Option<String>,
    pub patient: Option<String>,
    pub event_prefix: Option<String>,
    pub sort: Option<DisclosureSortColumn>,
    pub limit: usize,
}
