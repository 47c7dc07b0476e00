//! Reviewer-facing presentation of stored events.

use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use regex::Regex;

use tessera_contracts::{
    comment::{CommentPayload, StatementKind},
    event::{DisclosureRecord, SourceContext, StoredEvent},
    value::FieldValue,
};

use crate::codec::{CommentCodec, DecodedComment};

lazy_static! {
    static ref WHERE_ID: Regex = Regex::new(r#"(\w+)\s*=\s*['"]?(\d+)['"]?"#).unwrap();
}

const TABLE_LABELS: [(&str, &str); 6] = [
    ("prescriptions", "Medications"),
    ("form_vitals", "Vital Signs"),
    ("immunizations", "Immunizations"),
    ("history_data", "History"),
    ("insurance_data", "Insurance"),
    ("patient_data", "Patient Demographics"),
];

fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Display name of `table`. List rows are named after their `type` column,
/// e.g. `medical_problem` becomes `Medical Problem`.
pub fn human_table_name(table: &str, payload: &CommentPayload) -> String {
    if table == "lists" || table == "lists_touch" {
        let list_type = payload
            .after
            .as_ref()
            .and_then(|after| after.get("type"))
            .and_then(FieldValue::as_text);
        if let Some(list_type) = list_type {
            return list_type.split('_').map(ucfirst).collect::<Vec<_>>().join(" ");
        }
    }
    TABLE_LABELS
        .iter()
        .find(|(t, _)| *t == table)
        .map_or_else(|| ucfirst(table), |(_, label)| (*label).to_string())
}

/// One-line summary of a structured comment, e.g. `Updated Patient Demographics #42`.
pub fn summarize(payload: &CommentPayload) -> String {
    let name = human_table_name(&payload.table, payload);
    match payload.kind {
        StatementKind::Update => {
            let mut text = format!("Updated {name}");
            if let Some(caps) = payload.where_clause.as_deref().and_then(|w| WHERE_ID.captures(w)) {
                text.push_str(&format!(" #{}", &caps[2]));
            }
            text
        }
        StatementKind::Insert => format!("Created new {name}"),
        StatementKind::Delete => format!("Deleted {name}"),
        StatementKind::Select | StatementKind::Replace => format!("Query {name}"),
    }
}

/// Viewer label for an event name: a trailing `select` reads as `Query`.
pub fn display_event(event: &str) -> String {
    match event.strip_suffix("select") {
        Some(head) => format!("{head}Query"),
        None => event.to_string(),
    }
}

/// Event name without its trailing `-<action>` segment.
pub fn event_family(event: &str) -> &str {
    match event.rfind('-') {
        Some(at) => &event[..at],
        None => event,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSummary {
    pub ip_address: String,
    pub method: String,
    pub request: String,
}

/// One row of the log viewer, from either the main log or the disclosure log.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerEntry {
    pub date: NaiveDateTime,
    pub event: String,
    pub category: String,
    pub user: String,
    pub cert_user: String,
    pub group: String,
    pub patient_id: Option<i64>,
    /// `None` for disclosures, which carry no outcome.
    pub success: Option<bool>,
    pub comments: DecodedComment,
    pub source: Option<SourceContext>,
    pub summary: Option<String>,
    /// `(encrypted, version)` of the stored comment.
    pub encryption: Option<(bool, u8)>,
    pub api: Option<ApiSummary>,
    pub is_disclosure: bool,
}

impl ViewerEntry {
    /// Decode a main-log row. Returns `None` when the log row is missing.
    pub fn from_stored(stored: &StoredEvent, codec: &CommentCodec) -> Option<Self> {
        let entry = stored.entry.as_ref()?;
        let envelope = &stored.envelope;
        let comments = codec.open(&entry.comments, envelope.encrypted, envelope.version);
        let summary = match &comments {
            DecodedComment::Structured(payload) => Some(summarize(payload)),
            _ => None,
        };
        Some(Self {
            date: entry.timestamp,
            event: display_event(&entry.event),
            category: entry.category.clone().unwrap_or_default(),
            user: entry.user.clone(),
            cert_user: entry.cert_user.clone(),
            group: entry.group.clone(),
            patient_id: entry.patient_id,
            success: Some(entry.success),
            comments,
            source: Some(entry.source.clone()),
            summary,
            encryption: Some((envelope.encrypted, envelope.version)),
            api: stored.api.as_ref().map(|api| ApiSummary {
                ip_address: api.detail.ip_address.clone(),
                method: api.detail.method.clone(),
                request: api.detail.request.clone(),
            }),
            is_disclosure: false,
        })
    }

    pub fn from_disclosure(record: &DisclosureRecord) -> Self {
        Self {
            date: record.date,
            event: record.event.clone(),
            category: String::new(),
            user: record.user.clone(),
            cert_user: String::new(),
            group: String::new(),
            patient_id: Some(record.patient_id),
            success: None,
            comments: DecodedComment::Text(format!(
                "Recipient Name:{};Disclosure Info:{}",
                record.recipient, record.description
            )),
            source: None,
            summary: None,
            encryption: None,
            api: None,
            is_disclosure: true,
        }
    }
}
