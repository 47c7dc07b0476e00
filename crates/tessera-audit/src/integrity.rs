//! Tamper detection: recompute every envelope checksum from the stored rows.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, warn};

use tessera_contracts::{
    error::AuditResult,
    event::{ApiDetail, StoredEvent},
    query::EventQuery,
};
use tessera_core::traits::AuditStore;

use crate::{checksum, codec::CommentCodec};

/// What is wrong with one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityProblem {
    /// The envelope exists but its log row does not.
    MissingLogRow,
    /// The log row no longer matches its checksum.
    LogChecksumMismatch,
    /// The envelope records an API checksum but the API row is gone.
    MissingApiRow,
    /// The API row no longer matches its checksum.
    ApiChecksumMismatch,
    /// The comment or API payload could not be decoded, so the row cannot be
    /// checked. Holds the decoder's explanation.
    Unverifiable(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityFinding {
    pub log_id: i64,
    pub problem: IntegrityProblem,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub checked: usize,
    pub findings: Vec<IntegrityFinding>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

fn open_api(codec: &CommentCodec, stored: &ApiDetail, encrypted: bool) -> Result<ApiDetail, &'static str> {
    Ok(ApiDetail {
        request_url: codec.open_field(&stored.request_url, encrypted)?,
        request_body: codec.open_field(&stored.request_body, encrypted)?,
        response: codec.open_field(&stored.response, encrypted)?,
        ..stored.clone()
    })
}

/// Check one stored event. Returns every problem found.
pub fn check_event(event: &StoredEvent, codec: &CommentCodec) -> Vec<IntegrityProblem> {
    let envelope = &event.envelope;
    let Some(entry) = &event.entry else {
        return vec![IntegrityProblem::MissingLogRow];
    };

    let mut problems = Vec::new();
    match codec.open_plaintext(&entry.comments, envelope.encrypted, envelope.version) {
        Ok(plaintext) => {
            if checksum::log_checksum(entry, &plaintext) != envelope.checksum {
                problems.push(IntegrityProblem::LogChecksumMismatch);
            }
        }
        Err(reason) => problems.push(IntegrityProblem::Unverifiable(reason)),
    }

    match &event.api {
        Some(api) => {
            match open_api(codec, &api.detail, envelope.encrypted) {
                Ok(plain) => {
                    if checksum::api_checksum(envelope.log_id, &plain, api.created_time) != envelope.checksum_api {
                        problems.push(IntegrityProblem::ApiChecksumMismatch);
                    }
                }
                Err(reason) => problems.push(IntegrityProblem::Unverifiable(reason)),
            }
        }
        None if !envelope.checksum_api.is_empty() => problems.push(IntegrityProblem::MissingApiRow),
        None => {}
    }
    problems
}

/// Verify every event stored between `start` and `end`.
pub fn verify_range(
    store: &dyn AuditStore,
    codec: &CommentCodec,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> AuditResult<IntegrityReport> {
    let query = EventQuery {
        start,
        end,
        user: None,
        patient: None,
        event_prefix: None,
        event_suffix: None,
        sort: None,
        limit: i64::MAX as usize,
    };
    let events = store.fetch_events(&query)?;

    let mut report = IntegrityReport {
        checked: events.len(),
        findings: Vec::new(),
    };
    for event in &events {
        for problem in check_event(event, codec) {
            warn!(log_id = event.envelope.log_id, problem = ?problem, "audit integrity problem");
            report.findings.push(IntegrityFinding {
                log_id: event.envelope.log_id,
                problem,
            });
        }
    }
    info!(checked = report.checked, findings = report.findings.len(), "audit integrity verified");
    Ok(report)
}

/// Verify the whole store.
pub fn verify_all(store: &dyn AuditStore, codec: &CommentCodec) -> AuditResult<IntegrityReport> {
    let earliest = NaiveDate::from_ymd_opt(1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    let latest = NaiveDate::from_ymd_opt(9999, 12, 31).and_then(|d| d.and_hms_opt(23, 59, 59));
    match (earliest, latest) {
        (Some(start), Some(end)) => verify_range(store, codec, start, end),
        _ => Ok(IntegrityReport::default()),
    }
}
