//! The log query service and disclosure management.

use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use tessera_contracts::{
    error::{AuditError, AuditResult},
    event::{DisclosureRecord, StoredEvent},
    query::{
        DisclosureQuery, DisclosureSortColumn, EventFilter, EventQuery, LogSortColumn, SortDirection,
        RESULT_CAP,
    },
};
use tessera_core::traits::AuditStore;

use crate::{
    codec::CommentCodec,
    viewer::{event_family, ViewerEntry},
};

/// Event family under which disclosures are listed.
pub const DISCLOSURE_EVENT: &str = "disclosure";

/// The queries a viewer filter resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub events: EventQuery,
    /// Present when the filter selects no event family, or the disclosure family.
    pub disclosures: Option<DisclosureQuery>,
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    (day.and_time(NaiveTime::MIN), day.and_time(end))
}

/// Resolve a viewer filter. Missing dates default to the whole of `today`.
///
/// An event name and type combine into a single `<name>-<type>` prefix. A
/// type alone is matched as a suffix. Unknown sort columns are ignored.
pub fn plan(filter: &EventFilter, today: NaiveDate) -> QueryPlan {
    let (day_start, day_end) = day_bounds(today);
    let start = filter.start.unwrap_or(day_start);
    let end = filter.end.unwrap_or(day_end);

    let name = filter.event_name.trim();
    let kind = filter.event_type.trim();
    let (prefix, suffix) = match (name.is_empty(), kind.is_empty()) {
        (false, false) => (Some(format!("{name}-{kind}")), None),
        (false, true) => (Some(name.to_string()), None),
        (true, false) => (None, Some(kind.to_string())),
        (true, true) => (None, None),
    };

    let direction = SortDirection::parse_or_default(&filter.direction);
    let sort = LogSortColumn::parse(&filter.sort_by).map(|c| (c, direction));
    if sort.is_none() && !filter.sort_by.trim().is_empty() {
        debug!(column = %filter.sort_by, "unknown sort column ignored");
    }

    let user = non_empty(&filter.user);
    let patient = non_empty(&filter.patient);

    let disclosures = (name == DISCLOSURE_EVENT || prefix.is_none()).then(|| DisclosureQuery {
        start,
        end,
        user: user.clone(),
        patient: patient.clone(),
        event_prefix: None,
        sort: DisclosureSortColumn::parse(&filter.sort_by),
        limit: RESULT_CAP,
    });

    QueryPlan {
        events: EventQuery {
            start,
            end,
            user,
            patient,
            event_prefix: prefix,
            event_suffix: suffix,
            sort,
            limit: RESULT_CAP,
        },
        disclosures,
    }
}

/// Read access to the audit store for log viewers, plus disclosure CRUD.
pub struct QueryService {
    store: Arc<dyn AuditStore>,
    codec: CommentCodec,
}

impl QueryService {
    /// `codec` must hold the provider that can read encrypted rows.
    pub fn new(store: Arc<dyn AuditStore>, codec: CommentCodec) -> Self {
        Self { store, codec }
    }

    /// Raw stored events for a filter, newest first unless sorted.
    pub fn get_events(&self, filter: &EventFilter) -> AuditResult<Vec<StoredEvent>> {
        let plan = plan(filter, Local::now().date_naive());
        self.store.fetch_events(&plan.events)
    }

    /// Decoded viewer rows: main-log rows first, then disclosures when the
    /// filter selects them. Rows whose log entry is missing are skipped.
    pub fn viewer_entries(&self, filter: &EventFilter) -> AuditResult<Vec<ViewerEntry>> {
        self.viewer_entries_on(filter, Local::now().date_naive())
    }

    pub fn viewer_entries_on(&self, filter: &EventFilter, today: NaiveDate) -> AuditResult<Vec<ViewerEntry>> {
        let plan = plan(filter, today);

        let stored = self.store.fetch_events(&plan.events)?;
        let mut entries: Vec<ViewerEntry> = stored
            .iter()
            .filter_map(|s| ViewerEntry::from_stored(s, &self.codec))
            .collect();
        let skipped = stored.len() - entries.len();
        if skipped > 0 {
            debug!(skipped, "envelopes without a log row skipped");
        }

        if let Some(query) = &plan.disclosures {
            let disclosures = self.store.fetch_disclosures(query)?;
            entries.extend(disclosures.iter().map(ViewerEntry::from_disclosure));
        }
        Ok(entries)
    }

    /// Event families for the viewer's event picker, sorted and unique.
    pub fn event_names(&self) -> AuditResult<Vec<String>> {
        let mut names: Vec<String> = self
            .store
            .event_names()?
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(|e| event_family(e).to_string())
            .collect();
        if self.store.has_disclosures()? {
            names.push(DISCLOSURE_EVENT.to_string());
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Record a disclosure and return its id.
    pub fn record_disclosure(
        &self,
        date: NaiveDateTime,
        event: &str,
        patient_id: i64,
        recipient: &str,
        description: &str,
        user: &str,
    ) -> AuditResult<i64> {
        let record = DisclosureRecord {
            id: None,
            date,
            event: event.to_string(),
            user: user.to_string(),
            recipient: recipient.to_string(),
            patient_id,
            description: description.to_string(),
        };
        let id = self.store.insert_disclosure(&record)?;
        debug!(id, patient_id, "disclosure recorded");
        Ok(id)
    }

    /// Edit the date, event, recipient, and description of a disclosure.
    pub fn update_disclosure(
        &self,
        id: i64,
        date: NaiveDateTime,
        event: &str,
        recipient: &str,
        description: &str,
    ) -> AuditResult<()> {
        if id <= 0 {
            return Err(AuditError::Persistence {
                reason: format!("invalid disclosure id {id}"),
            });
        }
        let record = DisclosureRecord {
            id: Some(id),
            date,
            event: event.to_string(),
            user: String::new(),
            recipient: recipient.to_string(),
            patient_id: 0,
            description: description.to_string(),
        };
        self.store.update_disclosure(&record)
    }

    pub fn delete_disclosure(&self, id: i64) -> AuditResult<()> {
        self.store.delete_disclosure(id)
    }
}
