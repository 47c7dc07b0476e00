//! One fully wired clinic: host database, audit store, policy, recorder.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use tessera_audit::{
    codec::DecodedComment,
    integrity::{self, IntegrityReport},
    AuditRecorder, CommentCodec, QueryService, SqliteAuditStore, ViewerEntry,
};
use tessera_contracts::{
    comment::CommentPayload,
    error::AuditResult,
    event::StoredEvent,
    query::EventFilter,
    session::SessionContext,
    settings::AuditSettings,
};
use tessera_core::{
    traits::{AuditTransport, EncryptionProvider, NullTransport},
    AuditedConnection,
};
use tessera_policy::{settings, AuditPolicy};

use crate::{clinical_db::ClinicalDb, mock_data::DEFAULT_GROUP};

/// Settings the reference clinic ships with.
pub const CLINIC_SETTINGS: &str = include_str!("../settings/clinic.toml");

/// Load [`CLINIC_SETTINGS`].
pub fn clinic_settings() -> AuditResult<AuditSettings> {
    settings::from_toml_str(CLINIC_SETTINGS)
}

/// A session for `user` in the default group.
pub fn session(user: &str) -> SessionContext {
    SessionContext::new(user, DEFAULT_GROUP)
}

/// Filter covering every event the demo can produce.
pub fn everything() -> EventFilter {
    EventFilter {
        start: NaiveDate::from_ymd_opt(2000, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        end: NaiveDate::from_ymd_opt(2100, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        ..EventFilter::default()
    }
}

pub struct Clinic {
    pub db: Arc<ClinicalDb>,
    pub store: Arc<SqliteAuditStore>,
    pub policy: Arc<AuditPolicy>,
    pub recorder: Arc<AuditRecorder>,
    pub connection: AuditedConnection,
    codec: CommentCodec,
}

impl Clinic {
    /// A seeded clinic with no encryption provider and no transport.
    pub fn open(settings: AuditSettings) -> AuditResult<Self> {
        Self::open_with(settings, None, Arc::new(NullTransport))
    }

    /// A seeded clinic. Audit rows share the clinical database connection.
    pub fn open_with(
        settings: AuditSettings,
        provider: Option<Arc<dyn EncryptionProvider>>,
        transport: Arc<dyn AuditTransport>,
    ) -> AuditResult<Self> {
        let db = Arc::new(ClinicalDb::seeded()?);
        let store = Arc::new(SqliteAuditStore::with_connection(db.connection())?);
        let policy = Arc::new(AuditPolicy::new(Arc::new(settings), db.clone()));

        let mut recorder = AuditRecorder::new(policy.clone(), db.clone(), store.clone()).with_transport(transport);
        if let Some(provider) = &provider {
            recorder = recorder.with_encryption(provider.clone());
        }
        let recorder = Arc::new(recorder);
        let connection = AuditedConnection::new(db.clone(), policy.clone(), recorder.clone());
        debug!(encrypted = provider.is_some(), "reference clinic opened");

        Ok(Self {
            db,
            store,
            policy,
            recorder,
            connection,
            codec: CommentCodec::new(false, provider),
        })
    }

    pub fn query_service(&self) -> QueryService {
        QueryService::new(self.store.clone(), self.codec.clone())
    }

    /// Every stored event, newest first.
    pub fn events(&self) -> AuditResult<Vec<StoredEvent>> {
        self.query_service().get_events(&everything())
    }

    /// Viewer rows for every stored event and disclosure.
    pub fn viewer(&self) -> AuditResult<Vec<ViewerEntry>> {
        self.query_service().viewer_entries(&everything())
    }

    /// The newest event and its structured comment, if it has one.
    pub fn latest(&self) -> AuditResult<Option<(StoredEvent, Option<CommentPayload>)>> {
        let Some(event) = self.events()?.into_iter().next() else {
            return Ok(None);
        };
        let payload = event.entry.as_ref().and_then(|entry| {
            match self.codec.open(&entry.comments, event.envelope.encrypted, event.envelope.version) {
                DecodedComment::Structured(p) => Some(p),
                _ => None,
            }
        });
        Ok(Some((event, payload)))
    }

    pub fn verify(&self) -> AuditResult<IntegrityReport> {
        integrity::verify_all(self.store.as_ref(), &self.codec)
    }
}
