//! Acting identity for an audited call.

use serde::{Deserialize, Serialize};

/// Who is acting, and on which patient, at the moment a statement runs.
///
/// The patient id is ambient request state: patient-record events take it
/// from here, never from the SQL text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user: String,
    pub group: String,
    pub patient_id: Option<i64>,
    /// Common name from the requester's TLS client certificate, if any.
    pub cert_user: String,
}

impl SessionContext {
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
            ..Self::default()
        }
    }

    pub fn with_patient(mut self, patient_id: i64) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn with_cert_user(mut self, cert_user: impl Into<String>) -> Self {
        self.cert_user = cert_user.into();
        self
    }
}
