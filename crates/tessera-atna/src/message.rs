//! RFC 3881 audit messages with an RFC 5425 syslog header.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use quick_xml::escape::escape;

use tessera_core::traits::OutboundEvent;

/// Application tag appended to the local node name in the source participant.
pub const APPLICATION: &str = "tessera";

/// Display name under which patient-scoped events are reported.
pub const PATIENT_RECORD: &str = "Patient Record";

/// Identity of both ends of the connection, as reported in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Local node name, used in the syslog header.
    pub server_name: String,
    /// Local node network address.
    pub server_addr: String,
    /// Remote repository host.
    pub destination: String,
}

impl NodeIdentity {
    fn source_user_id(&self) -> String {
        format!("{}|{APPLICATION}", self.server_name)
    }
}

/// Whether the event created, read, updated, deleted, or executed something.
pub fn event_action_code(event: &str) -> char {
    const SUFFIXES: [(&str, char); 5] = [
        ("-create", 'C'),
        ("-insert", 'C'),
        ("-select", 'R'),
        ("-update", 'U'),
        ("-delete", 'D'),
    ];
    SUFFIXES
        .iter()
        .find(|(suffix, _)| event.ends_with(suffix))
        .map_or('E', |(_, code)| *code)
}

/// Human-readable EventID for an event name. Unknown events keep their name.
pub fn event_display_name(event: &str) -> Cow<'_, str> {
    const NAMES: [(&str, &str); 6] = [
        ("patient-record", PATIENT_RECORD),
        ("view", PATIENT_RECORD),
        ("login", "Login"),
        ("logout", "Logout"),
        ("scheduling", "Patient Care Assignment"),
        ("security-administration", "Security Administration"),
    ];
    NAMES
        .iter()
        .find(|(needle, _)| event.contains(needle))
        .map_or(Cow::Borrowed(event), |(_, name)| Cow::Borrowed(*name))
}

/// 0 for success, 4 for a minor failure.
pub fn outcome_indicator(success: bool) -> u8 {
    if success {
        0
    } else {
        4
    }
}

/// Build the full syslog frame for one event, stamped with `at`.
///
/// The patient participant block is present only for patient-record events
/// that carry a non-zero patient id.
pub fn build_message(event: &OutboundEvent, node: &NodeIdentity, at: DateTime<FixedOffset>) -> String {
    let timestamp = at.to_rfc3339_opts(SecondsFormat::Secs, false);
    let display_name = event_display_name(&event.event);
    let source_user = node.source_user_id();

    let patient_block = if display_name == PATIENT_RECORD && event.patient_id != 0 {
        format!(
            "<ParticipantObjectIdentification ParticipantObjectID=\"{}\" ParticipantObjectTypeCode=\"1\" ParticipantObjectTypeCodeRole=\"1\">\n \
             <ParticipantObjectIDTypeCode code=\"2\" displayName=\"Patient Number\" codeSystemName=\"RFC-3881\" />\n\
             </ParticipantObjectIdentification>",
            event.patient_id
        )
    } else {
        String::new()
    };

    format!(
        "<13>{timestamp} {server}\n\
         <?xml version=\"1.0\" encoding=\"ASCII\"?>\n \
         <AuditMessage xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:noNamespaceSchemaLocation=\"healthcare-security-audit.xsd\">\n  \
         <EventIdentification EventActionCode=\"{action}\" EventDateTime=\"{timestamp}\" EventOutcomeIndicator=\"{outcome}\">\n   \
         <EventID code=\"eventIDcode\" displayName=\"{display}\" codeSystemName=\"DCM\" />\n  \
         </EventIdentification>\n  \
         <ActiveParticipant UserID=\"{source}\" UserIsRequestor=\"true\" NetworkAccessPointID=\"{source_addr}\" NetworkAccessPointTypeCode=\"2\" >\n   \
         <RoleIDCode code=\"110153\" displayName=\"Source\" codeSystemName=\"DCM\" />\n  \
         </ActiveParticipant>\n  \
         <ActiveParticipant UserID=\"{dest}\" UserIsRequestor=\"false\" NetworkAccessPointID=\"{dest}\" NetworkAccessPointTypeCode=\"2\" >\n   \
         <RoleIDCode code=\"110152\" displayName=\"Destination\" codeSystemName=\"DCM\" />\n  \
         </ActiveParticipant>\n  \
         <AuditSourceIdentification AuditSourceID=\"{source}\" />\n  \
         <ParticipantObjectIdentification ParticipantObjectID=\"{user}\" ParticipantObjectTypeCode=\"1\" ParticipantObjectTypeCodeRole=\"6\" >\n   \
         <ParticipantObjectIDTypeCode code=\"11\" displayName=\"User Identifier\" codeSystemName=\"RFC-3881\" />\n  \
         </ParticipantObjectIdentification>\n  \
         {patient_block}\n \
         </AuditMessage>",
        server = escape(node.server_name.as_str()),
        action = event_action_code(&event.event),
        outcome = outcome_indicator(event.success),
        display = escape(&*display_name),
        source = escape(source_user.as_str()),
        source_addr = escape(node.server_addr.as_str()),
        dest = escape(node.destination.as_str()),
        user = escape(event.user.as_str()),
    )
}
