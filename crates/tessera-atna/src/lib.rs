//! tessera-atna: forwarding of audit events to a remote ATNA repository.
//!
//! `message` renders an event as an RFC 3881 audit message behind an RFC 5425
//! syslog header. `transport` delivers it over TLS (rustls) with optional
//! client authentication, and implements `AuditTransport` so the recorder can
//! hand it every persisted event.

pub mod message;
pub mod transport;

pub use message::{build_message, NodeIdentity};
pub use transport::{client_config, AtnaTransport, Connector, TlsConnector};
