//! Best-effort delivery of audit messages to a remote ATNA repository.
//!
//! Each event opens its own TLS connection, writes one syslog frame, and
//! closes. Every failure is logged and dropped: the local audit row is the
//! authoritative copy.

use std::io::Write;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{self, CryptoProvider};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme, StreamOwned};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use tracing::{debug, warn};

use tessera_contracts::{
    error::{AuditError, AuditResult},
    settings::AtnaSettings,
};
use tessera_core::traits::{AuditTransport, OutboundEvent};

use crate::message::{build_message, NodeIdentity};

/// Opens the connection to the repository and writes one frame.
pub trait Connector: Send + Sync {
    fn deliver(&self, host: &str, port: u16, frame: &[u8]) -> AuditResult<()>;
}

fn config_err(reason: impl std::fmt::Display) -> AuditError {
    AuditError::Config {
        reason: reason.to_string(),
    }
}

fn transport_err(reason: impl std::fmt::Display) -> AuditError {
    AuditError::Transport {
        reason: reason.to_string(),
    }
}

// ── Certificate verification ──

/// Accepts any server certificate. Used only when no CA file is configured,
/// which leaves the connection open to an impersonated repository.
#[derive(Debug)]
struct InsecureServerVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for InsecureServerVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn load_roots(path: &Path) -> AuditResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| config_err(format!("cannot read CA file {}: {e}", path.display())))?;
    for cert in certs {
        let cert = cert.map_err(|e| config_err(format!("bad certificate in {}: {e}", path.display())))?;
        roots.add(cert).map_err(config_err)?;
    }
    if roots.is_empty() {
        return Err(config_err(format!("no certificates in CA file {}", path.display())));
    }
    Ok(roots)
}

/// Client chain and key, both read from the same PEM file.
fn load_identity(path: &Path) -> AuditResult<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let chain = CertificateDer::pem_file_iter(path)
        .map_err(|e| config_err(format!("cannot read client certificate {}: {e}", path.display())))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| config_err(format!("bad certificate in {}: {e}", path.display())))?;
    if chain.is_empty() {
        return Err(config_err(format!("no certificate in {}", path.display())));
    }
    let key = PrivateKeyDer::from_pem_file(path)
        .map_err(|e| config_err(format!("no private key in {}: {e}", path.display())))?;
    Ok((chain, key))
}

/// Build the rustls client configuration for `settings`.
///
/// With `ca_cert` the server chain is verified against it. Without it the
/// server is NOT authenticated. With `local_cert` the client presents that
/// certificate.
pub fn client_config(settings: &AtnaSettings) -> AuditResult<ClientConfig> {
    let provider = Arc::new(crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(config_err)?;

    let builder = match &settings.ca_cert {
        Some(ca) => builder.with_root_certificates(load_roots(ca)?),
        None => {
            warn!(host = %settings.host, "no ATNA CA configured, server certificate will not be verified");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(InsecureServerVerifier(provider)))
        }
    };

    match &settings.local_cert {
        Some(cert) => {
            let (chain, key) = load_identity(cert)?;
            builder.with_client_auth_cert(chain, key).map_err(config_err)
        }
        None => Ok(builder.with_no_client_auth()),
    }
}

// ── TLS connector ──

/// Connects over TCP with a bounded timeout and speaks TLS via rustls.
///
/// Connect, read, and write are bounded by `timeout`. Host name lookup goes
/// through the system resolver, which has no timeout of its own: IP literals
/// skip it, and a resolved name is cached until a connect to it fails, so
/// only the first delivery to a name can block on DNS.
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    timeout: Duration,
    resolved: Mutex<Option<(String, u16, SocketAddr)>>,
}

impl TlsConnector {
    pub fn new(config: ClientConfig, timeout: Duration) -> Self {
        Self {
            config: Arc::new(config),
            timeout,
            resolved: Mutex::new(None),
        }
    }

    fn resolve(&self, host: &str, port: u16) -> AuditResult<SocketAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }
        if let Ok(cache) = self.resolved.lock() {
            if let Some((h, p, addr)) = cache.as_ref() {
                if h == host && *p == port {
                    return Ok(*addr);
                }
            }
        }

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(transport_err)?
            .next()
            .ok_or_else(|| transport_err(format!("{host} did not resolve")))?;
        if let Ok(mut cache) = self.resolved.lock() {
            *cache = Some((host.to_string(), port, addr));
        }
        Ok(addr)
    }

    fn forget_resolved(&self) {
        if let Ok(mut cache) = self.resolved.lock() {
            *cache = None;
        }
    }
}

impl Connector for TlsConnector {
    fn deliver(&self, host: &str, port: u16, frame: &[u8]) -> AuditResult<()> {
        let server_name = ServerName::try_from(host.to_string()).map_err(transport_err)?;
        let addr = self.resolve(host, port)?;

        let socket = TcpStream::connect_timeout(&addr, self.timeout).map_err(|e| {
            self.forget_resolved();
            transport_err(e)
        })?;
        socket.set_read_timeout(Some(self.timeout)).map_err(transport_err)?;
        socket.set_write_timeout(Some(self.timeout)).map_err(transport_err)?;

        let conn = ClientConnection::new(self.config.clone(), server_name).map_err(transport_err)?;
        let mut stream = StreamOwned::new(conn, socket);
        stream.write_all(frame).map_err(transport_err)?;
        stream.conn.send_close_notify();
        stream.flush().map_err(transport_err)?;
        Ok(())
    }
}

// ── Transport ──

/// `AuditTransport` that forwards events as RFC 3881 messages.
///
/// When the settings are inactive (disabled, or no host) `send` returns
/// before touching the connector.
pub struct AtnaTransport {
    settings: AtnaSettings,
    node: NodeIdentity,
    connector: Option<Box<dyn Connector>>,
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl AtnaTransport {
    /// Build a transport from settings. Certificate files are read here, so
    /// a broken TLS setup is reported at startup rather than per event.
    pub fn from_settings(settings: &AtnaSettings) -> AuditResult<Self> {
        if !settings.is_active() {
            debug!("ATNA forwarding inactive");
            return Ok(Self::with_connector(settings, None));
        }
        let config = client_config(settings)?;
        let connector = TlsConnector::new(config, Duration::from_secs(settings.connect_timeout_secs));
        Ok(Self::with_connector(settings, Some(Box::new(connector))))
    }

    pub fn with_connector(settings: &AtnaSettings, connector: Option<Box<dyn Connector>>) -> Self {
        let node = NodeIdentity {
            server_name: settings.server_name.clone().unwrap_or_else(local_hostname),
            server_addr: settings.server_addr.clone(),
            destination: settings.host.clone(),
        };
        Self {
            settings: settings.clone(),
            node,
            connector,
        }
    }

    pub fn node(&self) -> &NodeIdentity {
        &self.node
    }
}

impl AuditTransport for AtnaTransport {
    fn send(&self, event: &OutboundEvent) {
        if !self.settings.is_active() {
            return;
        }
        let Some(connector) = &self.connector else {
            return;
        };

        let frame = build_message(event, &self.node, Local::now().fixed_offset());
        match connector.deliver(&self.settings.host, self.settings.port, frame.as_bytes()) {
            Ok(()) => debug!(host = %self.settings.host, event = %event.event, "ATNA message sent"),
            Err(e) => warn!(host = %self.settings.host, event = %event.event, error = %e, "ATNA delivery failed"),
        }
    }
}
