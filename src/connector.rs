//! TLS dialing under a trust policy
//!
//! The connector never writes protocol bytes. It hands back the live stream
//! together with the chain the server presented so the caller can run its
//! trust check before anything crosses the wire.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{CertificateError, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::{Error, Result, UntrustedReason};
use crate::tls::{self, CertificateChain, ClientIdentity};

/// Port used when a URI does not name one.
pub const DEFAULT_PORT: u16 = 1965;

/// Encrypted stream to a Gemini server.
pub type GeminiStream = TlsStream<TcpStream>;

/// How the server's certificate chain is judged during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Full chain validation against the configured roots.
    Validate,
    /// Accept any chain; the caller compares digests afterwards.
    SkipValidation,
}

/// An established connection and the chain presented on it.
#[derive(Debug)]
pub struct Connection {
    pub stream: GeminiStream,
    pub chain: CertificateChain,
}

/// Dials Gemini servers under either trust policy.
#[derive(Clone)]
pub struct Connector {
    validating: TlsConnector,
    skipping: TlsConnector,
    default_port: u16,
    connect_timeout: Option<Duration>,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("default_port", &self.default_port)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl Connector {
    /// Create a connector with both TLS configurations prepared up front.
    pub fn new(
        roots: RootCertStore,
        identity: Option<&ClientIdentity>,
        default_port: u16,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        let validating = tls::validating_config(roots, identity)?;
        let skipping = tls::skip_validation_config(identity)?;
        Ok(Self {
            validating: TlsConnector::from(Arc::new(validating)),
            skipping: TlsConnector::from(Arc::new(skipping)),
            default_port,
            connect_timeout,
        })
    }

    /// Port used when `dial` is given none.
    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Open a TLS connection to `host`.
    pub async fn dial(
        &self,
        host: &str,
        port: Option<u16>,
        policy: TrustPolicy,
    ) -> Result<Connection> {
        let port = port.unwrap_or(self.default_port);
        let addr = format!("{host}:{port}");

        let connect = self.handshake(host, port, policy, &addr);
        match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| Error::Network {
                    addr: addr.clone(),
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })?,
            None => connect.await,
        }
    }

    async fn handshake(
        &self,
        host: &str,
        port: u16,
        policy: TrustPolicy,
        addr: &str,
    ) -> Result<Connection> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::MissingHost(host.to_string()))?;

        debug!(addr = %addr, ?policy, "dialing");
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|source| Error::Network {
                addr: addr.to_string(),
                source,
            })?;

        let connector = match policy {
            TrustPolicy::Validate => &self.validating,
            TrustPolicy::SkipValidation => &self.skipping,
        };
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| classify_handshake_error(host, addr, e))?;

        let (_, conn) = stream.get_ref();
        let chain = conn
            .peer_certificates()
            .map(CertificateChain::from)
            .unwrap_or_default();
        debug!(addr = %addr, certs = chain.len(), "handshake complete");

        Ok(Connection { stream, chain })
    }
}

/// Sort a failed handshake into untrusted, invalid or plain network failure.
fn classify_handshake_error(host: &str, addr: &str, err: io::Error) -> Error {
    let tls_err = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>());

    match tls_err {
        Some(rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer)) => {
            Error::Untrusted {
                host: host.to_string(),
                reason: UntrustedReason::UnknownAuthority,
            }
        }
        Some(e @ rustls::Error::InvalidCertificate(_)) => Error::Invalid {
            host: host.to_string(),
            source: e.clone(),
        },
        _ => Error::Network {
            addr: addr.to_string(),
            source: err,
        },
    }
}
