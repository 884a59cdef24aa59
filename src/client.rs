//! Gemini client with trust-on-first-use certificate pinning
//!
//! A host seen for the first time must present a chain that validates
//! against the configured roots. Once a host is pinned with [`Client::pin`],
//! every later connection skips CA validation and must present exactly the
//! pinned chain instead. Pinning is always an explicit call; a request never
//! pins on its own.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rustls::RootCertStore;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::{Host, Url};

use crate::config::{default_store_dir, Config};
use crate::connector::{Connection, Connector, GeminiStream, TrustPolicy, DEFAULT_PORT};
use crate::error::{Error, Operation, Result};
use crate::store::{FileStore, TrustStore};
use crate::tls::{self, ClientIdentity};
use crate::trust::Verifier;

/// Gemini client that pins server certificates on first use.
#[derive(Debug, Clone)]
pub struct Client {
    store: Arc<dyn TrustStore>,
    connector: Connector,
    verifier: Verifier,
}

impl Client {
    /// Create a client that keeps its pins in `store_dir`.
    pub fn new(store_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::builder().store_dir(store_dir).build()
    }

    /// Create a client from a [`Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::builder()
            .store_dir(&config.store_dir)
            .default_port(config.default_port);
        if let Some(limit) = config.connect_timeout() {
            builder = builder.connect_timeout(limit);
        }
        builder.build()
    }

    /// Start building a client with custom settings.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The trust store holding this client's pins.
    pub fn store(&self) -> &dyn TrustStore {
        self.store.as_ref()
    }

    /// Request `uri` and return the stream positioned at the response header.
    ///
    /// The caller reads the header (see [`crate::header::read_header`]) and
    /// body, and closes the stream.
    pub async fn request(&self, uri: &str) -> Result<GeminiStream> {
        let target = Target::parse(uri).map_err(|e| e.context(Operation::Request, uri))?;
        self.request_target(&target)
            .await
            .map_err(|e| e.context(Operation::Request, &target.host))
    }

    /// Pin the certificate chain currently served for `uri`'s host.
    ///
    /// Any earlier pin for the host is replaced. Returns the new digest.
    pub async fn pin(&self, uri: &str) -> Result<String> {
        let target = Target::parse(uri).map_err(|e| e.context(Operation::Pin, uri))?;
        self.pin_target(&target)
            .await
            .map_err(|e| e.context(Operation::Pin, &target.host))
    }

    async fn request_target(&self, target: &Target) -> Result<GeminiStream> {
        let pinned = match self.store.get(&target.host) {
            Ok(digest) => Some(digest),
            Err(Error::NotPinned(_)) => None,
            Err(e) => return Err(e),
        };

        let policy = match pinned {
            Some(_) => TrustPolicy::SkipValidation,
            None => TrustPolicy::Validate,
        };
        let Connection { mut stream, chain } = self
            .connector
            .dial(&target.host, target.port, policy)
            .await?;

        // On mismatch the stream is dropped here, unused
        let decision = self
            .verifier
            .check(&target.host, &chain, pinned.as_deref())?;
        debug!(host = %target.host, ?decision, "connection trusted");

        let line = format!("{}\r\n", target.url.as_str());
        let network = |source| Error::Network {
            addr: target.addr(self.connector.default_port()),
            source,
        };
        stream.write_all(line.as_bytes()).await.map_err(network)?;
        stream.flush().await.map_err(network)?;

        Ok(stream)
    }

    async fn pin_target(&self, target: &Target) -> Result<String> {
        let Connection { mut stream, chain } = self
            .connector
            .dial(&target.host, target.port, TrustPolicy::SkipValidation)
            .await?;
        // close_notify only, nothing was requested
        let _ = stream.shutdown().await;

        let digest = chain.digest();
        self.store.pin(&target.host, &digest)?;
        Ok(digest)
    }
}

/// Where a URI points.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    url: Url,
    /// Lowercased host name or bare IP address; also the trust store key.
    host: String,
    port: Option<u16>,
}

impl Target {
    fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)?;
        let host = match url.host() {
            Some(Host::Domain(d)) if !d.is_empty() => d.to_ascii_lowercase(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(Error::MissingHost(uri.to_string())),
        };
        Ok(Self {
            port: url.port(),
            host,
            url,
        })
    }

    fn addr(&self, default_port: u16) -> String {
        format!("{}:{}", self.host, self.port.unwrap_or(default_port))
    }
}

/// Builder for [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    store: Option<Arc<dyn TrustStore>>,
    roots: Option<RootCertStore>,
    identity: Option<ClientIdentity>,
    default_port: Option<u16>,
    connect_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Use a custom trust store.
    pub fn store(mut self, store: impl TrustStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Keep pins in files under `dir`.
    pub fn store_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.store(FileStore::new(dir))
    }

    /// Roots used to validate hosts that have no pin yet.
    /// Defaults to the `webpki-roots` set.
    pub fn root_certificates(mut self, roots: RootCertStore) -> Self {
        self.roots = Some(roots);
        self
    }

    /// Certificate presented when a server requests client auth.
    pub fn client_identity(mut self, identity: ClientIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Port used when a URI names none.
    pub fn default_port(mut self, port: u16) -> Self {
        self.default_port = Some(port);
        self
    }

    /// Bound on TCP connect plus TLS handshake.
    pub fn connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = Some(limit);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FileStore::new(default_store_dir())));
        let connector = Connector::new(
            self.roots.unwrap_or_else(tls::default_roots),
            self.identity.as_ref(),
            self.default_port.unwrap_or(DEFAULT_PORT),
            self.connect_timeout,
        )?;
        Ok(Client {
            store,
            connector,
            verifier: Verifier,
        })
    }
}
