//! Certificate chain digests and rustls configuration
//!
//! A pinned host is identified by the digest of its entire certificate chain:
//! SHA-256 over the DER bytes of every certificate in the order the server
//! presented them, base64-encoded. Any change anywhere in the chain changes
//! the digest.

use std::sync::Arc;

use base64::Engine;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Compute the opaque digest of a certificate chain.
///
/// One SHA-256 accumulator runs over the concatenated certificates, so the
/// result depends on both the bytes and the order. An empty chain hashes the
/// empty string.
pub fn chain_digest<C: AsRef<[u8]>>(certs: &[C]) -> String {
    let mut hasher = Sha256::new();
    for cert in certs {
        hasher.update(cert.as_ref());
    }
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// The certificates a peer presented during one handshake, leaf first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateChain(Vec<CertificateDer<'static>>);

impl CertificateChain {
    pub fn new(certs: Vec<CertificateDer<'static>>) -> Self {
        Self(certs)
    }

    pub fn digest(&self) -> String {
        chain_digest(&self.0)
    }

    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[CertificateDer<'static>]> for CertificateChain {
    fn from(certs: &[CertificateDer<'static>]) -> Self {
        Self(certs.to_vec())
    }
}

/// Crypto provider shared by every config this crate builds.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Root store holding the Mozilla roots shipped with `webpki-roots`.
pub fn default_roots() -> RootCertStore {
    RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    }
}

/// Certificate and key presented to servers that ask for client auth.
#[derive(Debug)]
pub struct ClientIdentity {
    pub chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl Clone for ClientIdentity {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

/// Verifier that accepts whatever chain the server presents.
///
/// Chain validation is replaced by the pinned-digest comparison the client
/// runs after the handshake. Handshake signatures are still checked, so the
/// peer must hold the private key of the certificate it presented.
#[derive(Debug)]
pub struct SkipServerVerification {
    provider: Arc<CryptoProvider>,
}

impl SkipServerVerification {
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Config that validates the server chain against `roots`.
pub fn validating_config(
    roots: RootCertStore,
    identity: Option<&ClientIdentity>,
) -> Result<ClientConfig> {
    let provider = crypto_provider();
    let verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .map_err(|e| rustls::Error::General(format!("failed to build verifier: {e}")))?;

    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_webpki_verifier(verifier);

    Ok(match identity {
        Some(id) => builder.with_client_auth_cert(id.chain.clone(), id.key.clone_key())?,
        None => builder.with_no_client_auth(),
    })
}

/// Config that skips chain validation entirely.
pub fn skip_validation_config(identity: Option<&ClientIdentity>) -> Result<ClientConfig> {
    let provider = crypto_provider();
    let verifier = SkipServerVerification::new(provider.clone());

    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier));

    Ok(match identity {
        Some(id) => builder.with_client_auth_cert(id.chain.clone(), id.key.clone_key())?,
        None => builder.with_no_client_auth(),
    })
}
