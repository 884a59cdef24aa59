//! End-to-end trust-on-first-use behavior against a local TLS server.

use std::sync::Arc;

use gemini_tofu::{
    chain_digest, header, Client, ErrorKind, FileStore, MemoryStore, TrustStore, UntrustedReason,
};
use rcgen::{CertificateParams, CertifiedKey, DnType, IsCa, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{RootCertStore, ServerConfig};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

const BODY: &str = "# Hello\n=> /next Next page\n";

struct ServerCert {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

fn self_signed(name: &str) -> ServerCert {
    let CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec![name.to_string()]).expect("generate cert");
    ServerCert {
        chain: vec![cert.der().clone()],
        key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der())),
    }
}

/// A CA and a leaf it signed for `name`. Returns the CA root store too.
fn ca_signed(name: &str) -> (ServerCert, RootCertStore) {
    let mut ca_params = CertificateParams::default();
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "Test CA");
    ca_params.is_ca = IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let ca_key = KeyPair::generate().expect("CA key");
    let ca_cert = ca_params.self_signed(&ca_key).expect("CA cert");

    let params = CertificateParams::new(vec![name.to_string()]).expect("leaf params");
    let leaf_key = KeyPair::generate().expect("leaf key");
    let leaf = params
        .signed_by(&leaf_key, &ca_cert, &ca_key)
        .expect("leaf cert");

    let mut roots = RootCertStore::empty();
    roots.add(ca_cert.der().clone()).expect("add CA root");

    (
        ServerCert {
            chain: vec![leaf.der().clone(), ca_cert.der().clone()],
            key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der())),
        },
        roots,
    )
}

/// Serve Gemini over TLS on 127.0.0.1. Every connection's received request
/// bytes are reported on the channel; an empty report means nothing was sent.
async fn serve(cert: ServerCert) -> (u16, mpsc::UnboundedReceiver<Vec<u8>>) {
    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .expect("protocol versions")
    .with_no_client_auth()
    .with_single_cert(cert.chain, cert.key)
    .expect("server config");
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(tcp).await else {
                    let _ = tx.send(Vec::new());
                    return;
                };

                let mut received = Vec::new();
                let mut byte = [0u8; 1];
                while !received.ends_with(b"\n") {
                    match tls.read(&mut byte).await {
                        Ok(1) => received.push(byte[0]),
                        _ => break,
                    }
                }

                if received.ends_with(b"\r\n") {
                    let _ = tls.write_all(b"20 \r\n").await;
                    let _ = tls.write_all(BODY.as_bytes()).await;
                    let _ = tls.shutdown().await;
                }
                let _ = tx.send(received);
            });
        }
    });

    (port, rx)
}

fn uri(port: u16) -> String {
    format!("gemini://localhost:{port}/")
}

#[tokio::test]
async fn first_contact_with_self_signed_cert_is_untrusted() {
    let (port, mut seen) = serve(self_signed("localhost")).await;
    let store = Arc::new(MemoryStore::new());
    let client = Client::builder().store(store.clone()).build().unwrap();

    let err = client.request(&uri(port)).await.unwrap_err();
    assert!(err.is_untrusted(), "{err}");
    assert!(gemini_tofu::is_untrusted(&err));
    assert!(matches!(
        err.root(),
        gemini_tofu::Error::Untrusted {
            reason: UntrustedReason::UnknownAuthority,
            ..
        }
    ));

    // Nothing was pinned behind the caller's back
    assert!(store.is_empty());
    assert_eq!(seen.recv().await.unwrap(), Vec::<u8>::new());
}

#[tokio::test]
async fn pin_then_request_succeeds() {
    let cert = self_signed("localhost");
    let expected = chain_digest(&cert.chain);
    let (port, mut seen) = serve(cert).await;

    let tmp = TempDir::new().unwrap();
    let client = Client::new(tmp.path().join("pinned")).unwrap();

    let digest = client.pin(&uri(port)).await.unwrap();
    assert_eq!(digest, expected);
    assert_eq!(client.store().get("localhost").unwrap(), expected);
    // The pin connection sends no request
    assert_eq!(seen.recv().await.unwrap(), Vec::<u8>::new());

    let mut stream = client.request(&uri(port)).await.unwrap();
    let header = header::read_header(&mut stream).await.unwrap();
    assert_eq!(header.code, 20);
    assert_eq!(header.meta, "text/gemini; charset=utf-8");

    let mut body = String::new();
    stream.read_to_string(&mut body).await.unwrap();
    assert_eq!(body, BODY);

    assert_eq!(seen.recv().await.unwrap(), format!("{}\r\n", uri(port)).into_bytes());
}

#[tokio::test]
async fn pinned_mismatch_fails_closed() {
    let tmp = TempDir::new().unwrap();
    let store = FileStore::new(tmp.path());
    store.pin("localhost", "not-the-right-digest").unwrap();

    let cert = self_signed("localhost");
    let actual = chain_digest(&cert.chain);
    let (port, mut seen) = serve(cert).await;
    let client = Client::builder().store(store).build().unwrap();

    let err = client.request(&uri(port)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Untrusted);
    match err.root() {
        gemini_tofu::Error::Untrusted {
            reason: UntrustedReason::PinMismatch { expected, actual: got },
            ..
        } => {
            assert_eq!(expected, "not-the-right-digest");
            assert_eq!(got, &actual);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The request line never crossed the wire
    assert_eq!(seen.recv().await.unwrap(), Vec::<u8>::new());
    // The stale pin is left alone
    assert_eq!(client.store().get("localhost").unwrap(), "not-the-right-digest");
}

#[tokio::test]
async fn repin_after_key_change() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::builder().store(store.clone()).build().unwrap();

    let (old_port, _old_seen) = serve(self_signed("localhost")).await;
    let old = client.pin(&uri(old_port)).await.unwrap();

    let (new_port, mut seen) = serve(self_signed("localhost")).await;
    let err = client.request(&uri(new_port)).await.unwrap_err();
    assert!(err.is_untrusted());
    assert_eq!(seen.recv().await.unwrap(), Vec::<u8>::new());

    let new = client.pin(&uri(new_port)).await.unwrap();
    assert_ne!(old, new);
    assert_eq!(store.get("localhost").unwrap(), new);

    let mut stream = client.request(&uri(new_port)).await.unwrap();
    let header = header::read_header(&mut stream).await.unwrap();
    assert!(header.is_success());
}

#[tokio::test]
async fn first_contact_with_trusted_root_is_fully_validated() {
    let (cert, roots) = ca_signed("localhost");
    let (port, mut seen) = serve(cert).await;
    let store = Arc::new(MemoryStore::new());
    let client = Client::builder()
        .store(store.clone())
        .root_certificates(roots)
        .build()
        .unwrap();

    let mut stream = client.request(&uri(port)).await.unwrap();
    let header = header::read_header(&mut stream).await.unwrap();
    assert_eq!(header.code, 20);
    assert!(store.is_empty());
    assert_eq!(seen.recv().await.unwrap(), format!("{}\r\n", uri(port)).into_bytes());
}

#[tokio::test]
async fn wrong_host_name_is_invalid_not_untrusted() {
    let (cert, roots) = ca_signed("other.example");
    let (port, mut seen) = serve(cert).await;
    let client = Client::builder()
        .store(MemoryStore::new())
        .root_certificates(roots)
        .build()
        .unwrap();

    let err = client.request(&uri(port)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid, "{err}");
    assert!(!err.is_untrusted());
    assert_eq!(seen.recv().await.unwrap(), Vec::<u8>::new());
}

#[tokio::test]
async fn pinned_host_ignores_ca_validation() {
    // A chain that would fail full validation is accepted once pinned
    let (cert, _roots) = ca_signed("other.example");
    let digest = chain_digest(&cert.chain);
    let (port, _seen) = serve(cert).await;

    let store = MemoryStore::new();
    store.pin("localhost", &digest).unwrap();
    let client = Client::builder().store(store).build().unwrap();

    let mut stream = client.request(&uri(port)).await.unwrap();
    let header = header::read_header(&mut stream).await.unwrap();
    assert_eq!(header.code, 20);
}

#[tokio::test]
async fn connect_timeout_is_network_error() {
    // A listener that never completes a TLS handshake
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _hold = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });

    let client = Client::builder()
        .store(MemoryStore::new())
        .connect_timeout(std::time::Duration::from_millis(200))
        .build()
        .unwrap();
    let err = client.request(&uri(port)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network, "{err}");
}
