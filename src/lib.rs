//! # Gemini TOFU client
//!
//! Client transport for the Gemini protocol with trust-on-first-use
//! certificate pinning.
//!
//! ## Trust model
//!
//! - **First contact**: a host with no pin must present a chain that
//!   validates against the configured roots (`webpki-roots` by default).
//! - **Pinning**: [`Client::pin`] connects without validation, digests the
//!   presented chain and stores the digest for the host.
//! - **Pinned contact**: CA validation is skipped and the presented chain must
//!   digest to exactly the pinned value. A mismatch fails before the request
//!   line is sent.
//!
//! The digest is SHA-256 over the DER bytes of every certificate in the chain,
//! in order, base64-encoded. Pins live in a [`store::TrustStore`]; the default
//! [`store::FileStore`] writes one file per host with an atomic rename.
//!
//! ## Error classification
//!
//! [`Error::kind`] separates failures a user may fix by re-pinning
//! ([`ErrorKind::Untrusted`]) from certificates that are broken regardless
//! ([`ErrorKind::Invalid`]). [`is_untrusted`] and [`is_invalid`] answer the
//! same question for errors that have been wrapped by other layers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gemini_tofu::{header, Client};
//! use tokio::io::AsyncReadExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("/home/me/.gget/pinned")?;
//!
//!     let mut stream = match client.request("gemini://example.org/").await {
//!         Ok(stream) => stream,
//!         Err(e) if e.is_untrusted() => {
//!             // After asking the user
//!             client.pin("gemini://example.org/").await?;
//!             client.request("gemini://example.org/").await?
//!         }
//!         Err(e) => return Err(e.into()),
//!     };
//!
//!     let header = header::read_header(&mut stream).await?;
//!     let mut body = String::new();
//!     stream.read_to_string(&mut body).await?;
//!     println!("{header}\n{body}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod gemtext;
pub mod header;
pub mod store;
pub mod tls;
pub mod trust;

pub use client::{Client, ClientBuilder};
pub use config::Config;
pub use connector::{Connection, Connector, GeminiStream, TrustPolicy, DEFAULT_PORT};
pub use error::{classify, is_invalid, is_untrusted, Error, ErrorKind, Result, UntrustedReason};
pub use header::{read_header, Header};
pub use store::{FileStore, MemoryStore, TrustStore};
pub use tls::{chain_digest, CertificateChain, ClientIdentity};
pub use trust::{TrustDecision, Verifier};
