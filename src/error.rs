//! Error types for the Gemini client
//!
//! Every failure carries an [`ErrorKind`] so callers can decide between
//! prompting for a re-pin (`Untrusted`), giving up (`Invalid`), or treating
//! the failure as an ordinary I/O problem. The kind survives any number of
//! [`Error::Context`] layers and foreign wrappers such as `anyhow`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Maximum length of a response header before the line terminator.
pub const MAX_HEADER_LEN: usize = 2048;

#[derive(Error, Debug)]
pub enum Error {
    #[error("untrusted certificate for {host}: {reason}")]
    Untrusted { host: String, reason: UntrustedReason },

    #[error("invalid certificate for {host}: {source}")]
    Invalid {
        host: String,
        #[source]
        source: rustls::Error,
    },

    #[error("no pinned certificate for {0}")]
    NotPinned(String),

    #[error("trust store error at {}: {source}", .path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("host {0:?} cannot be used as a trust store key")]
    InvalidHost(String),

    #[error("failed to connect to {addr}: {source}")]
    Network {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration failed: {0}")]
    TlsConfig(#[from] rustls::Error),

    #[error("URI parsing failed: {0}")]
    Uri(#[from] url::ParseError),

    #[error("URI has no host: {0}")]
    MissingHost(String),

    #[error("header exceeds {MAX_HEADER_LEN} bytes")]
    HeaderTooLong,

    #[error("status code is not an integer: {0:?}")]
    StatusCode(String),

    #[error("header is not valid UTF-8")]
    HeaderEncoding,

    #[error("reading header failed: {0}")]
    HeaderRead(#[source] std::io::Error),

    #[error("{op} {host}: {source}")]
    Context {
        op: Operation,
        host: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a presented certificate chain is not trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntrustedReason {
    /// First contact and the chain does not lead to a known root.
    UnknownAuthority,
    /// The chain differs from the one pinned for the host.
    PinMismatch { expected: String, actual: String },
}

impl fmt::Display for UntrustedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAuthority => write!(f, "certificate signed by unknown authority"),
            Self::PinMismatch { expected, actual } => {
                write!(f, "pinned digest mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

/// The client operation an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Request,
    Pin,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("request to"),
            Self::Pin => f.write_str("pinning"),
        }
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown authority on first contact, or a pinned digest mismatch.
    /// Recoverable by an explicit re-pin after user confirmation.
    Untrusted,
    /// The certificate itself is unacceptable (expired, wrong host, ...).
    /// Re-pinning does not help.
    Invalid,
    /// The trust store holds no record for the host.
    NotPinned,
    /// The trust store could not be read or written.
    StoreIo,
    /// Dial, handshake or transport failure.
    Network,
    /// Malformed URI, host or response header.
    Protocol,
    /// The TLS client configuration could not be built, e.g. a bad client
    /// identity key.
    Config,
}

impl Error {
    /// Classify this error, looking through any context layers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Untrusted { .. } => ErrorKind::Untrusted,
            Self::Invalid { .. } => ErrorKind::Invalid,
            Self::NotPinned(_) => ErrorKind::NotPinned,
            Self::Store { .. } => ErrorKind::StoreIo,
            Self::Network { .. } => ErrorKind::Network,
            // A stream that ends mid-header is a malformed response
            Self::HeaderRead(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                ErrorKind::Protocol
            }
            Self::HeaderRead(_) => ErrorKind::Network,
            Self::Uri(_)
            | Self::MissingHost(_)
            | Self::InvalidHost(_)
            | Self::HeaderTooLong
            | Self::StatusCode(_)
            | Self::HeaderEncoding => ErrorKind::Protocol,
            Self::TlsConfig(_) => ErrorKind::Config,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Whether a re-pin could make this request succeed.
    pub fn is_untrusted(&self) -> bool {
        self.kind() == ErrorKind::Untrusted
    }

    /// Whether the certificate is rejected regardless of any pin.
    pub fn is_invalid(&self) -> bool {
        self.kind() == ErrorKind::Invalid
    }

    /// The innermost error, with every context layer stripped.
    pub fn root(&self) -> &Error {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn context(self, op: Operation, host: &str) -> Self {
        Self::Context {
            op,
            host: host.to_string(),
            source: Box::new(self),
        }
    }
}

/// Find the first crate [`Error`] in a source chain and return its kind.
///
/// Works on errors that have been wrapped by other layers, e.g. an
/// `anyhow::Error` carrying extra context.
pub fn classify(err: &(dyn std::error::Error + 'static)) -> Option<ErrorKind> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(ours) = e.downcast_ref::<Error>() {
            return Some(ours.kind());
        }
        current = e.source();
    }
    None
}

/// Whether the error is due to an unknown root CA or a failed pin check.
pub fn is_untrusted(err: &(dyn std::error::Error + 'static)) -> bool {
    classify(err) == Some(ErrorKind::Untrusted)
}

/// Whether the error is due to the certificate itself being invalid.
pub fn is_invalid(err: &(dyn std::error::Error + 'static)) -> bool {
    classify(err) == Some(ErrorKind::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mismatch() -> Error {
        Error::Untrusted {
            host: "example.org".into(),
            reason: UntrustedReason::PinMismatch {
                expected: "a".into(),
                actual: "b".into(),
            },
        }
    }

    #[test]
    fn test_kind_survives_context() {
        let err = mismatch()
            .context(Operation::Request, "example.org")
            .context(Operation::Request, "example.org");
        assert_eq!(err.kind(), ErrorKind::Untrusted);
        assert!(err.is_untrusted());
        assert!(!err.is_invalid());
        assert!(matches!(err.root(), Error::Untrusted { .. }));
    }

    #[test]
    fn test_invalid_is_not_untrusted() {
        let err = Error::Invalid {
            host: "example.org".into(),
            source: rustls::Error::InvalidCertificate(rustls::CertificateError::Expired),
        }
        .context(Operation::Request, "example.org");
        assert!(err.is_invalid());
        assert!(!err.is_untrusted());
    }

    #[test]
    fn test_classify_through_anyhow() {
        let err = anyhow::Error::new(mismatch()).context("fetching page");
        assert!(is_untrusted(&*err));
        assert!(!is_invalid(&*err));
    }

    #[test]
    fn test_classify_foreign_error() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "unrelated");
        assert_eq!(classify(&err), None);
        assert!(!is_untrusted(&err));
    }

    #[test]
    fn test_tls_config_is_not_network() {
        let err = Error::TlsConfig(rustls::Error::General("bad key".into()));
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(
            err.context(Operation::Request, "example.org").kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn test_header_read_kind_depends_on_cause() {
        let eof = Error::HeaderRead(std::io::ErrorKind::UnexpectedEof.into());
        assert_eq!(eof.kind(), ErrorKind::Protocol);

        let reset = Error::HeaderRead(std::io::ErrorKind::ConnectionReset.into());
        assert_eq!(reset.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::NotPinned("example.org".into()).context(Operation::Pin, "example.org");
        assert_eq!(
            err.to_string(),
            "pinning example.org: no pinned certificate for example.org"
        );
    }
}
