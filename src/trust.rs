//! Per-connection trust decisions
//!
//! A host without a pin is trusted only if rustls validated its chain during
//! the handshake. A pinned host is trusted only if the chain it presented
//! digests to exactly the pinned value; CA validation plays no part.

use tracing::{debug, warn};

use crate::error::{Error, Result, UntrustedReason};
use crate::tls::CertificateChain;

/// Successful outcome of a trust check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    /// No pin exists and the chain passed full validation.
    FullyValidated,
    /// The chain matches the pinned digest.
    PinnedMatch,
}

/// Applies the pinning rule to a presented chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verifier;

impl Verifier {
    /// Decide whether `chain` is trusted for `host`.
    ///
    /// With `pinned == None` the handshake already ran under full
    /// validation, so reaching this point means the chain was accepted.
    pub fn check(
        &self,
        host: &str,
        chain: &CertificateChain,
        pinned: Option<&str>,
    ) -> Result<TrustDecision> {
        let Some(expected) = pinned else {
            debug!(host = %host, "chain validated against trusted roots");
            return Ok(TrustDecision::FullyValidated);
        };

        let actual = chain.digest();
        if actual.as_bytes() != expected.as_bytes() {
            warn!(host = %host, expected = %expected, actual = %actual, "pinned digest mismatch");
            return Err(Error::Untrusted {
                host: host.to_string(),
                reason: UntrustedReason::PinMismatch {
                    expected: expected.to_string(),
                    actual,
                },
            });
        }

        debug!(host = %host, certs = chain.len(), "chain matches pinned digest");
        Ok(TrustDecision::PinnedMatch)
    }
}
