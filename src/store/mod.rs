//! Trust store abstraction
//!
//! A trust store maps a host name to the digest pinned for it. Two backends
//! are provided: [`FileStore`], one file per host under a private directory,
//! and [`MemoryStore`] for tests and embedders that manage persistence
//! themselves.

pub mod fs;
pub mod memory;

pub use fs::FileStore;
pub use memory::MemoryStore;

use std::fmt::Debug;

use crate::error::{Error, Result};

/// Storage backend for pinned certificate digests.
pub trait TrustStore: Send + Sync + Debug {
    /// Return the digest pinned for `host`.
    ///
    /// The value is returned as stored, with surrounding whitespace removed.
    /// A host without a record yields [`Error::NotPinned`].
    fn get(&self, host: &str) -> Result<String>;

    /// Associate `host` with `digest`, replacing any previous record.
    fn pin(&self, host: &str, digest: &str) -> Result<()>;
}

impl<T: TrustStore + ?Sized> TrustStore for std::sync::Arc<T> {
    fn get(&self, host: &str) -> Result<String> {
        (**self).get(host)
    }

    fn pin(&self, host: &str, digest: &str) -> Result<()> {
        (**self).pin(host, digest)
    }
}

/// Reject host keys that could escape the store or collide with temp files.
pub(crate) fn validate_host(host: &str) -> Result<()> {
    let bad = host.is_empty()
        || host.starts_with('.')
        || host.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::InvalidHost(host.to_string()));
    }
    Ok(())
}
