//! In-memory trust store
//!
//! Same contract as the file store without touching disk. Pins are lost when
//! the store is dropped.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::info;

use super::{validate_host, TrustStore};
use crate::error::{Error, Result};

/// In-process trust store; pins are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pins: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pinned hosts.
    pub fn len(&self) -> usize {
        self.pins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrustStore for MemoryStore {
    fn get(&self, host: &str) -> Result<String> {
        validate_host(host)?;
        let pins = self.pins.read().unwrap_or_else(PoisonError::into_inner);
        pins.get(host)
            .map(|d| d.trim().to_string())
            .ok_or_else(|| Error::NotPinned(host.to_string()))
    }

    fn pin(&self, host: &str, digest: &str) -> Result<()> {
        validate_host(host)?;
        let mut pins = self.pins.write().unwrap_or_else(PoisonError::into_inner);
        info!(host = %host, "pinned certificate digest");
        pins.insert(host.to_string(), digest.to_string());
        Ok(())
    }
}
