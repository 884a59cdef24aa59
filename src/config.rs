//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connector::DEFAULT_PORT;

/// Settings for building a [`crate::Client`]; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one pinned digest per host.
    pub store_dir: PathBuf,
    /// Bound on TCP connect plus TLS handshake. `None` waits indefinitely.
    pub connect_timeout_secs: Option<u64>,
    /// Port used when a URI names none.
    pub default_port: u16,
}

impl Config {
    /// The connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            connect_timeout_secs: None,
            default_port: DEFAULT_PORT,
        }
    }
}

/// `~/.gget/pinned`, or `.gget/pinned` when no home directory is known.
pub fn default_store_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".gget")
        .join("pinned")
}
