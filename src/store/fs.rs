//! Filesystem-backed trust store
//!
//! Each host gets one file named after it, holding the digest and a trailing
//! newline. Writes go to a temp file in the same directory which is synced
//! and then renamed over the record, so a reader sees either the old digest
//! or the new one in full.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{validate_host, TrustStore};
use crate::error::{Error, Result};

const TEMP_PREFIX: &str = ".sig_";
const TEMP_SUFFIX: &str = ".tmp";

/// Trust store with one file per host under a private directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first pin.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, host: &str) -> PathBuf {
        self.dir.join(host)
    }

    fn store_err(&self, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Store { path, source }
    }

    fn ensure_dir(&self) -> Result<()> {
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.dir).map_err(self.store_err(&self.dir))
    }

    /// Flush the rename itself to disk.
    #[cfg(unix)]
    fn sync_dir(&self) {
        if let Err(e) = std::fs::File::open(&self.dir).and_then(|d| d.sync_all()) {
            warn!(dir = %self.dir.display(), error = %e, "failed to sync trust store directory");
        }
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) {}
}

impl TrustStore for FileStore {
    fn get(&self, host: &str) -> Result<String> {
        validate_host(host)?;
        let path = self.record_path(host);

        match std::fs::read_to_string(&path) {
            Ok(data) => Ok(data.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotPinned(host.to_string())),
            Err(e) => Err(Error::Store { path, source: e }),
        }
    }

    fn pin(&self, host: &str, digest: &str) -> Result<()> {
        validate_host(host)?;
        self.ensure_dir()?;

        // Removed on drop unless persisted
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(self.store_err(&self.dir))?;
        debug!(temp = %temp.path().display(), "writing pin to temp file");

        temp.write_all(format!("{digest}\n").as_bytes())
            .map_err(self.store_err(temp.path()))?;
        temp.as_file()
            .sync_all()
            .map_err(self.store_err(temp.path()))?;

        let path = self.record_path(host);
        temp.persist(&path)
            .map_err(|e| Error::Store {
                path: path.clone(),
                source: e.error,
            })?;
        self.sync_dir();

        info!(host = %host, path = %path.display(), "pinned certificate digest");
        Ok(())
    }
}
