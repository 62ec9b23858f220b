use crate::error::Result;
use crate::storage::{open_storage, Storage, StorageBackend};
use std::path::Path;
use tracing::{error, info};

/// Owns an open storage for the length of one run.
///
/// The storage is closed exactly once: by [`StorageSession::close`], or by
/// `Drop` when the run leaves early through an error.
pub struct StorageSession {
    storage: Box<dyn Storage>,
    source: String,
    closed: bool,
}

impl StorageSession {
    pub fn open(source: &Path, backend: StorageBackend) -> Result<Self> {
        info!("Opening storage at '{}'...", source.display());
        let storage = open_storage(source, backend)?;
        info!("Opened {} storage", storage.backend_name());

        Ok(Self::from_storage(storage, source.display().to_string()))
    }

    pub fn from_storage<S: Into<String>>(storage: Box<dyn Storage>, source: S) -> Self {
        Self {
            storage,
            source: source.into(),
            closed: false,
        }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.storage.close()?;
        info!("Storage closed");
        Ok(())
    }
}

impl Drop for StorageSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.storage.close() {
            error!("Storage close failed for '{}': {}", self.source, e);
        }
    }
}
