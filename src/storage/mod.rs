//! Storage access seam.
//!
//! Everything that knows how entries are stored lives behind [`Storage`] and
//! [`EntrySearch`]. The filter, dedup, extraction and manifest code only ever
//! sees [`Entry`] values and `Read` handles.

#[cfg(feature = "casc")]
pub mod casc;
pub mod loose;
pub mod memory;
pub mod session;
pub mod wildcard;

pub use loose::LooseStorage;
pub use memory::MemoryStorage;
pub use session::StorageSession;
pub use wildcard::Wildcard;

use crate::error::{CascExtractError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Locale mask selecting every locale present in the storage.
pub const LOCALE_ALL: u32 = 0xFFFF_FFFF;

/// Marker file found at the root of a native CASC installation.
pub const BUILD_INFO_FILE: &str = ".build.info";

/// One item yielded by a storage search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Path as reported by the storage, separators untouched.
    pub path: String,
    /// Last path component.
    pub plain_name: String,
}

impl Entry {
    pub fn new<S: Into<String>>(path: S) -> Self {
        let path = path.into();
        let plain_name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(path.as_str())
            .to_string();

        Self { path, plain_name }
    }

    pub fn with_plain_name<S: Into<String>>(mut self, plain_name: S) -> Self {
        self.plain_name = plain_name.into();
        self
    }
}

/// An open storage handle.
pub trait Storage {
    fn backend_name(&self) -> &'static str;

    /// Starts a case-insensitive wildcard search over all entries.
    ///
    /// The returned search is finite and cannot be restarted.
    fn find<'a>(&'a self, pattern: &str) -> Result<Box<dyn EntrySearch + 'a>>;

    /// Opens one entry for reading. Dropping the reader closes the entry.
    fn open_entry<'a>(&'a self, path: &str, locale: u32) -> Result<Box<dyn Read + 'a>>;

    fn close(&mut self) -> Result<()>;
}

/// A running search started by [`Storage::find`].
pub trait EntrySearch {
    /// Next matching entry, or `None` once the search is exhausted.
    fn next_entry(&mut self) -> Result<Option<Entry>>;

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Native CASC when the source has a .build.info, loose files otherwise
    #[default]
    Auto,
    /// Native CASC storage (requires the `casc` feature)
    Casc,
    /// Plain directory tree of already unpacked files
    Loose,
}

impl StorageBackend {
    /// Picks a concrete backend for `source`.
    pub fn resolve(self, source: &Path) -> StorageBackend {
        match self {
            StorageBackend::Auto => {
                if source.join(BUILD_INFO_FILE).is_file() {
                    StorageBackend::Casc
                } else {
                    StorageBackend::Loose
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageBackend::Auto => "auto",
            StorageBackend::Casc => "casc",
            StorageBackend::Loose => "loose",
        };
        f.write_str(name)
    }
}

/// Opens `source` with the requested backend.
pub fn open_storage(source: &Path, backend: StorageBackend) -> Result<Box<dyn Storage>> {
    match backend.resolve(source) {
        StorageBackend::Loose => Ok(Box::new(LooseStorage::open(source)?)),
        StorageBackend::Casc => open_casc(source),
        StorageBackend::Auto => Err(CascExtractError::UnsupportedBackend {
            backend: backend.to_string(),
            message: "backend could not be resolved".to_string(),
        }),
    }
}

#[cfg(feature = "casc")]
fn open_casc(source: &Path) -> Result<Box<dyn Storage>> {
    Ok(Box::new(casc::CascStorage::open(source)?))
}

#[cfg(not(feature = "casc"))]
fn open_casc(source: &Path) -> Result<Box<dyn Storage>> {
    Err(CascExtractError::UnsupportedBackend {
        backend: StorageBackend::Casc.to_string(),
        message: format!(
            "{} looks like a CASC storage but this build has no native CASC support",
            source.display()
        ),
    })
}
