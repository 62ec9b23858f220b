//! Native CASC backend built on the `casc-rs` crate.
//!
//! This is the only module that talks to the storage library. It maps the
//! library's file table and file streams onto [`Storage`] and [`EntrySearch`].

use crate::error::{CascExtractError, Result};
use crate::storage::{Entry, EntrySearch, Storage, Wildcard};
use casc_rs::casc_storage::CascStorage as NativeStorage;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

pub struct CascStorage {
    inner: Option<NativeStorage>,
    root: String,
}

impl CascStorage {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let inner = NativeStorage::open(root).map_err(|e| CascExtractError::StorageOpen {
            path: root.display().to_string(),
            code: native_error_code(&e),
            message: e.to_string(),
        })?;

        debug!("CASC storage lists {} files", inner.files.len());

        Ok(Self {
            inner: Some(inner),
            root: root.display().to_string(),
        })
    }

    fn native(&self) -> Option<&NativeStorage> {
        self.inner.as_ref()
    }
}

fn native_error_code<E: std::error::Error + 'static>(error: &E) -> Option<i32> {
    error
        .source()
        .and_then(|source| source.downcast_ref::<io::Error>())
        .and_then(io::Error::raw_os_error)
}

impl Storage for CascStorage {
    fn backend_name(&self) -> &'static str {
        "casc"
    }

    fn find<'a>(&'a self, pattern: &str) -> Result<Box<dyn EntrySearch + 'a>> {
        let native = self.native().ok_or_else(|| CascExtractError::Enumeration {
            pattern: pattern.to_string(),
            message: format!("storage '{}' is closed", self.root),
            code: None,
        })?;

        let names = native.files.iter().map(|info| info.file_name());

        Ok(Box::new(CascSearch {
            names: Box::new(names),
            wildcard: Wildcard::new(pattern)?,
        }))
    }

    fn open_entry<'a>(&'a self, path: &str, _locale: u32) -> Result<Box<dyn Read + 'a>> {
        let native = self.native().ok_or_else(|| CascExtractError::EntryOpen {
            path: path.to_string(),
            message: "storage is closed".to_string(),
        })?;

        let file = native
            .open_file(path)
            .map_err(|e| CascExtractError::EntryOpen {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        Ok(Box::new(file))
    }

    fn close(&mut self) -> Result<()> {
        self.inner.take();
        Ok(())
    }
}

struct CascSearch<'a> {
    names: Box<dyn Iterator<Item = &'a str> + 'a>,
    wildcard: Wildcard,
}

impl EntrySearch for CascSearch<'_> {
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        for name in self.names.by_ref() {
            if self.wildcard.is_match(name) {
                return Ok(Some(Entry::new(name)));
            }
        }
        Ok(None)
    }
}
