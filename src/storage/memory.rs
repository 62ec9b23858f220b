use crate::error::{CascExtractError, Result};
use crate::storage::{Entry, EntrySearch, Storage, Wildcard};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Content {
    Bytes(Vec<u8>),
    Unreadable,
    /// Yields the bytes, then fails the next read.
    Truncated(Vec<u8>),
}

/// In-process storage with entries kept in insertion order.
///
/// Duplicate paths are allowed, which lets callers reproduce storages that
/// list the same file under several spellings.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Vec<(String, Content)>,
    fail_after: Option<usize>,
    close_count: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry<S: Into<String>, B: Into<Vec<u8>>>(mut self, path: S, data: B) -> Self {
        self.entries.push((path.into(), Content::Bytes(data.into())));
        self
    }

    /// Adds an entry that is listed but cannot be opened.
    pub fn with_unreadable_entry<S: Into<String>>(mut self, path: S) -> Self {
        self.entries.push((path.into(), Content::Unreadable));
        self
    }

    /// Adds an entry whose stream breaks after `data`.
    pub fn with_truncated_entry<S: Into<String>, B: Into<Vec<u8>>>(
        mut self,
        path: S,
        data: B,
    ) -> Self {
        self.entries.push((path.into(), Content::Truncated(data.into())));
        self
    }

    /// Makes every search fail once it has yielded `count` entries.
    pub fn with_enumeration_failure_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Shared counter of `close` calls, readable after the storage is gone.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn find<'a>(&'a self, pattern: &str) -> Result<Box<dyn EntrySearch + 'a>> {
        Ok(Box::new(MemorySearch {
            entries: self.entries.iter(),
            wildcard: Wildcard::new(pattern)?,
            yielded: 0,
            fail_after: self.fail_after,
        }))
    }

    fn open_entry<'a>(&'a self, path: &str, _locale: u32) -> Result<Box<dyn Read + 'a>> {
        let wanted = path.replace('\\', "/");
        let content = self
            .entries
            .iter()
            .find(|(name, _)| name.replace('\\', "/").eq_ignore_ascii_case(&wanted))
            .map(|(_, content)| content)
            .ok_or_else(|| CascExtractError::EntryOpen {
                path: path.to_string(),
                message: "no such entry".to_string(),
            })?;

        match content {
            Content::Bytes(data) => Ok(Box::new(Cursor::new(data.as_slice()))),
            Content::Unreadable => Err(CascExtractError::EntryOpen {
                path: path.to_string(),
                message: "entry is not available locally".to_string(),
            }),
            Content::Truncated(data) => Ok(Box::new(TruncatedReader {
                inner: Cursor::new(data.as_slice()),
            })),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MemorySearch<'a> {
    entries: std::slice::Iter<'a, (String, Content)>,
    wildcard: Wildcard,
    yielded: usize,
    fail_after: Option<usize>,
}

impl EntrySearch for MemorySearch<'_> {
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        if self.fail_after.is_some_and(|limit| self.yielded >= limit) {
            return Err(CascExtractError::Enumeration {
                pattern: self.wildcard.pattern().to_string(),
                message: "index read failed".to_string(),
                code: Some(1392),
            });
        }

        for (name, _) in self.entries.by_ref() {
            if self.wildcard.is_match(name) {
                self.yielded += 1;
                return Ok(Some(Entry::new(name.clone())));
            }
        }

        Ok(None)
    }
}

struct TruncatedReader<'a> {
    inner: Cursor<&'a [u8]>,
}

impl Read for TruncatedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "data block is corrupt")),
            n => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_preserves_order_and_duplicates() {
        let storage = MemoryStorage::new()
            .with_entry("b.txt", "b")
            .with_entry("a.txt", "a")
            .with_entry("b.txt", "b");

        let mut search = storage.find("*.txt").unwrap();
        let mut names = Vec::new();
        while let Some(entry) = search.next_entry().unwrap() {
            names.push(entry.path);
        }
        assert_eq!(names, vec!["b.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_enumeration_failure() {
        let storage = MemoryStorage::new()
            .with_entry("a.txt", "a")
            .with_entry("b.txt", "b")
            .with_enumeration_failure_after(1);

        let mut search = storage.find("*").unwrap();
        assert!(search.next_entry().unwrap().is_some());
        assert!(matches!(
            search.next_entry(),
            Err(CascExtractError::Enumeration { code: Some(1392), .. })
        ));
    }

    #[test]
    fn test_open_entry_variants() {
        let storage = MemoryStorage::new()
            .with_entry("data\\a.txt", "alpha")
            .with_unreadable_entry("data/b.txt")
            .with_truncated_entry("data/c.txt", "gam");

        let mut content = String::new();
        storage
            .open_entry("DATA/A.TXT", 0)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "alpha");

        assert!(storage.open_entry("data/b.txt", 0).is_err());
        assert!(storage.open_entry("data/missing.txt", 0).is_err());

        let mut reader = storage.open_entry("data/c.txt", 0).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert!(reader.read(&mut buf).is_err());
    }

    #[test]
    fn test_close_counter() {
        let mut storage = MemoryStorage::new();
        let counter = storage.close_counter();
        storage.close().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
