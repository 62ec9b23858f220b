use crate::config::{OutputConfig, CHUNK_SIZE};
use crate::error::{CascExtractError, Result};
use crate::extractor::dir_tree::{FileSystem, LocalFileSystem};
use crate::scanner::{split_protocol_prefix, MatchedEntry};
use crate::storage::{Storage, LOCALE_ALL};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    pub files_extracted: usize,
    pub files_failed: usize,
    pub bytes_written: u64,
    pub current_file: Option<String>,
    pub start_time: Instant,
    pub errors: Vec<String>,
}

impl ExtractionProgress {
    pub fn new() -> Self {
        Self {
            files_extracted: 0,
            files_failed: 0,
            bytes_written: 0,
            current_file: None,
            start_time: Instant::now(),
            errors: Vec::new(),
        }
    }

    pub fn start_file<S: Into<String>>(&mut self, path: S) {
        self.current_file = Some(path.into());
    }

    pub fn record_success(&mut self, bytes: u64) {
        self.files_extracted += 1;
        self.bytes_written += bytes;
    }

    pub fn record_failure(&mut self, path: &str, error: &CascExtractError) {
        self.files_failed += 1;
        self.errors.push(format!("{}: {}", path, describe(error)));
    }

    pub fn files_attempted(&self) -> usize {
        self.files_extracted + self.files_failed
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for ExtractionProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Error text including the io cause, which thiserror keeps in `source()`.
fn describe(error: &CascExtractError) -> String {
    match std::error::Error::source(error) {
        Some(source) => format!("{} ({})", error, source),
        None => error.to_string(),
    }
}

/// Copies storage entries into the destination tree.
///
/// One chunk buffer is allocated up front and reused for every entry.
pub struct EntryExtractor<F: FileSystem = LocalFileSystem> {
    fs: F,
    destination: PathBuf,
    preserve_structure: bool,
    lowercase: bool,
    locale: u32,
    buffer: Vec<u8>,
    written: HashSet<PathBuf>,
    overwritten: usize,
}

impl EntryExtractor<LocalFileSystem> {
    pub fn new<P: Into<PathBuf>>(destination: P) -> Self {
        Self::with_file_system(LocalFileSystem, destination)
    }

    pub fn from_config(output: &OutputConfig, locale: u32) -> Self {
        Self::new(&output.destination)
            .with_preserve_structure(output.preserve_structure)
            .with_lowercase(output.lowercase)
            .with_locale(locale)
            .with_chunk_size(output.chunk_size)
    }
}

impl<F: FileSystem> EntryExtractor<F> {
    pub fn with_file_system<P: Into<PathBuf>>(fs: F, destination: P) -> Self {
        Self {
            fs,
            destination: destination.into(),
            preserve_structure: true,
            lowercase: false,
            locale: LOCALE_ALL,
            buffer: vec![0u8; CHUNK_SIZE],
            written: HashSet::new(),
            overwritten: 0,
        }
    }

    pub fn with_preserve_structure(mut self, preserve: bool) -> Self {
        self.preserve_structure = preserve;
        self
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_locale(mut self, locale: u32) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.buffer = vec![0u8; size.max(1)];
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Entries that replaced a file written earlier by this extractor.
    pub fn overwritten(&self) -> usize {
        self.overwritten
    }

    /// Where `entry` lands below the destination root.
    ///
    /// Paths that would leave the root are rejected with `InvalidPath`.
    pub fn destination_for(&self, entry: &MatchedEntry) -> Result<PathBuf> {
        let (_, stripped) = split_protocol_prefix(&entry.path);

        let relative = if self.preserve_structure {
            stripped.to_string()
        } else if !entry.plain_name.is_empty() {
            entry.plain_name.replace('\\', "/")
        } else {
            stripped.rsplit('/').next().unwrap_or_default().to_string()
        };

        let relative = if self.lowercase {
            relative.to_lowercase()
        } else {
            relative
        };

        let invalid = || CascExtractError::InvalidPath {
            path: entry.path.clone(),
        };

        if relative.starts_with('/') {
            return Err(invalid());
        }

        let mut target = self.destination.clone();
        let mut depth = 0;

        for part in relative.split('/').filter(|p| !p.is_empty() && *p != ".") {
            let mut components = Path::new(part).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => {
                    target.push(name);
                    depth += 1;
                }
                _ => return Err(invalid()),
            }
        }

        if depth == 0 {
            return Err(invalid());
        }

        Ok(target)
    }

    /// Copies one entry and returns the number of bytes written.
    ///
    /// A stream that fails midway leaves no partial file behind.
    pub fn extract(&mut self, storage: &dyn Storage, entry: &MatchedEntry) -> Result<u64> {
        let target = self.destination_for(entry)?;

        if let Some(parent) = target.parent() {
            self.fs.create_tree(parent)?;
        }

        let mut reader = storage.open_entry(&entry.raw_path, self.locale)?;

        if self.written.contains(&target) {
            self.overwritten += 1;
            warn!(
                "{} overwrites {}, already extracted in this run",
                entry.path,
                target.display()
            );
        }

        let mut file = fs::File::create(&target).map_err(|e| CascExtractError::DestinationWrite {
            path: target.display().to_string(),
            source: e,
        })?;

        match self.copy_chunks(reader.as_mut(), &mut file, entry, &target) {
            Ok(bytes) => {
                self.written.insert(target);
                Ok(bytes)
            }
            Err(e) => {
                drop(file);
                if let Err(remove_err) = fs::remove_file(&target) {
                    warn!("Could not remove partial file {}: {}", target.display(), remove_err);
                }
                Err(e)
            }
        }
    }

    /// Extracts one entry, recording per-entry failures in `progress`
    /// instead of returning them.
    pub fn extract_into(
        &mut self,
        storage: &dyn Storage,
        entry: &MatchedEntry,
        progress: &mut ExtractionProgress,
    ) -> Result<()> {
        info!("Extracting {}", entry.path);
        progress.start_file(entry.path.as_str());

        match self.extract(storage, entry) {
            Ok(bytes) => {
                progress.record_success(bytes);
                Ok(())
            }
            Err(e) if e.is_per_entry() => {
                warn!("Skipping {}: {}", entry.path, describe(&e));
                progress.record_failure(&entry.path, &e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn copy_chunks(
        &mut self,
        reader: &mut dyn Read,
        writer: &mut fs::File,
        entry: &MatchedEntry,
        target: &Path,
    ) -> Result<u64> {
        let mut total = 0u64;

        loop {
            let read = match reader.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(CascExtractError::EntryRead {
                        path: entry.path.clone(),
                        message: e.to_string(),
                    })
                }
            };

            writer
                .write_all(&self.buffer[..read])
                .map_err(|e| CascExtractError::DestinationWrite {
                    path: target.display().to_string(),
                    source: e,
                })?;

            total += read as u64;
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn matched(path: &str) -> MatchedEntry {
        MatchedEntry {
            path: path.replace('\\', "/"),
            raw_path: path.to_string(),
            plain_name: path.rsplit(['/', '\\']).next().unwrap().to_string(),
        }
    }

    #[test]
    fn test_destination_layout() {
        let extractor = EntryExtractor::new("/out");

        assert_eq!(
            extractor.destination_for(&matched("data/global/excel/armor.txt")).unwrap(),
            Path::new("/out/data/global/excel/armor.txt")
        );
        assert_eq!(
            extractor.destination_for(&matched("data:data/global/excel/armor.txt")).unwrap(),
            Path::new("/out/data/global/excel/armor.txt")
        );
    }

    #[test]
    fn test_flat_and_lowercase_layout() {
        let extractor = EntryExtractor::new("/out")
            .with_preserve_structure(false)
            .with_lowercase(true);

        assert_eq!(
            extractor.destination_for(&matched("data/Global/Excel/Armor.TXT")).unwrap(),
            Path::new("/out/armor.txt")
        );
    }

    #[test]
    fn test_escaping_paths_are_rejected() {
        let extractor = EntryExtractor::new("/out");

        for path in ["data/../../etc/passwd.txt", "/etc/passwd.txt", "data:/etc/x.txt", ""] {
            assert!(
                matches!(
                    extractor.destination_for(&matched(path)),
                    Err(CascExtractError::InvalidPath { .. })
                ),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn test_extract_streams_in_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..2_500_000u32).map(|i| (i % 251) as u8).collect();
        let storage = MemoryStorage::new().with_entry("data/global/big.txt", content.clone());

        let mut extractor = EntryExtractor::new(temp_dir.path());
        assert_eq!(extractor.chunk_size(), CHUNK_SIZE);

        let bytes = extractor.extract(&storage, &matched("data/global/big.txt")).unwrap();
        assert_eq!(bytes, content.len() as u64);
        assert_eq!(fs::read(temp_dir.path().join("data/global/big.txt")).unwrap(), content);
    }

    #[test]
    fn test_failed_stream_removes_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new().with_truncated_entry("data/global/bad.txt", "partial");

        let mut extractor = EntryExtractor::new(temp_dir.path()).with_chunk_size(4);
        let result = extractor.extract(&storage, &matched("data/global/bad.txt"));

        assert!(matches!(result, Err(CascExtractError::EntryRead { .. })));
        assert!(!temp_dir.path().join("data/global/bad.txt").exists());
    }

    #[test]
    fn test_extract_into_records_failures() {
        let temp_dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new()
            .with_entry("data/global/a.txt", "a")
            .with_unreadable_entry("data/global/b.txt")
            .with_entry("data/global/c.txt", "cc");

        let mut extractor = EntryExtractor::new(temp_dir.path());
        let mut progress = ExtractionProgress::new();

        for path in ["data/global/a.txt", "data/global/b.txt", "data/global/c.txt"] {
            extractor.extract_into(&storage, &matched(path), &mut progress).unwrap();
        }

        assert_eq!(progress.files_extracted, 2);
        assert_eq!(progress.files_failed, 1);
        assert_eq!(progress.files_attempted(), 3);
        assert_eq!(progress.bytes_written, 3);
        assert_eq!(progress.errors.len(), 1);
        assert!(progress.errors[0].starts_with("data/global/b.txt"));
        assert_eq!(progress.current_file.as_deref(), Some("data/global/c.txt"));
    }

    #[test]
    fn test_colliding_flat_targets_are_counted() {
        let temp_dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new()
            .with_entry("data/global/excel/Armor.txt", "first")
            .with_entry("data/local/armor.txt", "second")
            .with_entry("data/global/excel/misc.txt", "misc");

        let mut extractor = EntryExtractor::new(temp_dir.path())
            .with_preserve_structure(false)
            .with_lowercase(true);

        for path in [
            "data/global/excel/Armor.txt",
            "data/local/armor.txt",
            "data/global/excel/misc.txt",
        ] {
            extractor.extract(&storage, &matched(path)).unwrap();
        }

        assert_eq!(extractor.overwritten(), 1);
        assert_eq!(fs::read_to_string(temp_dir.path().join("armor.txt")).unwrap(), "second");
    }

    #[test]
    fn test_existing_file_from_earlier_run_is_not_a_collision() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("armor.txt"), "old").unwrap();
        let storage = MemoryStorage::new().with_entry("data/global/excel/armor.txt", "new");

        let mut extractor = EntryExtractor::new(temp_dir.path()).with_preserve_structure(false);
        extractor.extract(&storage, &matched("data/global/excel/armor.txt")).unwrap();

        assert_eq!(extractor.overwritten(), 0);
        assert_eq!(fs::read_to_string(temp_dir.path().join("armor.txt")).unwrap(), "new");
    }

    struct CountingFileSystem {
        calls: Cell<usize>,
    }

    impl FileSystem for CountingFileSystem {
        fn create_tree(&self, path: &Path) -> Result<usize> {
            self.calls.set(self.calls.get() + 1);
            LocalFileSystem.create_tree(path)
        }

        fn delete_tree(&self, path: &Path, policy: crate::extractor::MissingDirPolicy) -> Result<()> {
            LocalFileSystem.delete_tree(path, policy)
        }

        fn exists(&self, path: &Path) -> bool {
            path.exists()
        }
    }

    #[test]
    fn test_parent_directory_is_ensured_per_entry() {
        let temp_dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new()
            .with_entry("x/a.txt", "a")
            .with_entry("x/y/b.txt", "b");

        let fs = CountingFileSystem { calls: Cell::new(0) };
        let mut extractor = EntryExtractor::with_file_system(fs, temp_dir.path());

        extractor.extract(&storage, &matched("x/a.txt")).unwrap();
        extractor.extract(&storage, &matched("x/y/b.txt")).unwrap();

        assert_eq!(extractor.fs.calls.get(), 2);
        assert!(temp_dir.path().join("x/y/b.txt").exists());
    }
}
