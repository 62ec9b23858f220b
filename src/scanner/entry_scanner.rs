use crate::error::Result;
use crate::scanner::path_filter::{normalize_path, PathFilter};
use crate::storage::{Entry, EntrySearch, Storage};
use indexmap::IndexSet;
use tracing::{debug, info, trace, warn};

/// One entry that passed the filter and was seen for the first time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedEntry {
    /// Normalized (`/`-separated) path. This is the dedup key.
    pub path: String,
    /// Path exactly as the storage reported it, used to open the entry.
    pub raw_path: String,
    pub plain_name: String,
}

impl MatchedEntry {
    fn from_entry(entry: Entry, path: String) -> Self {
        Self {
            path,
            raw_path: entry.path,
            plain_name: entry.plain_name,
        }
    }
}

/// Ordered set of normalized matched paths.
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    paths: IndexSet<String>,
}

impl MatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the path was already present.
    pub fn insert(&mut self, path: String) -> bool {
        self.paths.insert(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a String;
    type IntoIter = indexmap::set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatistics {
    pub entries_seen: usize,
    pub matched: usize,
    pub duplicates: usize,
    pub filtered_out: usize,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub matches: MatchSet,
    pub statistics: ScanStatistics,
}

pub struct EntryScanner {
    filter: PathFilter,
}

impl EntryScanner {
    pub fn new(filter: PathFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// Drives one search over `storage`, calling `on_match` for every new
    /// match before the next entry is requested.
    ///
    /// Any enumeration error, or an error returned by `on_match`, ends the
    /// scan and is returned as is.
    pub fn scan<F>(&self, storage: &dyn Storage, pattern: &str, mut on_match: F) -> Result<ScanOutcome>
    where
        F: FnMut(&MatchedEntry) -> Result<()>,
    {
        info!(
            "Searching {} storage with pattern '{}' ({})",
            storage.backend_name(),
            pattern,
            self.filter.describe()
        );

        let mut search = storage.find(pattern)?;
        let mut matches = MatchSet::new();
        let mut statistics = ScanStatistics::default();

        let walked = self.walk(search.as_mut(), &mut matches, &mut statistics, &mut on_match);

        match walked {
            Ok(()) => search.close()?,
            Err(e) => {
                if let Err(close_err) = search.close() {
                    warn!("Failed to close search after error: {}", close_err);
                }
                return Err(e);
            }
        }

        debug!(
            "Scan finished: {} seen, {} matched, {} duplicates, {} filtered out",
            statistics.entries_seen, statistics.matched, statistics.duplicates, statistics.filtered_out
        );

        Ok(ScanOutcome {
            matches,
            statistics,
        })
    }

    fn walk<F>(
        &self,
        search: &mut dyn EntrySearch,
        matches: &mut MatchSet,
        statistics: &mut ScanStatistics,
        on_match: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&MatchedEntry) -> Result<()>,
    {
        while let Some(entry) = search.next_entry()? {
            statistics.entries_seen += 1;
            let path = normalize_path(&entry.path);

            if !self.filter.matches(&path) {
                trace!("Skipping {}", path);
                statistics.filtered_out += 1;
                continue;
            }

            if matches.contains(&path) {
                trace!("Duplicate {}", path);
                statistics.duplicates += 1;
                continue;
            }

            info!("Found {}", path);
            matches.insert(path.clone());
            statistics.matched += 1;

            on_match(&MatchedEntry::from_entry(entry, path))?;
        }

        Ok(())
    }
}
