pub mod entry_scanner;
pub mod path_filter;

pub use entry_scanner::{EntryScanner, MatchSet, MatchedEntry, ScanOutcome, ScanStatistics};
pub use path_filter::{normalize_path, split_protocol_prefix, FilterStrategy, PathFilter};
