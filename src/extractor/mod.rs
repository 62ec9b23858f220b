pub mod dir_tree;
pub mod entry_extractor;
pub mod manifest;
pub mod report;

pub use dir_tree::{FileSystem, LocalFileSystem, MissingDirPolicy};
pub use entry_extractor::{EntryExtractor, ExtractionProgress};
pub use manifest::ManifestWriter;
pub use report::{format_bytes, ExtractionReport, ReportContext, ScanSummary};
