use crate::extractor::ExtractionProgress;
use crate::scanner::ScanStatistics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// End-of-run summary shown to the user or printed as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub source: String,
    pub destination: String,
    pub manifest: String,
    pub backend: String,
    pub pattern: String,
    pub filter: String,
    pub list_only: bool,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub scan: ScanSummary,
    pub files_extracted: usize,
    pub files_failed: usize,
    pub bytes_written: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScanSummary {
    pub entries_seen: usize,
    pub matched: usize,
    pub duplicates: usize,
    pub filtered_out: usize,
}

impl From<ScanStatistics> for ScanSummary {
    fn from(stats: ScanStatistics) -> Self {
        Self {
            entries_seen: stats.entries_seen,
            matched: stats.matched,
            duplicates: stats.duplicates,
            filtered_out: stats.filtered_out,
        }
    }
}

pub struct ReportContext<'a> {
    pub source: &'a str,
    pub destination: &'a Path,
    pub manifest: &'a Path,
    pub backend: &'a str,
    pub pattern: &'a str,
    pub filter: String,
    pub list_only: bool,
    pub started_at: DateTime<Utc>,
}

impl ExtractionReport {
    pub fn new(context: ReportContext<'_>, statistics: ScanStatistics, progress: &ExtractionProgress) -> Self {
        Self {
            source: context.source.to_string(),
            destination: context.destination.display().to_string(),
            manifest: context.manifest.display().to_string(),
            backend: context.backend.to_string(),
            pattern: context.pattern.to_string(),
            filter: context.filter,
            list_only: context.list_only,
            started_at: context.started_at,
            duration_secs: progress.elapsed().as_secs_f64(),
            scan: statistics.into(),
            files_extracted: progress.files_extracted,
            files_failed: progress.files_failed,
            bytes_written: progress.bytes_written,
            errors: progress.errors.clone(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.files_failed == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
