use crate::extractor::ExtractionProgress;
use crate::ui::output::format_duration;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    /// Spinners only run at the default verbosity.
    pub fn for_verbosity(verbose: u8, quiet: bool) -> Self {
        Self::new(!quiet && verbose == 0)
    }

    /// A tracing writer that hides the spinners while a log line is written.
    pub fn log_writer(&self) -> ProgressLogWriter {
        ProgressLogWriter {
            progress: self.clone(),
        }
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new_spinner());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.set_message(message.to_string());
        pb
    }

    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.enabled {
            self.multi_progress.suspend(f)
        } else {
            f()
        }
    }

    pub fn clear(&self) {
        if self.enabled {
            self.multi_progress.clear().ok();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Stderr writer for `tracing_subscriber::fmt` that keeps log lines from
/// tearing through an active spinner.
#[derive(Clone)]
pub struct ProgressLogWriter {
    progress: ProgressManager,
}

impl Write for ProgressLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.progress.suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.progress.suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for ProgressLogWriter {
    type Writer = ProgressLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

pub fn update_extraction_progress(pb: &ProgressBar, progress: &ExtractionProgress) {
    pb.set_position(progress.files_attempted() as u64);

    match progress.current_file {
        Some(ref current) if progress.files_failed > 0 => pb.set_message(format!(
            "{} extracted, {} skipped: {}",
            progress.files_extracted, progress.files_failed, current
        )),
        Some(ref current) => pb.set_message(format!(
            "{} extracted: {}",
            progress.files_extracted, current
        )),
        None => pb.set_message("Searching storage..."),
    }
}

pub fn update_listing_progress(pb: &ProgressBar, matched: usize, current: &str) {
    pb.set_position(matched as u64);
    pb.set_message(format!("{} matched: {}", matched, current));
}

pub fn finish_progress_with_summary(pb: &ProgressBar, message: &str, duration: Duration) {
    let final_message = format!("{} (completed in {})", message, format_duration(duration));
    pb.finish_with_message(final_message);
}
