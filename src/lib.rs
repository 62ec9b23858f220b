pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod scanner;
pub mod storage;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, FilterConfig, FilterMode, OutputConfig, StorageConfig};
pub use error::{CascExtractError, Result, UserFriendlyError};

// Core functionality re-exports
pub use extractor::{
    EntryExtractor, ExtractionProgress, ExtractionReport, FileSystem, LocalFileSystem,
    ManifestWriter, MissingDirPolicy,
};
pub use scanner::{EntryScanner, FilterStrategy, MatchSet, MatchedEntry, PathFilter};
pub use storage::{
    Entry, EntrySearch, LooseStorage, MemoryStorage, Storage, StorageBackend, StorageSession,
};
pub use ui::{OutputFormatter, OutputMode, ProgressLogWriter, ProgressManager};

use chrono::Utc;
use extractor::ReportContext;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main library interface: one configured extraction run.
pub struct CascExtract {
    config: Config,
    source: PathBuf,
    list_only: bool,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl CascExtract {
    pub fn new<P: Into<PathBuf>>(
        config: Config,
        source: P,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
    ) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::for_verbosity(verbose, quiet);

        Self {
            config,
            source: source.into(),
            list_only: false,
            output_formatter,
            progress_manager,
        }
    }

    /// Create an instance from CLI arguments.
    ///
    /// The source must exist; everything else is validated by the config.
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let source = cli_args.resolved_source()?;

        if !source.exists() {
            return Err(CascExtractError::InvalidArgument {
                message: format!("source path does not exist: {}", source.display()),
            });
        }

        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Ok(
            Self::new(config, source, output_mode, cli_args.verbose, cli_args.quiet)
                .with_list_only(cli_args.list_only),
        )
    }

    /// Share a progress manager, typically the one the log writer suspends.
    pub fn with_progress_manager(mut self, progress_manager: ProgressManager) -> Self {
        self.progress_manager = progress_manager;
        self
    }

    /// Only enumerate and write the manifest; nothing is extracted and the
    /// destination tree is left in place.
    pub fn with_list_only(mut self, list_only: bool) -> Self {
        self.list_only = list_only;
        self
    }

    /// Runs the full pipeline against the storage at the configured source.
    pub fn run(&self) -> Result<ExtractionReport> {
        let scanner = self.build_scanner()?;
        self.reset_destination()?;

        let session = StorageSession::open(&self.source, self.config.storage.backend)?;
        self.execute(session, scanner)
    }

    /// Same as [`CascExtract::run`] over an already opened storage.
    pub fn run_with_storage(&self, storage: Box<dyn Storage>) -> Result<ExtractionReport> {
        let scanner = self.build_scanner()?;
        self.reset_destination()?;

        let session = StorageSession::from_storage(storage, self.source.display().to_string());
        self.execute(session, scanner)
    }

    fn build_scanner(&self) -> Result<EntryScanner> {
        Ok(EntryScanner::new(PathFilter::from_config(&self.config.filter)?))
    }

    /// Removes the previous manifest and, unless disabled, the whole
    /// destination tree.
    pub fn reset_destination(&self) -> Result<()> {
        ManifestWriter::new(self.config.manifest_path()).remove_existing()?;

        if self.list_only || !self.config.output.clean_destination {
            debug!("Keeping existing destination tree");
            return Ok(());
        }

        let destination = &self.config.output.destination;
        if is_protected_destination(destination, &self.source) {
            warn!(
                "Not deleting {}: it holds the source storage or the working directory",
                destination.display()
            );
            return Ok(());
        }

        info!("Resetting destination {}", destination.display());
        LocalFileSystem.delete_tree(destination, self.config.output.missing_destination)
    }

    fn execute(&self, session: StorageSession, scanner: EntryScanner) -> Result<ExtractionReport> {
        let started_at = Utc::now();
        let pattern = self.config.storage.pattern.as_str();
        let storage = session.storage();

        self.output_formatter.start_operation(&format!(
            "{} '{}' from {}",
            if self.list_only { "Listing" } else { "Extracting" },
            pattern,
            session.source()
        ));

        let spinner = self.progress_manager.create_spinner("Searching storage...");
        let mut progress = ExtractionProgress::new();

        let scanned = if self.list_only {
            let mut matched = 0;
            scanner.scan(storage, pattern, |entry| {
                matched += 1;
                ui::progress::update_listing_progress(&spinner, matched, &entry.path);
                Ok(())
            })
        } else {
            let mut extractor =
                EntryExtractor::from_config(&self.config.output, self.config.storage.locale);
            scanner.scan(storage, pattern, |entry| {
                extractor.extract_into(storage, entry, &mut progress)?;
                ui::progress::update_extraction_progress(&spinner, &progress);
                Ok(())
            })
        };

        let outcome = match scanned {
            Ok(outcome) => outcome,
            Err(e) => {
                spinner.abandon();
                return Err(e);
            }
        };

        LocalFileSystem.create_tree(&self.config.output.destination)?;
        let manifest = ManifestWriter::new(self.config.manifest_path());
        manifest.write(&outcome.matches)?;

        ui::progress::finish_progress_with_summary(
            &spinner,
            &format!("{} entries matched", outcome.matches.len()),
            progress.elapsed(),
        );
        self.progress_manager.clear();

        let backend = session.backend_name();
        let source = session.source().to_string();
        session.close()?;

        if progress.files_failed > 0 {
            warn!("{} entries could not be extracted", progress.files_failed);
        }

        Ok(ExtractionReport::new(
            ReportContext {
                source: &source,
                destination: &self.config.output.destination,
                manifest: manifest.path(),
                backend,
                pattern,
                filter: scanner.filter().describe(),
                list_only: self.list_only,
                started_at,
            },
            outcome.statistics,
            &progress,
        ))
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn is_list_only(&self) -> bool {
        self.list_only
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &CascExtractError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// True when deleting `path` would take the source storage or the working
/// directory with it, or when `path` is a filesystem root.
pub fn is_protected_destination(path: &Path, source: &Path) -> bool {
    let Ok(target) = path.canonicalize() else {
        return false;
    };

    if target.parent().is_none() {
        return true;
    }

    if let Ok(source) = source.canonicalize() {
        if source.starts_with(&target) {
            return true;
        }
    }

    match std::env::current_dir().and_then(|cwd| cwd.canonicalize()) {
        Ok(cwd) => cwd.starts_with(&target),
        Err(_) => true,
    }
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn quiet_run(destination: &Path) -> CascExtract {
        let mut config = Config::default();
        config.output.destination = destination.to_path_buf();
        CascExtract::new(config, "memory", OutputMode::Plain, 0, true)
    }

    #[test]
    fn test_creation() {
        let app = CascExtract::new(Config::default(), "/games/d2r", OutputMode::Human, 1, false);
        assert_eq!(app.source(), Path::new("/games/d2r"));
        assert!(!app.is_list_only());
        assert!(!app.progress_manager().is_enabled());
        assert_eq!(app.config().storage.pattern, "*");
    }

    #[test]
    fn test_protected_destinations() {
        let source = Path::new("memory");
        assert!(is_protected_destination(Path::new("."), source));
        assert!(is_protected_destination(Path::new("/"), source));

        let temp_dir = TempDir::new().unwrap();
        assert!(!is_protected_destination(temp_dir.path(), source));
        assert!(!is_protected_destination(&temp_dir.path().join("missing"), source));
    }

    #[test]
    fn test_destination_holding_source_is_protected() {
        let temp_dir = TempDir::new().unwrap();
        let games = temp_dir.path().join("games");
        let storage = games.join("d2r");
        fs::create_dir_all(&storage).unwrap();

        assert!(is_protected_destination(&games, &storage));
        assert!(is_protected_destination(&storage, &storage));
        assert!(!is_protected_destination(&storage.join("out"), &storage));
    }

    #[test]
    fn test_run_keeps_source_below_destination() {
        let temp_dir = TempDir::new().unwrap();
        let games = temp_dir.path().join("games");
        let storage = games.join("d2r");
        fs::create_dir_all(storage.join("data/global/excel")).unwrap();
        fs::write(storage.join("data/global/excel/armor.txt"), "name\tac\n").unwrap();

        let mut config = Config::default();
        config.output.destination = games.clone();
        config.storage.backend = StorageBackend::Loose;

        let report = CascExtract::new(config, &storage, OutputMode::Plain, 0, true)
            .run()
            .unwrap();

        assert!(storage.join("data/global/excel/armor.txt").is_file());
        assert_eq!(report.files_extracted, 1);
        assert!(games.join("data/global/excel/armor.txt").is_file());
        assert!(games.join("list-file-d2r.txt").is_file());
    }

    #[test]
    fn test_reset_removes_tree_and_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("out");
        fs::create_dir_all(destination.join("data/global")).unwrap();
        fs::write(destination.join("data/global/stale.txt"), "old").unwrap();
        fs::write(destination.join("list-file-d2r.txt"), "old\n").unwrap();

        quiet_run(&destination).reset_destination().unwrap();
        assert!(!destination.exists());
    }

    #[test]
    fn test_list_only_reset_keeps_tree() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("out");
        fs::create_dir_all(destination.join("data")).unwrap();
        fs::write(destination.join("data/keep.txt"), "keep").unwrap();
        fs::write(destination.join("list-file-d2r.txt"), "old\n").unwrap();

        quiet_run(&destination)
            .with_list_only(true)
            .reset_destination()
            .unwrap();
        assert!(destination.join("data/keep.txt").exists());
        assert!(!destination.join("list-file-d2r.txt").exists());
    }

    #[test]
    fn test_strict_clean_on_missing_destination() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output.destination = temp_dir.path().join("never-created");
        config.output.missing_destination = MissingDirPolicy::Error;

        let app = CascExtract::new(config, "memory", OutputMode::Plain, 0, true);
        assert!(matches!(
            app.reset_destination(),
            Err(CascExtractError::DirectoryMissing { .. })
        ));
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        CascExtract::generate_sample_config(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[storage]"));
        assert!(content.contains("[filter]"));
        assert!(content.contains("[output]"));
    }

    #[test]
    fn test_version_info() {
        assert!(!version_info().is_empty());
    }
}
