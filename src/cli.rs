use crate::config::{CliOverrides, Config};
use crate::error::{CascExtractError, Result};
use crate::storage::StorageBackend;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "casc-extract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract data tables from a CASC game storage")]
#[command(
    long_about = "casc-extract searches a CASC storage (or an unpacked copy of one) with a \
                  wildcard pattern, keeps the entries that pass the path filter, copies them \
                  into a destination tree and writes the list of matched paths to a manifest."
)]
#[command(after_help = "EXAMPLES:\n  \
    casc-extract -s \"C:/Games/Diablo II Resurrected\" -d out\n  \
    casc-extract -s /games/d2r -d out -p \"*.txt\" --lowercase\n  \
    casc-extract -s /games/d2r -d out -l wanted-files.txt\n  \
    casc-extract -s ./unpacked --backend loose -d out --list-only")]
pub struct Cli {
    /// Storage root (the game installation directory)
    #[arg(short, long, required_unless_present = "generate_config")]
    pub source: Option<PathBuf>,

    /// Destination directory
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Wildcard pattern passed to the storage search
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Extract exactly the paths listed in FILE (one per line)
    #[arg(short, long, value_name = "FILE")]
    pub listfile: Option<PathBuf>,

    /// Required path suffix for the rules filter
    #[arg(long)]
    pub suffix: Option<String>,

    /// Substring a path must contain for the rules filter
    #[arg(long)]
    pub include: Option<String>,

    /// Substring that excludes a path under the rules filter (empty disables it)
    #[arg(long)]
    pub exclude: Option<String>,

    /// Storage backend
    #[arg(long, value_enum)]
    pub backend: Option<StorageBackend>,

    /// Locale mask for opening entries, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_locale)]
    pub locale: Option<u32>,

    /// Manifest file name inside the destination
    #[arg(long)]
    pub manifest_name: Option<String>,

    /// Only write the manifest, extract nothing
    #[arg(long)]
    pub list_only: bool,

    /// Put every file directly in the destination, by plain name
    #[arg(long)]
    pub flat: bool,

    /// Lowercase destination paths
    #[arg(short = 'c', long)]
    pub lowercase: bool,

    /// Keep the existing destination tree
    #[arg(long, conflicts_with = "strict_clean")]
    pub no_clean: bool,

    /// Fail if the destination to reset does not exist
    #[arg(long)]
    pub strict_clean: bool,

    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show what would be done without touching the filesystem
    #[arg(long)]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long)]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_pattern(self.pattern.clone())
            .with_backend(self.backend)
            .with_locale(self.locale)
            .with_listfile(self.listfile.clone())
            .with_rules(self.suffix.clone(), self.include.clone(), self.exclude.clone())
            .with_destination(self.dest.clone())
            .with_manifest_name(self.manifest_name.clone())
            .with_flat(self.flat)
            .with_lowercase(self.lowercase)
            .with_no_clean(self.no_clean)
            .with_strict_clean(self.strict_clean)
    }

    /// The source path with trailing separators removed.
    pub fn resolved_source(&self) -> Result<PathBuf> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| CascExtractError::InvalidArgument {
                message: "--source is required".to_string(),
            })?;

        let raw = source.to_string_lossy();
        let trimmed = raw.trim_end_matches(['/', '\\']);

        if trimmed.is_empty() {
            // A bare "/" stays as is.
            return Ok(source.clone());
        }

        Ok(PathBuf::from(trimmed))
    }

    /// Default tracing filter level for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }

        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

pub fn parse_locale(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();

    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };

    parsed.map_err(|_| format!("Invalid locale mask: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("casc-extract").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_source_is_required() {
        assert!(Cli::try_parse_from(["casc-extract"]).is_err());
        assert!(Cli::try_parse_from(["casc-extract", "--generate-config"]).is_ok());
    }

    #[test]
    fn test_trailing_separator_is_trimmed() {
        assert_eq!(
            parse(&["-s", "/games/d2r/"]).resolved_source().unwrap(),
            PathBuf::from("/games/d2r")
        );
        assert_eq!(
            parse(&["-s", "C:\\Games\\D2R\\\\"]).resolved_source().unwrap(),
            PathBuf::from("C:\\Games\\D2R")
        );
        assert_eq!(
            parse(&["-s", "/"]).resolved_source().unwrap(),
            PathBuf::from("/")
        );
    }

    #[test]
    fn test_overrides_reach_config() {
        let cli = parse(&[
            "-s", "/games/d2r",
            "-d", "out",
            "-p", "*.txt",
            "--exclude", "",
            "--flat",
            "-c",
            "--locale", "0x4",
        ]);

        let mut config = Config::default();
        config.merge_with_cli_args(&cli.create_cli_overrides());

        assert_eq!(config.output.destination, PathBuf::from("out"));
        assert_eq!(config.storage.pattern, "*.txt");
        assert_eq!(config.storage.locale, 4);
        assert!(config.filter.exclude.is_empty());
        assert!(!config.output.preserve_structure);
        assert!(config.output.lowercase);
    }

    #[test]
    fn test_clean_flags_conflict() {
        let result = Cli::try_parse_from([
            "casc-extract", "-s", "x", "--no-clean", "--strict-clean",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(parse(&["-s", "x"]).log_level(), "warn");
        assert_eq!(parse(&["-s", "x", "-v"]).log_level(), "info");
        assert_eq!(parse(&["-s", "x", "-vvv"]).log_level(), "trace");
        assert_eq!(parse(&["-s", "x", "-q"]).log_level(), "error");
    }

    #[test]
    fn test_parse_locale() {
        assert_eq!(parse_locale("0xFFFFFFFF").unwrap(), u32::MAX);
        assert_eq!(parse_locale("2").unwrap(), 2);
        assert!(parse_locale("enUS").is_err());
        assert!(parse_locale("-1").is_err());
    }
}
