use crate::error::{CascExtractError, Result};
use crate::extractor::MissingDirPolicy;
use crate::storage::{StorageBackend, LOCALE_ALL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Read size used when streaming an entry to disk.
pub const CHUNK_SIZE: usize = 1_000_000;

pub const DEFAULT_MANIFEST_NAME: &str = "list-file-d2r.txt";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub filter: FilterConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub pattern: String,
    pub backend: StorageBackend,
    pub locale: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Suffix / required substring / excluded substring rules.
    Rules,
    /// Exact match against a pre-loaded allow-list.
    Listfile,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    pub mode: FilterMode,
    pub suffix: String,
    pub include: String,
    pub exclude: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub destination: PathBuf,
    pub manifest_name: String,
    pub preserve_structure: bool,
    pub lowercase: bool,
    pub clean_destination: bool,
    pub missing_destination: MissingDirPolicy,
    pub chunk_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            backend: StorageBackend::Auto,
            locale: LOCALE_ALL,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::Rules,
            suffix: ".txt".to_string(),
            include: "data/global".to_string(),
            exclude: "data/global/excel/base/".to_string(),
            listfile: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("."),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            preserve_structure: true,
            lowercase: false,
            clean_destination: true,
            missing_destination: MissingDirPolicy::Ignore,
            chunk_size: CHUNK_SIZE,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CascExtractError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CascExtractError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| CascExtractError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["casc-extract.toml", ".casc-extract.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref pattern) = cli_args.pattern {
            self.storage.pattern = pattern.clone();
        }

        if let Some(backend) = cli_args.backend {
            self.storage.backend = backend;
        }

        if let Some(locale) = cli_args.locale {
            self.storage.locale = locale;
        }

        if let Some(ref listfile) = cli_args.listfile {
            self.filter.listfile = Some(listfile.clone());
            self.filter.mode = FilterMode::Listfile;
        }

        if let Some(ref suffix) = cli_args.suffix {
            self.filter.suffix = suffix.clone();
        }

        if let Some(ref include) = cli_args.include {
            self.filter.include = include.clone();
        }

        if let Some(ref exclude) = cli_args.exclude {
            self.filter.exclude = exclude.clone();
        }

        if let Some(ref destination) = cli_args.destination {
            self.output.destination = destination.clone();
        }

        if let Some(ref manifest_name) = cli_args.manifest_name {
            self.output.manifest_name = manifest_name.clone();
        }

        if cli_args.flat {
            self.output.preserve_structure = false;
        }

        if cli_args.lowercase {
            self.output.lowercase = true;
        }

        if cli_args.no_clean {
            self.output.clean_destination = false;
        }

        if cli_args.strict_clean {
            self.output.missing_destination = MissingDirPolicy::Error;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.pattern.trim().is_empty() {
            return Err(CascExtractError::Config {
                message: "Search pattern must not be empty".to_string(),
            });
        }

        if self.output.chunk_size == 0 {
            return Err(CascExtractError::Config {
                message: "Chunk size must be greater than 0".to_string(),
            });
        }

        match self.filter.mode {
            FilterMode::Rules => {
                if self.filter.suffix.is_empty() {
                    return Err(CascExtractError::Config {
                        message: "Rules filter requires a non-empty suffix".to_string(),
                    });
                }
            }
            FilterMode::Listfile => {
                if self.filter.listfile.is_none() {
                    return Err(CascExtractError::Config {
                        message: "Listfile filter mode requires a listfile path".to_string(),
                    });
                }
            }
        }

        let name = &self.output.manifest_name;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(CascExtractError::Config {
                message: format!("Manifest name must be a plain file name: '{}'", name),
            });
        }

        Ok(())
    }

    /// Location of the manifest inside the destination directory.
    pub fn manifest_path(&self) -> PathBuf {
        self.output.destination.join(&self.output.manifest_name)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub pattern: Option<String>,
    pub backend: Option<StorageBackend>,
    pub locale: Option<u32>,
    pub listfile: Option<PathBuf>,
    pub suffix: Option<String>,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub destination: Option<PathBuf>,
    pub manifest_name: Option<String>,
    pub flat: bool,
    pub lowercase: bool,
    pub no_clean: bool,
    pub strict_clean: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, pattern: Option<String>) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_backend(mut self, backend: Option<StorageBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_locale(mut self, locale: Option<u32>) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_listfile(mut self, listfile: Option<PathBuf>) -> Self {
        self.listfile = listfile;
        self
    }

    pub fn with_rules(
        mut self,
        suffix: Option<String>,
        include: Option<String>,
        exclude: Option<String>,
    ) -> Self {
        self.suffix = suffix;
        self.include = include;
        self.exclude = exclude;
        self
    }

    pub fn with_destination(mut self, destination: Option<PathBuf>) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_manifest_name(mut self, manifest_name: Option<String>) -> Self {
        self.manifest_name = manifest_name;
        self
    }

    pub fn with_flat(mut self, flat: bool) -> Self {
        self.flat = flat;
        self
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_no_clean(mut self, no_clean: bool) -> Self {
        self.no_clean = no_clean;
        self
    }

    pub fn with_strict_clean(mut self, strict: bool) -> Self {
        self.strict_clean = strict;
        self
    }
}
