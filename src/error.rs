use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CascExtractError {
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to open storage '{path}': {message}")]
    StorageOpen {
        path: String,
        message: String,
        code: Option<i32>,
    },

    #[error("Failed to close storage: {message}")]
    StorageClose { message: String, code: Option<i32> },

    #[error("Storage backend '{backend}' is not available: {message}")]
    UnsupportedBackend { backend: String, message: String },

    #[error("Enumeration failed for pattern '{pattern}': {message}")]
    Enumeration {
        pattern: String,
        message: String,
        code: Option<i32>,
    },

    #[error("Failed to open entry '{path}': {message}")]
    EntryOpen { path: String, message: String },

    #[error("Failed to read entry '{path}': {message}")]
    EntryRead { path: String, message: String },

    #[error("Failed to write destination file '{path}'")]
    DestinationWrite {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create directory: {path}")]
    DirectoryCreate {
        path: String,
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    #[error("Failed to delete '{path}'")]
    DirectoryDelete {
        path: String,
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    #[error("Directory does not exist: {path}")]
    DirectoryMissing { path: String },

    #[error("Failed to open manifest for writing: {path}")]
    Manifest {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read listfile: {path}")]
    Listfile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },
}

impl CascExtractError {
    /// Process exit code for a run that aborted with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CascExtractError::StorageOpen { code, .. }
            | CascExtractError::StorageClose { code, .. }
            | CascExtractError::Enumeration { code, .. }
            | CascExtractError::DirectoryCreate { code, .. }
            | CascExtractError::DirectoryDelete { code, .. } => code.unwrap_or(-1),
            CascExtractError::Io(e) => e.raw_os_error().unwrap_or(-1),
            _ => -1,
        }
    }

    /// True for failures that only affect a single entry during extraction.
    pub fn is_per_entry(&self) -> bool {
        matches!(
            self,
            CascExtractError::EntryOpen { .. }
                | CascExtractError::EntryRead { .. }
                | CascExtractError::DestinationWrite { .. }
                | CascExtractError::DirectoryCreate { .. }
                | CascExtractError::InvalidPath { .. }
        )
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for CascExtractError {
    fn user_message(&self) -> String {
        match self {
            CascExtractError::StorageOpen {
                path,
                message,
                code,
            } => match code {
                Some(code) => format!("Failed to open storage '{}' (code {}): {}", path, code, message),
                None => format!("Failed to open storage '{}': {}", path, message),
            },
            CascExtractError::Enumeration {
                pattern, message, ..
            } => {
                format!("Storage search for '{}' failed: {}", pattern, message)
            }
            CascExtractError::DirectoryDelete { path, code, source } => match code {
                Some(code) => format!("Failed to delete '{}' (code {}): {}", path, code, source),
                None => format!("Failed to delete '{}': {}", path, source),
            },
            CascExtractError::DirectoryCreate { path, code, source } => match code {
                Some(code) => format!("Failed to create directory '{}' (code {}): {}", path, code, source),
                None => format!("Failed to create directory '{}': {}", path, source),
            },
            CascExtractError::Manifest { path, source } => {
                format!("Failed to write manifest '{}': {}", path, source)
            }
            CascExtractError::Listfile { path, source } => {
                format!("Failed to read listfile '{}': {}", path, source)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            CascExtractError::InvalidArgument { .. } => Some(
                "Run with --help to see the accepted options. --source must point to an existing storage directory.".to_string()
            ),
            CascExtractError::Config { .. } => Some(
                "Check your configuration file syntax or regenerate one with --generate-config.".to_string()
            ),
            CascExtractError::StorageOpen { .. } => Some(
                "Make sure --source points at the game installation root (the directory containing .build.info) and that the game is not updating.".to_string()
            ),
            CascExtractError::UnsupportedBackend { .. } => Some(
                "Rebuild with `--features casc` to read native CASC storages, or pass --backend loose for unpacked directories.".to_string()
            ),
            CascExtractError::DirectoryMissing { .. } => Some(
                "Drop --strict-clean to treat a missing destination as already clean.".to_string()
            ),
            CascExtractError::DirectoryDelete { .. } => Some(
                "Close any program holding files in the destination directory, or use --no-clean.".to_string()
            ),
            CascExtractError::Manifest { .. } => Some(
                "Ensure you have write permission for the destination directory.".to_string()
            ),
            CascExtractError::Listfile { .. } => Some(
                "Check the --listfile path. The file must contain one storage path per line.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for CascExtractError {
    fn from(error: toml::de::Error) -> Self {
        CascExtractError::Config {
            message: error.to_string(),
        }
    }
}

impl From<regex::Error> for CascExtractError {
    fn from(error: regex::Error) -> Self {
        CascExtractError::InvalidArgument {
            message: format!("invalid wildcard pattern: {}", error),
        }
    }
}

pub type Result<T> = std::result::Result<T, CascExtractError>;
