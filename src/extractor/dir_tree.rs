use crate::error::{CascExtractError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// What `delete_tree` does when the directory is already gone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingDirPolicy {
    #[default]
    Ignore,
    Error,
}

/// Recursive directory operations used to reset and populate the destination.
pub trait FileSystem {
    /// Creates `path` and any missing ancestors. Returns how many directories
    /// were created; an existing directory counts as success.
    fn create_tree(&self, path: &Path) -> Result<usize>;

    /// Removes `path` and everything below it. Stops at the first failure.
    fn delete_tree(&self, path: &Path, policy: MissingDirPolicy) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    fn remove_contents(&self, dir: &Path) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| delete_error(dir, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| delete_error(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| delete_error(&path, e))?;

            if file_type.is_dir() {
                self.remove_contents(&path)?;
                fs::remove_dir(&path).map_err(|e| delete_error(&path, e))?;
            } else {
                // Symlinks land here too, so their targets are left alone.
                fs::remove_file(&path).map_err(|e| delete_error(&path, e))?;
            }
            trace!("Deleted {}", path.display());
        }

        Ok(())
    }
}

impl FileSystem for LocalFileSystem {
    fn create_tree(&self, path: &Path) -> Result<usize> {
        let mut missing: Vec<PathBuf> = Vec::new();
        let mut current = Some(path);

        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }

            match fs::metadata(dir) {
                Ok(metadata) if metadata.is_dir() => break,
                Ok(_) => {
                    return Err(create_error(
                        dir,
                        io::Error::new(io::ErrorKind::AlreadyExists, "exists and is not a directory"),
                    ));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    missing.push(dir.to_path_buf());
                    current = dir.parent();
                }
                Err(e) => return Err(create_error(dir, e)),
            }
        }

        let mut created = 0;
        for dir in missing.iter().rev() {
            match fs::create_dir(dir) {
                Ok(()) => created += 1,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
                Err(e) => return Err(create_error(dir, e)),
            }
        }

        if created > 0 {
            debug!("Created {} directories for {}", created, path.display());
        }
        Ok(created)
    }

    fn delete_tree(&self, path: &Path, policy: MissingDirPolicy) -> Result<()> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return match policy {
                    MissingDirPolicy::Ignore => {
                        debug!("Nothing to delete at {}", path.display());
                        Ok(())
                    }
                    MissingDirPolicy::Error => Err(CascExtractError::DirectoryMissing {
                        path: path.display().to_string(),
                    }),
                };
            }
            Err(e) => return Err(delete_error(path, e)),
        };

        if metadata.is_dir() {
            self.remove_contents(path)?;
            fs::remove_dir(path).map_err(|e| delete_error(path, e))?;
        } else {
            fs::remove_file(path).map_err(|e| delete_error(path, e))?;
        }

        debug!("Deleted {}", path.display());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

fn create_error(path: &Path, source: io::Error) -> CascExtractError {
    CascExtractError::DirectoryCreate {
        path: path.display().to_string(),
        code: source.raw_os_error(),
        source,
    }
}

fn delete_error(path: &Path, source: io::Error) -> CascExtractError {
    CascExtractError::DirectoryDelete {
        path: path.display().to_string(),
        code: source.raw_os_error(),
        source,
    }
}
