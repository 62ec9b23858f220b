use crate::error::{CascExtractError, Result};
use crate::scanner::MatchSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes the matched path list, one path per line.
pub struct ManifestWriter {
    path: PathBuf,
}

impl ManifestWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes a manifest left by a previous run. A missing file is fine.
    pub fn remove_existing(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed previous manifest {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.error(e)),
        }
    }

    pub fn write(&self, matches: &MatchSet) -> Result<usize> {
        let file = fs::File::create(&self.path).map_err(|e| self.error(e))?;
        let mut writer = BufWriter::new(file);

        for path in matches.iter() {
            writeln!(writer, "{}", path).map_err(|e| self.error(e))?;
        }
        writer.flush().map_err(|e| self.error(e))?;

        info!("Wrote {} paths to {}", matches.len(), self.path.display());
        Ok(matches.len())
    }

    fn error(&self, source: io::Error) -> CascExtractError {
        CascExtractError::Manifest {
            path: self.path.display().to_string(),
            source,
        }
    }
}
