//! Local drafts of generated page text.
//!
//! A draft is written before publishing and removed once the CMS confirms
//! the write, so a failed publish leaves the text on disk for inspection.

use std::path::PathBuf;

use tracing::{debug, warn};

use pagesmith_shared::{PagesmithError, Result};

/// Directory of `<connector>.txt` drafts.
#[derive(Debug, Clone)]
pub struct DraftStore {
    dir: PathBuf,
}

impl DraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Draft path for a connector.
    pub fn path_for(&self, connector: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", file_stem(connector)))
    }

    /// Write (or overwrite) the draft for `connector`.
    pub fn write(&self, connector: &str, text: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| PagesmithError::io(&self.dir, e))?;
        let path = self.path_for(connector);
        std::fs::write(&path, text).map_err(|e| PagesmithError::io(&path, e))?;
        debug!(path = %path.display(), "draft written");
        Ok(path)
    }

    /// Remove the draft for `connector`. A missing draft is not an error;
    /// other failures are logged and ignored.
    pub fn remove(&self, connector: &str) {
        let path = self.path_for(connector);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "draft removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove draft"),
        }
    }
}

/// Lowercase, with spaces and path separators replaced by `-`.
fn file_stem(connector: &str) -> String {
    connector
        .trim()
        .to_lowercase()
        .replace([' ', '/', '\\'], "-")
}
