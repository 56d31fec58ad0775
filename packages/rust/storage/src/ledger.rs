//! Progress ledger persisted as a JSON file.
//!
//! The ledger is the only mutable state in Pagesmith. Every mutation is
//! applied to a copy, written atomically (temp file + rename) and only then
//! swapped into memory, so the in-memory view never runs ahead of disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use pagesmith_shared::{LedgerStatus, PagesmithError, Result, Stage};

/// Current on-disk layout version.
pub const LEDGER_SCHEMA_VERSION: u32 = 1;

/// The most recent failure recorded for a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNote {
    pub stage: Stage,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Per-connector ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub status: LedgerStatus,
    /// CMS identifier, present iff published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sha256: Option<String>,
    /// Failed attempts so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<FailureNote>,
}

impl LedgerEntry {
    fn seeded(status: LedgerStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LedgerFile {
    schema_version: u32,
    #[serde(default)]
    entries: BTreeMap<String, LedgerEntry>,
}

impl Default for LedgerFile {
    fn default() -> Self {
        Self {
            schema_version: LEDGER_SCHEMA_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Handle to the ledger file and its in-memory contents.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    file: LedgerFile,
}

impl Ledger {
    /// Load the ledger at `path`. A missing file is an empty ledger and is
    /// not created until the first mutation.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        let file = match std::fs::read_to_string(path) {
            Ok(content) => parse_ledger(path, &content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger yet, starting empty");
                LedgerFile::default()
            }
            Err(e) => return Err(PagesmithError::io(path, e)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn entry(&self, name: &str) -> Option<&LedgerEntry> {
        self.file.entries.get(name)
    }

    /// Apply `mutate` to the entry for `name` and persist the result.
    ///
    /// A missing entry is created with `seed` status first. On write failure
    /// the in-memory ledger is left untouched.
    pub fn update<F>(&mut self, name: &str, seed: LedgerStatus, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut LedgerEntry),
    {
        let mut next = self.file.clone();
        let entry = next
            .entries
            .entry(name.to_string())
            .or_insert_with(|| LedgerEntry::seeded(seed));
        mutate(entry);

        write_atomic(&self.path, &next)?;
        self.file = next;
        Ok(())
    }
}

fn parse_ledger(path: &Path, content: &str) -> Result<LedgerFile> {
    let file: LedgerFile = serde_json::from_str(content)
        .map_err(|e| PagesmithError::Ledger(format!("{}: {e}", path.display())))?;

    if file.schema_version > LEDGER_SCHEMA_VERSION {
        return Err(PagesmithError::Ledger(format!(
            "{}: schema version {} is newer than supported version {}",
            path.display(),
            file.schema_version,
            LEDGER_SCHEMA_VERSION
        )));
    }

    Ok(file)
}

fn write_atomic(path: &Path, file: &LedgerFile) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PagesmithError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(file)
        .map_err(|e| PagesmithError::Ledger(format!("serialize ledger: {e}")))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger.json".to_string());
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, json).map_err(|e| PagesmithError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| PagesmithError::io(path, e))?;

    debug!(path = %path.display(), entries = file.entries.len(), "ledger written");
    Ok(())
}
