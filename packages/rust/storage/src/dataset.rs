//! Static connector dataset loading.
//!
//! The dataset is either a bare JSON array of records or an object with a
//! `connectors` array. Records may carry a legacy `published` flag from the
//! days when progress was tracked inside the dataset itself.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use pagesmith_shared::{ConnectorRecord, PagesmithError, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    List(Vec<DatasetRecord>),
    Wrapped { connectors: Vec<DatasetRecord> },
}

#[derive(Deserialize)]
struct DatasetRecord {
    #[serde(flatten)]
    record: ConnectorRecord,
    #[serde(default)]
    published: bool,
}

/// Validated, ordered dataset contents.
#[derive(Debug, Clone, Default)]
pub(crate) struct Dataset {
    pub records: Vec<ConnectorRecord>,
    /// Names flagged `"published": true` in the dataset itself.
    pub legacy_published: HashSet<String>,
}

/// Read and validate the dataset at `path`.
pub(crate) fn load_dataset(path: &Path) -> Result<Dataset> {
    let content = std::fs::read_to_string(path).map_err(|e| PagesmithError::io(path, e))?;
    parse_dataset(&content)
        .map_err(|e| match e {
            PagesmithError::Validation { message } => PagesmithError::validation(format!(
                "{}: {message}",
                path.display()
            )),
            other => other,
        })
}

/// Parse dataset JSON. Names must be non-empty and unique.
pub(crate) fn parse_dataset(content: &str) -> Result<Dataset> {
    let file: DatasetFile = serde_json::from_str(content)
        .map_err(|e| PagesmithError::Ledger(format!("invalid connector dataset: {e}")))?;

    let raw = match file {
        DatasetFile::List(records) => records,
        DatasetFile::Wrapped { connectors } => connectors,
    };

    let mut seen = HashSet::with_capacity(raw.len());
    let mut dataset = Dataset {
        records: Vec::with_capacity(raw.len()),
        legacy_published: HashSet::new(),
    };

    for (index, entry) in raw.into_iter().enumerate() {
        let mut record = entry.record;
        record.name = record.name.trim().to_string();

        if record.name.is_empty() {
            return Err(PagesmithError::validation(format!(
                "connector #{index} has an empty name"
            )));
        }
        if !seen.insert(record.name.clone()) {
            return Err(PagesmithError::validation(format!(
                "duplicate connector name '{}'",
                record.name
            )));
        }
        if entry.published {
            dataset.legacy_published.insert(record.name.clone());
        }
        dataset.records.push(record);
    }

    debug!(
        connectors = dataset.records.len(),
        legacy_published = dataset.legacy_published.len(),
        "dataset loaded"
    );

    Ok(dataset)
}
