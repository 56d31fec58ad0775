//! Connector registry: the static dataset plus the progress ledger.
//!
//! The [`Registry`] is the single owner of pipeline state. It is opened once
//! by the CLI and passed by `&mut` to the driver; every mutation is flushed
//! to disk before it returns.

mod dataset;
mod ledger;

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use pagesmith_shared::{
    ConnectorRecord, LedgerStatus, PagesmithError, PublishReceipt, Result, Stage,
};

pub use ledger::{FailureNote, LEDGER_SCHEMA_VERSION, Ledger, LedgerEntry};

/// Summary counts for the `status` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStatus {
    pub total: usize,
    pub published: usize,
    pub remaining: usize,
    /// Pending connectors with at least one recorded failure.
    pub failed: usize,
    /// Name of the next pending connector, if any.
    pub next: Option<String>,
}

/// Ordered connector records joined with their ledger status.
#[derive(Debug)]
pub struct Registry {
    records: Vec<ConnectorRecord>,
    legacy_published: HashSet<String>,
    ledger: Ledger,
}

impl Registry {
    /// Load the dataset and the ledger. Nothing is written here.
    pub fn open(dataset_path: &Path, ledger_path: &Path) -> Result<Self> {
        let dataset = dataset::load_dataset(dataset_path)?;
        let ledger = Ledger::load_or_create(ledger_path)?;

        info!(
            dataset = %dataset_path.display(),
            ledger = %ledger_path.display(),
            connectors = dataset.records.len(),
            "registry opened"
        );

        Ok(Self {
            records: dataset.records,
            legacy_published: dataset.legacy_published,
            ledger,
        })
    }

    /// All connector records in dataset order.
    pub fn list_all(&self) -> &[ConnectorRecord] {
        &self.records
    }

    /// Look up a record by name.
    pub fn get(&self, name: &str) -> Option<&ConnectorRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Effective status of a connector, or `None` if it is not in the dataset.
    pub fn status_of(&self, name: &str) -> Option<LedgerStatus> {
        self.get(name).map(|r| self.effective_status(&r.name))
    }

    /// Ledger entry for a connector, if one has been written.
    pub fn ledger_entry(&self, name: &str) -> Option<&LedgerEntry> {
        self.ledger.entry(name)
    }

    /// First record whose status is pending.
    pub fn next_pending(&self) -> Option<&ConnectorRecord> {
        self.records
            .iter()
            .find(|r| self.effective_status(&r.name) == LedgerStatus::Pending)
    }

    /// First pending record whose name is not in `skip`.
    pub fn next_pending_excluding(&self, skip: &HashSet<String>) -> Option<&ConnectorRecord> {
        self.records.iter().find(|r| {
            !skip.contains(&r.name) && self.effective_status(&r.name) == LedgerStatus::Pending
        })
    }

    /// Record a confirmed CMS write and persist the ledger.
    pub fn mark_published(&mut self, name: &str, receipt: &PublishReceipt) -> Result<()> {
        let seed = self.seed_status(name)?;
        let now = Utc::now();

        self.ledger.update(name, seed, |entry| {
            entry.status = LedgerStatus::Published;
            entry.page_id = Some(receipt.page_id.clone());
            entry.published_at = Some(now);
            entry.content_sha256 = Some(receipt.content_sha256.clone());
            entry.last_error = None;
        })?;

        debug!(connector = name, page_id = %receipt.page_id, "marked published");
        Ok(())
    }

    /// Record a failed attempt. The connector stays pending.
    pub fn record_failure(&mut self, name: &str, stage: Stage, reason: &str) -> Result<()> {
        let seed = self.seed_status(name)?;
        let now = Utc::now();

        self.ledger.update(name, seed, |entry| {
            entry.attempts += 1;
            entry.last_error = Some(FailureNote {
                stage,
                reason: reason.to_string(),
                at: now,
            });
        })?;

        debug!(connector = name, %stage, "failure recorded");
        Ok(())
    }

    /// Counts over the whole dataset.
    pub fn status(&self) -> RegistryStatus {
        let mut published = 0;
        let mut failed = 0;

        for record in &self.records {
            match self.effective_status(&record.name) {
                LedgerStatus::Published => published += 1,
                LedgerStatus::Pending => {
                    if self
                        .ledger
                        .entry(&record.name)
                        .is_some_and(|e| e.last_error.is_some())
                    {
                        failed += 1;
                    }
                }
            }
        }

        RegistryStatus {
            total: self.records.len(),
            published,
            remaining: self.records.len() - published,
            failed,
            next: self.next_pending().map(|r| r.name.clone()),
        }
    }

    fn effective_status(&self, name: &str) -> LedgerStatus {
        match self.ledger.entry(name) {
            Some(entry) => entry.status,
            None if self.legacy_published.contains(name) => LedgerStatus::Published,
            None => LedgerStatus::Pending,
        }
    }

    /// Status a fresh ledger entry starts from; errors for unknown names.
    fn seed_status(&self, name: &str) -> Result<LedgerStatus> {
        if self.get(name).is_none() {
            return Err(PagesmithError::validation(format!(
                "unknown connector '{name}'"
            )));
        }
        Ok(if self.legacy_published.contains(name) {
            LedgerStatus::Published
        } else {
            LedgerStatus::Pending
        })
    }
}
