//! Error types for Pagesmith.
//!
//! Library crates use [`PagesmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::{Stage, StageSpend, TokenUsage};

/// Top-level error type for all Pagesmith operations.
#[derive(Debug, thiserror::Error)]
pub enum PagesmithError {
    /// Configuration loading or validation error (missing credentials included).
    #[error("config error: {message}")]
    Config { message: String },

    /// Search provider unreachable or returned a non-success response.
    #[error("request error: {0}")]
    Request(String),

    /// Language-model failure or malformed/empty completion.
    #[error("generation error: {0}")]
    Generation(String),

    /// CMS rejection, schema mismatch, or unreachable CMS.
    #[error("publish error: {0}")]
    Publish(String),

    /// Dataset or ledger could not be read or persisted.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unknown connector, duplicate names, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A per-connector error raised after the provider had already billed.
    #[error("{source}")]
    Spent {
        spend: StageSpend,
        source: Box<PagesmithError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagesmithError>;

impl PagesmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach usage the failing stage already incurred. Empty spend is dropped.
    pub fn with_spend(self, spend: StageSpend) -> Self {
        if spend.is_empty() {
            return self;
        }
        match self {
            Self::Spent {
                spend: earlier,
                source,
            } => Self::Spent {
                spend: StageSpend {
                    searches: earlier.searches + spend.searches,
                    usage: TokenUsage {
                        tokens_in: earlier.usage.tokens_in + spend.usage.tokens_in,
                        tokens_out: earlier.usage.tokens_out + spend.usage.tokens_out,
                    },
                },
                source,
            },
            other => Self::Spent {
                spend,
                source: Box::new(other),
            },
        }
    }

    /// Usage incurred before this error, if any was recorded.
    pub fn spend(&self) -> Option<StageSpend> {
        match self {
            Self::Spent { spend, .. } => Some(*spend),
            _ => None,
        }
    }

    /// The error without any attached spend.
    pub fn root(&self) -> &PagesmithError {
        match self {
            Self::Spent { source, .. } => source.root(),
            other => other,
        }
    }

    /// The pipeline stage this error belongs to, if it is a per-connector error.
    ///
    /// Errors without a stage (config, ledger, I/O) abort the whole run.
    pub fn stage(&self) -> Option<Stage> {
        match self.root() {
            Self::Request(_) => Some(Stage::Research),
            Self::Generation(_) => Some(Stage::Generation),
            Self::Publish(_) => Some(Stage::Publish),
            _ => None,
        }
    }
}
