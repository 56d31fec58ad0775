//! Shared types, error model, and configuration for Pagesmith.
//!
//! This crate is the foundation depended on by all other Pagesmith crates.
//! It provides:
//! - [`PagesmithError`] — the unified error type
//! - Domain types ([`ConnectorRecord`], [`ResearchResult`], [`GeneratedPage`], [`CostEstimate`])
//! - Configuration ([`AppConfig`], [`ServiceCredentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchConfig, BrandConfig, CmsConfig, LlmConfig, PathsConfig, PricingConfig,
    SearchConfig, ServiceCredentials, ServiceEndpoint, config_dir, config_file_path, init_config,
    load_config, load_config_from, resolve_config_path, resolve_services, resolve_services_with,
};
pub use error::{PagesmithError, Result};
pub use types::{
    Competition, ConnectorRecord, CostEstimate, GeneratedPage, LedgerStatus, PublishAction,
    PublishReceipt, ResearchResult, SearchSnippet, Stage, StageSpend, TokenUsage,
};
