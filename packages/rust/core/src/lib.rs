//! Pipeline orchestration for Pagesmith.
//!
//! Ties the connector registry, search research, page generation and CMS
//! publishing together into the sequential batch loop behind `next` and
//! `batch`.

pub mod drafts;
pub mod driver;
pub mod stages;

pub use drafts::DraftStore;
pub use driver::{
    BatchReport, ConnectorOutcome, Driver, ProgressReporter, SilentProgress,
};
pub use stages::{PageGenerator, PagePublisher, Researcher, Stages};
