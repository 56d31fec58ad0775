//! Stage seams between the driver and the service clients.

use async_trait::async_trait;

use pagesmith_generator::ContentGenerator;
use pagesmith_publisher::Publisher;
use pagesmith_research::SearchClient;
use pagesmith_shared::{ConnectorRecord, GeneratedPage, PublishReceipt, ResearchResult, Result};

/// Search research for one connector.
#[async_trait]
pub trait Researcher: Send + Sync {
    async fn research(&self, record: &ConnectorRecord) -> Result<ResearchResult>;
}

/// One language-model completion for one connector.
#[async_trait]
pub trait PageGenerator: Send + Sync {
    async fn generate(
        &self,
        record: &ConnectorRecord,
        research: &ResearchResult,
    ) -> Result<GeneratedPage>;
}

/// Create-or-update of one page in the CMS.
#[async_trait]
pub trait PagePublisher: Send + Sync {
    async fn publish(&self, record: &ConnectorRecord, page: &GeneratedPage)
    -> Result<PublishReceipt>;
}

/// The three stages the driver runs per connector.
#[derive(Clone, Copy)]
pub struct Stages<'a> {
    pub researcher: &'a dyn Researcher,
    pub generator: &'a dyn PageGenerator,
    pub publisher: &'a dyn PagePublisher,
}

#[async_trait]
impl Researcher for SearchClient {
    async fn research(&self, record: &ConnectorRecord) -> Result<ResearchResult> {
        SearchClient::research(self, &record.name).await
    }
}

#[async_trait]
impl PageGenerator for ContentGenerator {
    async fn generate(
        &self,
        record: &ConnectorRecord,
        research: &ResearchResult,
    ) -> Result<GeneratedPage> {
        ContentGenerator::generate(self, record, research).await
    }
}

#[async_trait]
impl PagePublisher for Publisher {
    async fn publish(
        &self,
        record: &ConnectorRecord,
        page: &GeneratedPage,
    ) -> Result<PublishReceipt> {
        Publisher::publish(self, record, page).await
    }
}
