//! Publishing generated pages to the headless CMS.
//!
//! Generated text is parsed into labeled sections, rendered to HTML, wrapped
//! in the collection's payload layout with SEO metadata and taxonomy ids, and
//! written with create-or-update semantics keyed on the page slug. A page
//! counts as published only when the CMS answers 2xx with a record id.

mod cms;
mod html;
mod parser;
mod payload;
mod taxonomy;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use pagesmith_shared::{BrandConfig, ConnectorRecord, GeneratedPage, PublishReceipt, Result};

pub use cms::{CmsClient, CmsWrite};
pub use html::{escape, render_html};
pub use parser::{BulletItem, ListSection, PageFields, parse_page};
pub use payload::{
    Faq, OpenGraph, PagePayload, PayloadContext, Seo, TwitterCard, build_payload, keywords,
    slugify,
};
pub use taxonomy::{MAX_CATEGORIES, MAX_TAGS, Taxonomies, Taxonomy, TaxonomyTerm};

/// Turns generated page text into CMS records.
#[derive(Debug, Clone)]
pub struct Publisher {
    cms: CmsClient,
    brand: BrandConfig,
    taxonomies: Taxonomies,
}

impl Publisher {
    pub fn new(cms: CmsClient, brand: BrandConfig, taxonomies: Taxonomies) -> Self {
        Self {
            cms,
            brand,
            taxonomies,
        }
    }

    /// Parse `text` and build the payload without touching the network.
    pub fn prepare(
        &self,
        record: &ConnectorRecord,
        text: &str,
        published_at: DateTime<Utc>,
    ) -> Result<PagePayload> {
        let fields = parse_page(text)?;
        let (categories, tags) = self.taxonomies.assign(&record.name, text);

        Ok(build_payload(
            &fields,
            PayloadContext {
                record,
                brand: &self.brand,
                categories,
                tags,
                published_at,
            },
        ))
    }

    /// Publish a generated page and return the CMS confirmation.
    #[instrument(skip_all, fields(connector = %record.name))]
    pub async fn publish(
        &self,
        record: &ConnectorRecord,
        page: &GeneratedPage,
    ) -> Result<PublishReceipt> {
        let payload = self.prepare(record, &page.text, Utc::now())?;
        let write = self.cms.upsert(&payload.slug, &payload).await?;

        info!(
            page_id = %write.id,
            slug = %payload.slug,
            action = ?write.action,
            "page published"
        );

        Ok(PublishReceipt {
            page_id: write.id,
            slug: payload.slug,
            action: write.action,
            content_sha256: content_sha256(&page.text),
        })
    }
}

/// Hex SHA-256 of page text.
pub fn content_sha256(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
