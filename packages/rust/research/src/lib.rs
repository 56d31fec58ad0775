//! Search-engine research for connector pages.
//!
//! For every connector Pagesmith issues a fixed set of queries against a
//! SerpAPI-compatible endpoint: one keyword-research query whose related
//! searches and questions become the page's SEO keywords, then three
//! fact-verification queries whose organic snippets ground the generated copy.
//! Any failed query fails the whole research step; there is no partial result.

mod serp;

use std::collections::HashSet;
use std::time::Duration;

use pagesmith_shared::{
    PagesmithError, ResearchResult, Result, SearchConfig, ServiceEndpoint, StageSpend,
};
use reqwest::Client;
use tracing::{debug, info, instrument};

pub use serp::{OrganicResult, RelatedQuestion, RelatedSearch, SerpResponse};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("Pagesmith/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// The keyword-research query, also used as the primary keyword.
pub fn keyword_query(name: &str) -> String {
    format!("{name} integration")
}

/// Fact-verification queries, in the order they are issued.
pub fn fact_queries(name: &str) -> [String; 3] {
    [
        format!("{name} features"),
        format!("what is {name}"),
        format!("{name} capabilities"),
    ]
}

// ---------------------------------------------------------------------------
// SearchClient
// ---------------------------------------------------------------------------

/// Client for a SerpAPI-compatible search endpoint.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: Client,
    base_url: String,
    api_key: String,
    engine: String,
    country: String,
    language: String,
    results: u32,
}

impl SearchClient {
    /// Build a client from the `[search]` section and resolved credentials.
    pub fn new(config: &SearchConfig, endpoint: &ServiceEndpoint) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PagesmithError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: endpoint.base_url.clone(),
            api_key: endpoint.token.clone(),
            engine: config.engine.clone(),
            country: config.country.clone(),
            language: config.language.clone(),
            results: config.results,
        })
    }

    /// Run a single search query.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<SerpResponse> {
        let num = self.results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("engine", self.engine.as_str()),
                ("gl", self.country.as_str()),
                ("hl", self.language.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            // The request URL carries the API key; keep it out of error text.
            .map_err(|e| PagesmithError::Request(format!("'{query}': {}", e.without_url())))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            PagesmithError::Request(format!("'{query}': failed to read body: {}", e.without_url()))
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<SerpResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| truncate(&body, 200));
            return Err(PagesmithError::Request(format!(
                "'{query}': HTTP {status}: {detail}"
            )));
        }

        let parsed: SerpResponse = serde_json::from_str(&body).map_err(|e| {
            PagesmithError::Request(format!("'{query}': invalid response body: {e}"))
        })?;

        if let Some(error) = parsed.error.as_deref() {
            return Err(PagesmithError::Request(format!("'{query}': {error}")));
        }

        debug!(
            organic = parsed.organic_results.len(),
            related = parsed.related_searches.len(),
            questions = parsed.related_questions.len(),
            ads = parsed.ads.len(),
            "search results received"
        );

        Ok(parsed)
    }

    /// Issue the keyword and fact queries for `name` and aggregate them.
    #[instrument(skip_all, fields(connector = %name))]
    pub async fn research(&self, name: &str) -> Result<ResearchResult> {
        let primary = keyword_query(name);
        let mut snippets = Vec::new();
        let mut seen = HashSet::new();

        info!(query = %primary, "keyword research");
        let keyword_page = self.search(&primary).await?;
        serp::merge_snippets(&mut snippets, &mut seen, keyword_page.snippets());
        let mut queries_issued = 1;

        for query in fact_queries(name) {
            debug!(%query, "fact verification");
            let page = self
                .search(&query)
                .await
                .map_err(|e| e.with_spend(StageSpend::searches(queries_issued)))?;
            serp::merge_snippets(&mut snippets, &mut seen, page.snippets());
            queries_issued += 1;
        }

        let result = ResearchResult {
            related_keywords: keyword_page.related_keywords(&primary),
            long_tail_keywords: keyword_page.long_tail_keywords(&primary),
            competition: keyword_page.competition(),
            primary_keyword: primary,
            snippets,
            queries_issued,
        };

        info!(
            snippets = result.snippets.len(),
            competition = ?result.competition,
            "research complete"
        );

        Ok(result)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
