//! Core domain types for the Pagesmith pipeline.

use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;

// ---------------------------------------------------------------------------
// ConnectorRecord
// ---------------------------------------------------------------------------

/// A third-party connector for which a marketing page is generated.
///
/// Loaded once from the static dataset and never mutated; the name is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    /// Display name, unique within the dataset.
    pub name: String,
    /// Product category (e.g. "CRM").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// Short description of what the connector does.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Logo URL used as the page icon and social image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl ConnectorRecord {
    /// Create a record with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: String::new(),
            description: String::new(),
            logo: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger status
// ---------------------------------------------------------------------------

/// Processing status of a connector in the progress ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    #[default]
    Pending,
    Published,
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Published => f.write_str("published"),
        }
    }
}

/// Pipeline stage a per-connector failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Generation,
    Publish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Research => f.write_str("research"),
            Self::Generation => f.write_str("generation"),
            Self::Publish => f.write_str("publish"),
        }
    }
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// Keyword competition estimated from the number of ads on the results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Competition {
    #[default]
    Low,
    Medium,
    High,
}

impl Competition {
    /// Classify competition by ad count: 3+ is high, 1-2 medium, none low.
    pub fn from_ad_count(ads: usize) -> Self {
        match ads {
            0 => Self::Low,
            1 | 2 => Self::Medium,
            _ => Self::High,
        }
    }
}

/// A single organic search result kept as factual context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// Aggregated search research for one connector. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    /// The keyword the page should rank for.
    pub primary_keyword: String,
    /// Related searches.
    pub related_keywords: Vec<String>,
    /// "People also ask" style questions.
    pub long_tail_keywords: Vec<String>,
    /// Factual snippets across all queries, de-duplicated by link.
    pub snippets: Vec<SearchSnippet>,
    /// Competition estimate for the primary keyword.
    pub competition: Competition,
    /// Number of search requests issued to build this result.
    pub queries_issued: u32,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Token usage reported by the language-model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Labeled page text returned by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPage {
    /// Connector the page was generated for.
    pub connector: String,
    /// Raw labeled text (`[Title]`, `[Overview paragraph]`, ...).
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// Token usage of the completion.
    pub usage: TokenUsage,
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// Whether the CMS write created a new record or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishAction {
    Created,
    Updated,
}

/// Confirmation of a successful CMS write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Identifier assigned by the CMS.
    pub page_id: String,
    /// URL slug the page was published under.
    pub slug: String,
    pub action: PublishAction,
    /// SHA-256 of the published page text.
    pub content_sha256: String,
}

// ---------------------------------------------------------------------------
// Cost
// ---------------------------------------------------------------------------

/// Running cost estimate for a run (USD).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostEstimate {
    pub search_queries: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub usd: f64,
}

impl CostEstimate {
    /// Add the cost of `searches` search requests.
    pub fn charge_searches(&mut self, pricing: &PricingConfig, searches: u32) {
        self.search_queries += u64::from(searches);
        self.usd += f64::from(searches) * pricing.per_search;
    }

    /// Add the cost of one completion.
    pub fn charge_tokens(&mut self, pricing: &PricingConfig, usage: TokenUsage) {
        self.tokens_in += usage.tokens_in;
        self.tokens_out += usage.tokens_out;
        self.usd += usage.tokens_in as f64 * pricing.input_per_million / 1_000_000.0
            + usage.tokens_out as f64 * pricing.output_per_million / 1_000_000.0;
    }

    /// Add whatever a failed stage had already spent.
    pub fn charge_spend(&mut self, pricing: &PricingConfig, spend: StageSpend) {
        self.charge_searches(pricing, spend.searches);
        self.charge_tokens(pricing, spend.usage);
    }
}

/// Provider usage a stage incurred before it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageSpend {
    pub searches: u32,
    pub usage: TokenUsage,
}

impl StageSpend {
    pub fn searches(searches: u32) -> Self {
        Self {
            searches,
            ..Self::default()
        }
    }

    pub fn tokens(usage: TokenUsage) -> Self {
        Self {
            usage,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.searches == 0 && self.usage == TokenUsage::default()
    }
}

impl std::fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "${:.4} ({} searches, {} tokens in, {} tokens out)",
            self.usd, self.search_queries, self.tokens_in, self.tokens_out
        )
    }
}
