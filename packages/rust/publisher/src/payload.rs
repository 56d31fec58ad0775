//! CMS payload assembly.
//!
//! Field names follow the integration collection schema (camelCase). Meta
//! strings are cut to the lengths the CMS validates.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;

use pagesmith_shared::{BrandConfig, ConnectorRecord};

use crate::html::render_html;
use crate::parser::PageFields;

const META_TITLE_MAX: usize = 60;
const META_DESCRIPTION_MAX: usize = 160;
const SOCIAL_TITLE_MAX: usize = 70;
const SOCIAL_DESCRIPTION_MAX: usize = 200;
const MAX_KEYWORDS: usize = 15;

/// The CMS rejects commas in these two fields.
const META_ROBOTS: &str = "index follow";
const META_VIEWPORT: &str = "width=device-width initial-scale=1";

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]{4,}\b").expect("word regex"));

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePayload {
    pub name: String,
    pub hero_title: String,
    pub description: String,
    pub slug: String,
    pub icon: String,
    pub content: String,
    pub faqs: Vec<Faq>,
    pub seo: Seo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<u64>>,
    pub published_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seo {
    pub meta_title: String,
    pub meta_description: String,
    pub meta_image: String,
    pub keywords: String,
    pub meta_robots: String,
    pub meta_viewport: String,
    #[serde(rename = "canonicalURL")]
    pub canonical_url: String,
    pub structured_data: serde_json::Value,
    pub open_graph: OpenGraph,
    pub twitter_card: TwitterCard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenGraph {
    pub og_title: String,
    pub og_description: String,
    pub og_image: String,
    pub og_url: String,
    pub og_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwitterCard {
    pub twitter_card: String,
    pub twitter_title: String,
    pub twitter_description: String,
    pub twitter_image: String,
    pub twitter_site: String,
    pub twitter_creator: String,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Everything besides the parsed fields that goes into a payload.
#[derive(Debug, Clone)]
pub struct PayloadContext<'a> {
    pub record: &'a ConnectorRecord,
    pub brand: &'a BrandConfig,
    pub categories: Option<Vec<u64>>,
    pub tags: Option<Vec<u64>>,
    pub published_at: DateTime<Utc>,
}

/// Build the CMS payload. Deterministic for fixed inputs.
pub fn build_payload(fields: &PageFields, ctx: PayloadContext<'_>) -> PagePayload {
    let name = ctx.record.name.as_str();
    let brand = ctx.brand.name.as_str();
    let slug = slugify(name);
    let page_url = format!("{}/{slug}", ctx.brand.site_url.trim_end_matches('/'));
    let image = ctx.record.logo.clone().unwrap_or_default();

    let description = fields
        .one_liner
        .clone()
        .unwrap_or_else(|| format!("Integrate {name} with {brand} for intelligent automation and seamless workflows."));

    PagePayload {
        name: name.to_string(),
        hero_title: fields.title.clone(),
        description: description.clone(),
        slug,
        icon: image.clone(),
        content: render_html(fields),
        faqs: faqs(name, brand),
        seo: Seo {
            meta_title: truncate_chars(&fields.title, META_TITLE_MAX),
            meta_description: truncate_chars(&description, META_DESCRIPTION_MAX),
            meta_image: image.clone(),
            keywords: keywords(&fields.title, brand),
            meta_robots: META_ROBOTS.into(),
            meta_viewport: META_VIEWPORT.into(),
            canonical_url: page_url.clone(),
            structured_data: serde_json::json!({
                "@context": "https://schema.org",
                "@type": "SoftwareApplication",
                "name": format!("{name} + {brand} Integration"),
                "description": truncate_chars(&description, SOCIAL_DESCRIPTION_MAX),
            }),
            open_graph: OpenGraph {
                og_title: truncate_chars(&fields.title, SOCIAL_TITLE_MAX),
                og_description: truncate_chars(&description, SOCIAL_DESCRIPTION_MAX),
                og_image: image.clone(),
                og_url: page_url,
                og_type: "website".into(),
            },
            twitter_card: TwitterCard {
                twitter_card: "summary_large_image".into(),
                twitter_title: truncate_chars(&fields.title, SOCIAL_TITLE_MAX),
                twitter_description: truncate_chars(&description, SOCIAL_DESCRIPTION_MAX),
                twitter_image: image,
                twitter_site: ctx.brand.twitter_handle.clone(),
                twitter_creator: ctx.brand.twitter_handle.clone(),
            },
        },
        categories: ctx.categories,
        tags: ctx.tags,
        published_at: ctx
            .published_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// URL slug: lowercase, spaces to `-`, parentheses dropped, dots to `-`.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "-")
        .replace(['(', ')'], "")
        .replace('.', "-")
}

/// Comma-separated SEO keywords: title words of four or more letters minus
/// stop words, plus fixed integration terms and the brand. Sorted, at most 15.
pub fn keywords(title: &str, brand: &str) -> String {
    let lowered = title.to_lowercase();
    let mut set: BTreeSet<String> = WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect();

    set.extend(
        ["integration", "automation", "workflow"]
            .into_iter()
            .map(str::to_string),
    );
    let brand = brand.trim().to_lowercase();
    if !brand.is_empty() {
        set.insert(brand);
    }

    set.into_iter()
        .take(MAX_KEYWORDS)
        .collect::<Vec<_>>()
        .join(", ")
}

fn faqs(name: &str, brand: &str) -> Vec<Faq> {
    vec![
        Faq {
            question: format!("What is the {name} integration with {brand}?"),
            answer: format!(
                "The {name} integration with {brand} connects {name} to your {brand} workspace \
                 so data stays in sync and routine work runs automatically."
            ),
        },
        Faq {
            question: format!("How does the {name} integration work?"),
            answer: format!(
                "{brand} keeps a bi-directional connection with {name}, reading the context it \
                 needs and writing results back without manual entry."
            ),
        },
        Faq {
            question: "Is the integration secure?".into(),
            answer: format!(
                "Yes. The integration respects your existing {name} permissions and uses OAuth 2.0 \
                 so only authorized users can access or modify data."
            ),
        },
    ]
}

/// Cut to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
