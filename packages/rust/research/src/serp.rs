//! Search-results page shape and keyword extraction.
//!
//! Only the fields the pipeline uses are modelled; everything else in the
//! provider response is ignored.

use std::collections::HashSet;

use serde::Deserialize;

use pagesmith_shared::{Competition, SearchSnippet};

/// Keywords and snippets kept per query.
pub(crate) const TOP_N: usize = 5;

/// Subset of a SerpAPI-style response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SerpResponse {
    #[serde(default)]
    pub organic_results: Vec<OrganicResult>,
    #[serde(default)]
    pub related_searches: Vec<RelatedSearch>,
    #[serde(default)]
    pub related_questions: Vec<RelatedQuestion>,
    #[serde(default)]
    pub ads: Vec<serde_json::Value>,
    /// Set by the provider on failures, sometimes with HTTP 200.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganicResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedSearch {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelatedQuestion {
    #[serde(default)]
    pub question: String,
}

impl SerpResponse {
    /// Up to five related searches, or a deterministic fallback list.
    pub fn related_keywords(&self, keyword: &str) -> Vec<String> {
        let found = non_empty(self.related_searches.iter().take(TOP_N).map(|r| &r.query));
        if found.is_empty() {
            fallback_related(keyword)
        } else {
            found
        }
    }

    /// Up to five "people also ask" questions, or a deterministic fallback list.
    pub fn long_tail_keywords(&self, keyword: &str) -> Vec<String> {
        let found = non_empty(
            self.related_questions
                .iter()
                .take(TOP_N)
                .map(|q| &q.question),
        );
        if found.is_empty() {
            fallback_long_tail(keyword)
        } else {
            found
        }
    }

    /// Top organic results that carry a snippet.
    pub fn snippets(&self) -> impl Iterator<Item = SearchSnippet> + '_ {
        self.organic_results
            .iter()
            .take(TOP_N)
            .filter(|r| !r.snippet.trim().is_empty())
            .map(|r| SearchSnippet {
                title: r.title.trim().to_string(),
                snippet: r.snippet.trim().to_string(),
                link: r.link.trim().to_string(),
            })
    }

    pub fn competition(&self) -> Competition {
        Competition::from_ad_count(self.ads.len())
    }
}

fn non_empty<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    values
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn fallback_related(keyword: &str) -> Vec<String> {
    vec![
        format!("{keyword} software"),
        format!("{keyword} platform"),
        format!("{keyword} tool"),
        format!("best {keyword}"),
        format!("top {keyword}"),
    ]
}

fn fallback_long_tail(keyword: &str) -> Vec<String> {
    vec![
        format!("how to use {keyword}"),
        format!("{keyword} integration guide"),
        format!("best {keyword} for business"),
        format!("{keyword} automation workflow"),
        format!("{keyword} vs alternatives"),
    ]
}

/// Append `incoming` snippets to `acc`, skipping links already present.
pub(crate) fn merge_snippets(
    acc: &mut Vec<SearchSnippet>,
    seen: &mut HashSet<String>,
    incoming: impl Iterator<Item = SearchSnippet>,
) {
    for snippet in incoming {
        if snippet.link.is_empty() || seen.insert(snippet.link.clone()) {
            acc.push(snippet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SerpResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn extracts_keywords_from_response() {
        let serp = parse(
            r#"{
                "related_searches": [
                    {"query": "hubspot crm"}, {"query": "hubspot api"}, {"query": ""},
                    {"query": "hubspot zapier"}, {"query": "hubspot salesforce"},
                    {"query": "hubspot pricing"}, {"query": "hubspot login"}
                ],
                "related_questions": [{"question": "Is HubSpot free?"}]
            }"#,
        );

        assert_eq!(
            serp.related_keywords("hubspot integration"),
            vec!["hubspot crm", "hubspot api", "hubspot zapier", "hubspot salesforce"]
        );
        assert_eq!(
            serp.long_tail_keywords("hubspot integration"),
            vec!["Is HubSpot free?"]
        );
    }

    #[test]
    fn falls_back_when_sections_are_missing() {
        let serp = parse("{}");
        let related = serp.related_keywords("Slack integration");
        assert_eq!(related.len(), 5);
        assert_eq!(related[0], "Slack integration software");
        assert_eq!(related[3], "best Slack integration");

        let long_tail = serp.long_tail_keywords("Slack integration");
        assert_eq!(long_tail[0], "how to use Slack integration");
        assert_eq!(long_tail[4], "Slack integration vs alternatives");
    }

    #[test]
    fn snippets_skip_blank_and_cap_at_five() {
        let serp = parse(
            r#"{"organic_results": [
                {"title": "A", "snippet": "a", "link": "https://a"},
                {"title": "B", "snippet": "  ", "link": "https://b"},
                {"title": "C", "snippet": "c", "link": "https://c"},
                {"title": "D", "snippet": "d", "link": "https://d"},
                {"title": "E", "snippet": "e", "link": "https://e"},
                {"title": "F", "snippet": "f", "link": "https://f"}
            ]}"#,
        );
        let titles: Vec<_> = serp.snippets().map(|s| s.title).collect();
        assert_eq!(titles, vec!["A", "C", "D", "E"]);
    }

    #[test]
    fn merge_deduplicates_by_link() {
        let mut acc = Vec::new();
        let mut seen = HashSet::new();
        let first = parse(r#"{"organic_results": [{"title": "A", "snippet": "a", "link": "https://a"}]}"#);
        let second = parse(
            r#"{"organic_results": [
                {"title": "A again", "snippet": "a", "link": "https://a"},
                {"title": "B", "snippet": "b", "link": "https://b"}
            ]}"#,
        );
        merge_snippets(&mut acc, &mut seen, first.snippets());
        merge_snippets(&mut acc, &mut seen, second.snippets());

        let titles: Vec<_> = acc.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn competition_from_ads() {
        assert_eq!(parse("{}").competition(), Competition::Low);
        assert_eq!(
            parse(r#"{"ads": [{}, {}, {}, {}]}"#).competition(),
            Competition::High
        );
    }
}
