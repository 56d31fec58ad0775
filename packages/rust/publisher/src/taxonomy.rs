//! Keyword-scored category and tag assignment.
//!
//! Taxonomy files are JSON arrays of `{id, name, keywords}`. Each term is
//! scored by counting its keywords in `"{connector name} {page text}"`
//! (lowercased); a keyword that also appears in the connector name weighs
//! ten per occurrence, any other keyword two.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use pagesmith_shared::{PagesmithError, Result};

/// Categories attached to a page.
pub const MAX_CATEGORIES: usize = 3;

/// Tags attached to a page.
pub const MAX_TAGS: usize = 2;

const NAME_WEIGHT: usize = 10;
const TEXT_WEIGHT: usize = 2;

/// One category or tag known to the CMS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaxonomyTerm {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A list of terms loaded from one taxonomy file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taxonomy {
    terms: Vec<TaxonomyTerm>,
}

impl Taxonomy {
    pub fn new(terms: Vec<TaxonomyTerm>) -> Self {
        Self { terms }
    }

    /// Load a taxonomy file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PagesmithError::io(path, e))?;
        let terms: Vec<TaxonomyTerm> = serde_json::from_str(&content).map_err(|e| {
            PagesmithError::config(format!("invalid taxonomy file {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), terms = terms.len(), "taxonomy loaded");
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[TaxonomyTerm] {
        &self.terms
    }

    /// Ids of the `max` best-scoring terms. Terms scoring zero are never
    /// returned; ties keep file order.
    pub fn best_matches(&self, connector_name: &str, text: &str, max: usize) -> Vec<u64> {
        let name = connector_name.to_lowercase();
        let haystack = format!("{name} {}", text.to_lowercase());

        let mut scored: Vec<(usize, &TaxonomyTerm)> = self
            .terms
            .iter()
            .map(|term| (score(term, &name, &haystack), term))
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps file order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let picked: Vec<&TaxonomyTerm> = scored.into_iter().take(max).map(|(_, t)| t).collect();
        if !picked.is_empty() {
            debug!(
                matched = %picked.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", "),
                "taxonomy terms matched"
            );
        }
        picked.into_iter().map(|t| t.id).collect()
    }
}

fn score(term: &TaxonomyTerm, name: &str, haystack: &str) -> usize {
    term.keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .map(|k| {
            let count = haystack.matches(k.as_str()).count();
            let weight = if name.contains(k.as_str()) {
                NAME_WEIGHT
            } else {
                TEXT_WEIGHT
            };
            count * weight
        })
        .sum()
}

/// Optional category and tag taxonomies.
#[derive(Debug, Clone, Default)]
pub struct Taxonomies {
    pub categories: Option<Taxonomy>,
    pub tags: Option<Taxonomy>,
}

impl Taxonomies {
    /// Load whichever taxonomy files are configured.
    pub fn load(categories: Option<&Path>, tags: Option<&Path>) -> Result<Self> {
        Ok(Self {
            categories: categories.map(Taxonomy::load).transpose()?,
            tags: tags.map(Taxonomy::load).transpose()?,
        })
    }

    /// `(category ids, tag ids)`; `None` where no taxonomy is configured.
    pub fn assign(&self, connector_name: &str, text: &str) -> (Option<Vec<u64>>, Option<Vec<u64>>) {
        (
            self.categories
                .as_ref()
                .map(|t| t.best_matches(connector_name, text, MAX_CATEGORIES)),
            self.tags
                .as_ref()
                .map(|t| t.best_matches(connector_name, text, MAX_TAGS)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(id: u64, name: &str, keywords: &[&str]) -> TaxonomyTerm {
        TaxonomyTerm {
            id,
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn categories() -> Taxonomy {
        Taxonomy::new(vec![
            term(1, "CRM", &["crm", "contact", "deal"]),
            term(2, "Scheduling", &["calendar", "meeting", "schedul"]),
            term(3, "Marketing", &["campaign", "email"]),
            term(4, "Spot", &["spot"]),
            term(5, "Empty", &[""]),
        ])
    }

    #[test]
    fn scores_by_frequency_and_name_weight() {
        let text = "HubSpot is a CRM platform. Contact management, deal tracking, CRM sync, email.";
        let ids = categories().best_matches("HubSpot", text, MAX_CATEGORIES);
        // spot: 2 hits in the name-prefixed text x10 = 20; crm/contact/deal: 4 hits x2 = 8; email: 2
        assert_eq!(ids, vec![4, 1, 3]);
    }

    #[test]
    fn zero_scores_are_excluded() {
        let ids = categories().best_matches("Calendly", "Book a meeting.", MAX_CATEGORIES);
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn ties_keep_file_order() {
        let taxonomy = Taxonomy::new(vec![
            term(7, "B", &["alpha"]),
            term(3, "A", &["beta"]),
        ]);
        assert_eq!(taxonomy.best_matches("X", "alpha beta", MAX_TAGS), vec![7, 3]);
    }

    #[test]
    fn unconfigured_taxonomies_assign_nothing() {
        let (categories, tags) = Taxonomies::default().assign("Slack", "chat");
        assert!(categories.is_none());
        assert!(tags.is_none());
    }

    #[test]
    fn loads_from_file() {
        let dir = std::env::temp_dir().join(format!("pagesmith-taxonomy-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tags.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "name": "Sales", "keywords": ["pipeline"]}, {"id": 2, "name": "Support"}]"#,
        )
        .unwrap();

        let taxonomy = Taxonomy::load(&path).unwrap();
        assert_eq!(taxonomy.terms().len(), 2);
        assert!(taxonomy.terms()[1].keywords.is_empty());

        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            Taxonomy::load(&path).unwrap_err(),
            PagesmithError::Config { .. }
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
