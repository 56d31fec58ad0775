//! Prompt construction.
//!
//! The prompt is a pure function of the connector record, its research and
//! the brand settings: the same inputs always produce the same text.

use std::fmt::Write;

use pagesmith_shared::{BrandConfig, ConnectorRecord, ResearchResult};

/// Section labels the model must emit, in order.
pub const SECTION_LABELS: [&str; 7] = [
    "Title",
    "One-line connector statement",
    "Overview paragraph",
    "Core Capabilities",
    "Common Automation Workflows",
    "Key Benefits",
    "Security and Permissions",
];

/// Keywords of each kind passed into the prompt.
const PROMPT_KEYWORDS: usize = 3;

/// Snippets passed into the prompt as verified facts.
const PROMPT_SNIPPETS: usize = 3;

/// A system + user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the generation prompt for one connector.
pub fn build_prompt(
    record: &ConnectorRecord,
    research: &ResearchResult,
    brand: &BrandConfig,
) -> Prompt {
    let name = record.name.as_str();
    let brand_name = brand.name.as_str();
    let products = join_and(&brand.products);

    let system = format!(
        "You are an expert SaaS copywriter for {brand_name}. You write concise, accurate \
         integration pages in a fixed labeled format."
    );

    let mut user = String::new();
    let _ = writeln!(user, "Generate an SEO-optimized integration page for: {name}");
    if !record.category.is_empty() {
        let _ = writeln!(user, "Category: {}", record.category);
    }
    if !record.description.is_empty() {
        let _ = writeln!(user, "Description: {}", record.description);
    }

    user.push_str("\nFACTUAL RESEARCH ABOUT THIS TOOL:\n");
    user.push_str(&factual_research(name, research));

    user.push_str(
        "\nBase the content only on the research above. Do not invent features or \
         capabilities it does not support. If the research is thin, focus on general \
         integration benefits.\n",
    );

    let _ = write!(
        user,
        "\nSEO KEYWORDS TO INCORPORATE NATURALLY:\n\
         Primary Keyword: {}\n\
         Related Keywords: {}\n\
         Long-tail Keywords: {}\n",
        research.primary_keyword,
        research
            .related_keywords
            .iter()
            .take(PROMPT_KEYWORDS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
        research
            .long_tail_keywords
            .iter()
            .take(PROMPT_KEYWORDS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
    );

    let _ = write!(
        user,
        "\nRULES:\n\
         1. No percentages or numeric performance claims.\n\
         2. Use the keywords naturally, never stuffed.\n\
         3. Be specific to {name} only where the research confirms it.\n\
         4. Mention {products}.\n\
         5. Conversational tone (\"your team\", \"without lifting a finger\").\n\
         6. Mention OAuth 2.0 for security.\n\
         7. No generic compliance claims such as SOC 2 or GDPR readiness.\n\
         8. Use the labeled format below, one label per line.\n"
    );

    let _ = write!(
        user,
        "\nOUTPUT FORMAT:\n\n\
         [Title]\n\
         {name} + {brand_name}: [Action-oriented value proposition]\n\n\
         [One-line connector statement]\n\
         Connect {name} with {brand_name} to [action] and [action]. Power your {products} with [benefit].\n\n\
         [Overview paragraph]\n\
         One paragraph: the problem {brand_name} removes, how the integration works, and the outcome.\n\n\
         [Core Capabilities]\n\
         {brand_name} keeps a bi-directional connection with the following {name} data:\n\
         * [Category]: [Description].\n\
         (six bullets)\n\n\
         [Common Automation Workflows]\n\
         Common automation workflows include:\n\
         * [Workflow name]: [Trigger, action and outcome].\n\
         (three bullets)\n\n\
         [Key Benefits]\n\
         * [Benefit]: [Qualitative outcome].\n\
         (three bullets)\n\n\
         [Security and Permissions]\n\
         {brand_name} [security approach]. The integration respects all existing {name} permissions. \
         OAuth 2.0 authentication ensures only authorized users can access or modify data.\n\n\
         Now write the page for {name}. Output only the labeled content."
    );

    Prompt { system, user }
}

fn factual_research(name: &str, research: &ResearchResult) -> String {
    if research.snippets.is_empty() {
        return format!(
            "Limited public information is available about {name}. Write about general \
             integration capabilities.\n"
        );
    }

    let mut out = String::from("Verified information from search results:\n");
    for snippet in research.snippets.iter().take(PROMPT_SNIPPETS) {
        let _ = writeln!(out, "- {}: {}", snippet.title, snippet.snippet);
    }
    out
}

/// "A", "A and B", "A, B and C".
fn join_and(items: &[String]) -> String {
    match items {
        [] => String::from("your workflows"),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}
