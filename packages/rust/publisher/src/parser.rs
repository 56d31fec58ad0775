//! Labeled-section parser for generated page text.
//!
//! The model emits sections introduced by label lines such as `[Title]` or
//! `**[Core Capabilities]:**`. Label lines may carry `*`/`#` decoration and a
//! trailing colon; text after the label on the same line starts the section.
//! Only the seven known labels split sections; any other bracketed text is
//! content.

use std::sync::LazyLock;

use pagesmith_shared::{PagesmithError, Result};
use regex::Regex;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parsed page sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFields {
    pub title: String,
    pub one_liner: Option<String>,
    pub overview: Option<String>,
    pub capabilities: Option<ListSection>,
    pub workflows: Option<ListSection>,
    pub benefits: Option<ListSection>,
    pub security: Option<String>,
}

/// A section made of an optional lead sentence and bullet items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSection {
    pub lead: Option<String>,
    pub items: Vec<BulletItem>,
}

/// `* Label: text` or `* text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletItem {
    pub label: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Title,
    OneLiner,
    Overview,
    Capabilities,
    Workflows,
    Benefits,
    Security,
}

impl Label {
    fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "title" => Some(Self::Title),
            "one-line connector statement" => Some(Self::OneLiner),
            "overview paragraph" | "overview" => Some(Self::Overview),
            "core capabilities" => Some(Self::Capabilities),
            "common automation workflows" => Some(Self::Workflows),
            "key benefits" => Some(Self::Benefits),
            "security and permissions" => Some(Self::Security),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// `**[Label]:** rest` with optional decoration.
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s*#]*\[([^\]]+)\][\s*#:]*(.*)$").expect("label regex")
});

/// `* item`, `- item`, `• item`.
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[*\-•]|\d+[.)])\s+(.*)$").expect("bullet regex"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse generated text into [`PageFields`].
///
/// Fails with a publish error when the title is missing or no body section
/// (overview, capabilities, workflows, benefits, security) has content.
pub fn parse_page(text: &str) -> Result<PageFields> {
    let sections = split_sections(text);
    let body = |label: Label| section(&sections, label);

    let title = body(Label::Title)
        .and_then(first_paragraph)
        .ok_or_else(|| PagesmithError::Publish("page text has no [Title] section".into()))?;

    let fields = PageFields {
        title,
        one_liner: body(Label::OneLiner).and_then(first_paragraph),
        overview: body(Label::Overview).and_then(first_paragraph),
        capabilities: body(Label::Capabilities).and_then(list_section),
        workflows: body(Label::Workflows).and_then(list_section),
        benefits: body(Label::Benefits).and_then(list_section),
        security: body(Label::Security).and_then(all_paragraphs),
    };

    if fields.overview.is_none()
        && fields.capabilities.is_none()
        && fields.workflows.is_none()
        && fields.benefits.is_none()
        && fields.security.is_none()
    {
        return Err(PagesmithError::Publish(
            "page text has no body sections".into(),
        ));
    }

    Ok(fields)
}

/// Split into `(label, lines)` pairs. The first occurrence of a label wins;
/// lines before the first label are dropped.
fn split_sections(text: &str) -> Vec<(Label, Vec<String>)> {
    let mut sections: Vec<(Label, Vec<String>)> = Vec::new();
    let mut current: Option<usize> = None;

    for line in text.lines() {
        if let Some((label, rest)) = label_line(line) {
            if sections.iter().any(|(l, _)| *l == label) {
                // Repeated label: ignore its content.
                current = None;
                continue;
            }
            let mut lines = Vec::new();
            if !rest.is_empty() {
                lines.push(rest);
            }
            sections.push((label, lines));
            current = Some(sections.len() - 1);
            continue;
        }

        if let Some(idx) = current {
            sections[idx].1.push(line.trim_end().to_string());
        }
    }

    sections
}

fn section(sections: &[(Label, Vec<String>)], label: Label) -> Option<&[String]> {
    sections
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, lines)| lines.as_slice())
}

fn label_line(line: &str) -> Option<(Label, String)> {
    let caps = LABEL_RE.captures(line.trim())?;
    let label = Label::from_text(&caps[1])?;
    let rest = strip_decoration(&caps[2]).to_string();
    Some((label, rest))
}

/// Trim whitespace and markdown emphasis/heading marks from both ends.
fn strip_decoration(text: &str) -> &str {
    text.trim().trim_matches(|c| c == '*' || c == '#').trim()
}

/// Group non-blank lines into paragraphs joined by single spaces.
fn paragraphs(lines: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(trimmed);
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

fn first_paragraph(lines: &[String]) -> Option<String> {
    paragraphs(lines)
        .into_iter()
        .map(|p| strip_decoration(&p).to_string())
        .find(|p| !p.is_empty())
}

fn all_paragraphs(lines: &[String]) -> Option<String> {
    let joined = paragraphs(lines)
        .iter()
        .map(|p| strip_decoration(p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    (!joined.is_empty()).then_some(joined)
}

fn list_section(lines: &[String]) -> Option<ListSection> {
    let mut lead: Vec<&str> = Vec::new();
    let mut items: Vec<BulletItem> = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(caps) = BULLET_RE.captures(trimmed) {
            if let Some(item) = bullet_item(caps.get(1).map_or("", |m| m.as_str())) {
                items.push(item);
            }
        } else if let Some(last) = items.last_mut() {
            // Wrapped bullet continuation.
            last.text.push(' ');
            last.text.push_str(trimmed);
        } else {
            lead.push(trimmed);
        }
    }

    let lead = (!lead.is_empty()).then(|| lead.join(" "));
    if lead.is_none() && items.is_empty() {
        return None;
    }
    Some(ListSection { lead, items })
}

fn bullet_item(raw: &str) -> Option<BulletItem> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match raw.split_once(':') {
        Some((label, text)) => {
            let label = strip_decoration(label);
            let text = strip_decoration(text);
            if label.is_empty() {
                Some(BulletItem {
                    label: None,
                    text: text.to_string(),
                })
            } else {
                Some(BulletItem {
                    label: Some(label.to_string()),
                    text: text.to_string(),
                })
            }
        }
        None => Some(BulletItem {
            label: None,
            text: strip_decoration(raw).to_string(),
        }),
    }
}
