//! HTML body rendering for parsed pages.

use crate::parser::{ListSection, PageFields};

/// Render the page body. All text is HTML-escaped.
pub fn render_html(fields: &PageFields) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("<h1>{}</h1>", escape(&fields.title)));

    if let Some(one_liner) = &fields.one_liner {
        parts.push(format!("<p class='lead'>{}</p>", escape(one_liner)));
    }
    if let Some(overview) = &fields.overview {
        parts.push(format!("<h2>Overview</h2><p>{}</p>", escape(overview)));
    }

    for (heading, section) in [
        ("Core Capabilities", &fields.capabilities),
        ("Common Automation Workflows", &fields.workflows),
        ("Key Benefits", &fields.benefits),
    ] {
        if let Some(section) = section {
            parts.push(format!("<h2>{heading}</h2>"));
            parts.push(render_list(section));
        }
    }

    if let Some(security) = &fields.security {
        let body: String = security
            .split("\n\n")
            .map(|p| format!("<p>{}</p>", escape(p)))
            .collect();
        parts.push(format!("<h2>Security and Permissions</h2>{body}"));
    }

    parts.join("\n")
}

fn render_list(section: &ListSection) -> String {
    let mut out = String::new();

    if let Some(lead) = &section.lead {
        out.push_str(&format!("<p>{}</p>", escape(lead)));
        if !section.items.is_empty() {
            out.push('\n');
        }
    }

    if !section.items.is_empty() {
        out.push_str("<ul>\n");
        for item in &section.items {
            match &item.label {
                Some(label) => out.push_str(&format!(
                    "<li><p><span style='font-weight: 600;'>{}:</span> {}</p></li>\n",
                    escape(label),
                    escape(&item.text)
                )),
                None => out.push_str(&format!("<li><p>{}</p></li>\n", escape(&item.text))),
            }
        }
        out.push_str("</ul>");
    }

    out
}

/// Escape text for inclusion in HTML element content or quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{BulletItem, parse_page, tests::SAMPLE};

    #[test]
    fn renders_sample_page() {
        let html = render_html(&parse_page(SAMPLE).unwrap());

        assert!(html.starts_with("<h1>HubSpot + Ruh AI: Automated CRM Intelligence</h1>"));
        assert!(html.contains("<p class='lead'>Connect HubSpot"));
        assert!(html.contains("<h2>Overview</h2><p>Ruh AI eliminates"));
        assert!(html.contains("<h2>Core Capabilities</h2>"));
        assert!(html.contains(
            "<li><p><span style='font-weight: 600;'>Identity Data:</span> Contacts, companies, and custom properties.</p></li>"
        ));
        assert!(html.contains("<li><p>Plain benefit without a label</p></li>"));
        assert!(html.contains("<h2>Security and Permissions</h2><p>Ruh AI prioritizes"));
    }

    #[test]
    fn escapes_markup() {
        let fields = PageFields {
            title: "A <b>bold</b> & \"quoted\" title".into(),
            one_liner: None,
            overview: None,
            capabilities: Some(ListSection {
                lead: None,
                items: vec![BulletItem {
                    label: Some("<script>".into()),
                    text: "it's fine".into(),
                }],
            }),
            workflows: None,
            benefits: None,
            security: None,
        };
        let html = render_html(&fields);
        assert!(html.contains("<h1>A &lt;b&gt;bold&lt;/b&gt; &amp; &quot;quoted&quot; title</h1>"));
        assert!(html.contains("&lt;script&gt;:</span> it&#39;s fine"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn skips_absent_sections() {
        let fields = PageFields {
            title: "T".into(),
            one_liner: None,
            overview: Some("O".into()),
            capabilities: None,
            workflows: None,
            benefits: None,
            security: None,
        };
        assert_eq!(render_html(&fields), "<h1>T</h1>\n<h2>Overview</h2><p>O</p>");
    }
}
