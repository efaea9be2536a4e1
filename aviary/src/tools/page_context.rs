//! Per-request page-content tool.
//!
//! When a chat request carries `metadata.pageContext`, the agent injects a
//! `getPageContent` tool whose argument selects a slice of the captured page:
//! the whole text, the `--- Data Tables ---` section, the
//! `--- Form Fields ---` section, or just the markdown heading lines.

use serde_json::{json, Value};

use super::Tool;

/// Name of the injected tool.
pub const PAGE_CONTENT_TOOL: &str = "getPageContent";

const TABLES_MARKER: &str = "--- Data Tables ---";
const FORMS_MARKER: &str = "--- Form Fields ---";

/// Which slice of the page to return.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PageSection {
    #[default]
    All,
    Tables,
    Forms,
    Headings,
}

impl PageSection {
    fn parse(raw: Option<&str>) -> PageSection {
        match raw {
            Some("tables") => PageSection::Tables,
            Some("forms") => PageSection::Forms,
            Some("headings") => PageSection::Headings,
            _ => PageSection::All,
        }
    }
}

/// Extracts the requested section from the captured page text.
///
/// Marker sections run from the line after their marker to the next
/// `--- … ---` marker line or the end of the page; a missing marker yields an
/// empty string.
pub fn extract_section(page: &str, section: PageSection) -> String {
    match section {
        PageSection::All => page.to_string(),
        PageSection::Tables => marker_section(page, TABLES_MARKER),
        PageSection::Forms => marker_section(page, FORMS_MARKER),
        PageSection::Headings => page
            .lines()
            .filter(|line| line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn is_marker_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("--- ") && trimmed.ends_with(" ---")
}

fn marker_section(page: &str, marker: &str) -> String {
    let mut collected: Vec<&str> = Vec::new();
    let mut inside = false;
    for line in page.lines() {
        if line.trim() == marker {
            inside = true;
            continue;
        }
        if inside && is_marker_line(line) {
            break;
        }
        if inside {
            collected.push(line);
        }
    }
    collected.join("\n").trim().to_string()
}

/// Builds the `getPageContent` tool over a captured page snapshot.
pub fn page_content_tool(page: String) -> Tool {
    let parameters = json!({
        "type": "object",
        "properties": {
            "section": {
                "type": "string",
                "enum": ["all", "tables", "forms", "headings"],
                "description": "Which part of the page to return; defaults to all"
            }
        }
    });
    Tool::new(
        PAGE_CONTENT_TOOL,
        "Returns the content of the page the user is currently viewing",
        parameters,
        move |args| {
            let page = page.clone();
            Box::pin(async move {
                let section = PageSection::parse(args.get("section").and_then(Value::as_str));
                Ok(Value::String(extract_section(&page, section)))
            })
        },
    )
}
