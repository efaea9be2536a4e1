//! Context formatting: retrieved documents into a prompt section.

use super::RetrievedDoc;

/// Separator between documents in the rendered context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Header used when the agent config carries no template.
pub const DEFAULT_CONTEXT_HEADER: &str = "## Relevant Context:\n\n";

/// Joins document contents and renders them through the template, if any.
/// The template's `{{context}}` placeholder is replaced with the joined text;
/// without a template, the default header is prepended.
pub fn format_context(docs: &[RetrievedDoc], template: Option<&str>) -> String {
    let joined = docs
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    match template {
        Some(template) => template.replace("{{context}}", &joined),
        None => format!("{DEFAULT_CONTEXT_HEADER}{joined}"),
    }
}
