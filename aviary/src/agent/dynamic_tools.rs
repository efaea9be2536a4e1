//! Per-request tool injection.
//!
//! The per-turn tool table is `static ∪ dynamic(input)`; rules compute the
//! dynamic part from the request alone, so new rules extend the table without
//! touching the loop. The one built-in rule injects `getPageContent` when the
//! request carries `metadata.pageContext`.

use crate::chat::ChatInput;
use crate::tools::{page_content_tool, Tool};

/// One rule mapping a request to extra tools for that turn.
pub trait DynamicToolRule: Send + Sync {
    fn tools_for(&self, input: &ChatInput) -> Vec<Tool>;
}

/// Injects the page-content tool when `metadata.pageContext` is a non-empty
/// string.
pub struct PageContextRule;

impl DynamicToolRule for PageContextRule {
    fn tools_for(&self, input: &ChatInput) -> Vec<Tool> {
        match input.page_context() {
            Some(page) => vec![page_content_tool(page.to_string())],
            None => Vec::new(),
        }
    }
}
