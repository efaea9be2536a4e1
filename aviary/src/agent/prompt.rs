//! System prompt assembly for one turn.
//!
//! Base prompt, then the retrieval context section (when retrieval returns
//! documents), then the page-content instruction (when the per-request tool
//! was injected). Retrieval failures fall back silently to the base prompt;
//! a user turn is never failed for a retrieval fault.

use crate::agent_config::AgentConfig;
use crate::retrieval::{format_context, RetrievalClient};

/// Appended when `getPageContent` is available this turn.
pub const PAGE_CONTEXT_INSTRUCTION: &str = "The user is viewing a page in their browser. \
Use the getPageContent tool to read it; prefer calling it when the user refers to \
on-screen content such as tables, forms, or headings.";

pub async fn assemble_system_prompt(
    config: &AgentConfig,
    retrieval: Option<&RetrievalClient>,
    query: &str,
    page_tool_present: bool,
) -> String {
    let mut prompt = config.system_prompt.clone();
    if let Some(client) = retrieval {
        match client.retrieve(query).await {
            Ok(docs) if !docs.is_empty() => {
                prompt.push_str("\n\n");
                prompt.push_str(&format_context(&docs, client.context_template()));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(agent = %config.id, error = %e, "retrieval failed, using base system prompt");
            }
        }
    }
    if page_tool_present {
        prompt.push_str("\n\n");
        prompt.push_str(PAGE_CONTEXT_INSTRUCTION);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_config::{RetrievalConfig, RetrievalProvider};
    use crate::retrieval::{Embedder, RetrievalError, RetrievedDoc, VectorStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct OkEmbedder;

    #[async_trait]
    impl Embedder for OkEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(vec![0.0])
        }
    }

    struct FailEmbedder;

    #[async_trait]
    impl Embedder for FailEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Err(RetrievalError::Embedding("no key".into()))
        }
    }

    struct DocsStore(Vec<RetrievedDoc>);

    #[async_trait]
    impl VectorStore for DocsStore {
        async fn query(
            &self,
            _embedding: &[f32],
            _top_k: usize,
            _min_score: f32,
        ) -> Result<Vec<RetrievedDoc>, RetrievalError> {
            Ok(self.0.clone())
        }
    }

    fn retrieval_config(min_score: f32, template: Option<&str>) -> RetrievalConfig {
        RetrievalConfig {
            enabled: true,
            provider: RetrievalProvider::Chroma,
            index: "docs".into(),
            namespace: None,
            top_k: 5,
            min_score,
            context_template: template.map(String::from),
        }
    }

    fn doc(content: &str, score: f32) -> RetrievedDoc {
        RetrievedDoc {
            id: "d".into(),
            content: content.into(),
            score,
            metadata: None,
        }
    }

    fn config() -> AgentConfig {
        crate::agent_config::AgentConfig::minimal("a", "a", "Base prompt.")
    }

    #[tokio::test]
    async fn no_retrieval_yields_exact_base_prompt() {
        let prompt = assemble_system_prompt(&config(), None, "q", false).await;
        assert_eq!(prompt, "Base prompt.");
    }

    #[tokio::test]
    async fn zero_results_yield_exact_base_prompt() {
        let client = RetrievalClient::new(
            &retrieval_config(0.9, None),
            Arc::new(OkEmbedder),
            Arc::new(DocsStore(vec![doc("too weak", 0.1)])),
        );
        let prompt = assemble_system_prompt(&config(), Some(&client), "q", false).await;
        assert_eq!(prompt, "Base prompt.");
    }

    #[tokio::test]
    async fn results_append_context_with_default_header() {
        let client = RetrievalClient::new(
            &retrieval_config(0.0, None),
            Arc::new(OkEmbedder),
            Arc::new(DocsStore(vec![doc("Fact one", 0.9), doc("Fact two", 0.8)])),
        );
        let prompt = assemble_system_prompt(&config(), Some(&client), "q", false).await;
        assert_eq!(
            prompt,
            "Base prompt.\n\n## Relevant Context:\n\nFact one\n\n---\n\nFact two"
        );
    }

    #[tokio::test]
    async fn template_is_used_when_configured() {
        let client = RetrievalClient::new(
            &retrieval_config(0.0, Some("Docs:\n{{context}}")),
            Arc::new(OkEmbedder),
            Arc::new(DocsStore(vec![doc("Fact", 0.9)])),
        );
        let prompt = assemble_system_prompt(&config(), Some(&client), "q", false).await;
        assert_eq!(prompt, "Base prompt.\n\nDocs:\nFact");
    }

    #[tokio::test]
    async fn retrieval_failure_falls_back_silently() {
        let client = RetrievalClient::new(
            &retrieval_config(0.0, None),
            Arc::new(FailEmbedder),
            Arc::new(DocsStore(vec![doc("Fact", 0.9)])),
        );
        let prompt = assemble_system_prompt(&config(), Some(&client), "q", false).await;
        assert_eq!(prompt, "Base prompt.");
    }

    #[tokio::test]
    async fn page_instruction_appended_after_context() {
        let prompt = assemble_system_prompt(&config(), None, "q", true).await;
        assert!(prompt.starts_with("Base prompt.\n\n"));
        assert!(prompt.ends_with(PAGE_CONTEXT_INSTRUCTION));
    }
}
