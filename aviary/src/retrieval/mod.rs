//! Retrieval-augmented generation support.
//!
//! A [`RetrievalClient`] embeds the query, asks the configured vector backend
//! for candidates, filters by minimum score, and hands ordered documents to
//! the prompt assembler. Backends are behaviorally three: a cloud index with
//! host resolution and namespaces (Pinecone-style), an HTTP collection query
//! with distances (Chroma-style), and a SQL-extension REST sidecar
//! (pgvector-style).

pub mod chroma;
pub mod context;
pub mod embedder;
pub mod pgvector;
pub mod pinecone;

pub use chroma::ChromaStore;
pub use context::{format_context, CONTEXT_SEPARATOR, DEFAULT_CONTEXT_HEADER};
pub use embedder::GeminiEmbedder;
pub use pgvector::PgvectorStore;
pub use pinecone::PineconeStore;

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent_config::{RetrievalConfig, RetrievalProvider};

/// One retrieved document with a normalized score in [0, 1].
#[derive(Clone, Debug)]
pub struct RetrievedDoc {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub metadata: Option<Value>,
}

/// Errors from embedding or vector search.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("http: {0}")]
    Http(String),
    #[error("backend: {0}")]
    Backend(String),
    #[error("embedding: {0}")]
    Embedding(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

/// Query-to-vector embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

/// Vector search backend. `min_score` is advisory (backends that can push the
/// filter down do, the client re-filters regardless).
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedDoc>, RetrievalError>;
}

/// Embedder + backend + policy for one agent.
pub struct RetrievalClient {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
    min_score: f32,
    context_template: Option<String>,
}

impl RetrievalClient {
    pub fn new(
        config: &RetrievalConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k: config.top_k,
            min_score: config.min_score,
            context_template: config.context_template.clone(),
        }
    }

    /// Builds the backend named by the config from environment credentials.
    /// Construction never touches the network; missing credentials surface on
    /// the first query.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        let store: Arc<dyn VectorStore> = match config.provider {
            RetrievalProvider::Pinecone => Arc::new(PineconeStore::from_env(
                &config.index,
                config.namespace.clone(),
            )),
            RetrievalProvider::Chroma => Arc::new(ChromaStore::from_env(&config.index)),
            RetrievalProvider::Pgvector => Arc::new(PgvectorStore::from_env(&config.index)),
        };
        Self::new(config, Arc::new(GeminiEmbedder::from_env()), store)
    }

    /// Embed the query, search, filter to `score >= min_score`, order by
    /// descending score, truncate to `top_k`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDoc>, RetrievalError> {
        let embedding = self.embedder.embed(query).await?;
        let mut docs = self
            .store
            .query(&embedding, self.top_k, self.min_score)
            .await?;
        let min_score = self.min_score;
        docs.retain(|d| d.score >= min_score);
        docs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        docs.truncate(self.top_k);
        Ok(docs)
    }

    pub fn context_template(&self) -> Option<&str> {
        self.context_template.as_deref()
    }
}
