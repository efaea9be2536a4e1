//! Cloud index backend with host resolution and namespaces.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::{RetrievalError, RetrievedDoc, VectorStore};

const DEFAULT_CONTROL_URL: &str = "https://api.pinecone.io";

/// Pinecone-style vector store: the index host is resolved from the control
/// plane on first query and cached for the life of the store.
pub struct PineconeStore {
    http: reqwest::Client,
    api_key: Option<String>,
    control_url: String,
    index: String,
    namespace: Option<String>,
    host: OnceCell<String>,
}

impl PineconeStore {
    pub fn from_env(index: &str, namespace: Option<String>) -> Self {
        Self::new(
            std::env::var("PINECONE_BASE_URL").unwrap_or_else(|_| DEFAULT_CONTROL_URL.into()),
            std::env::var("PINECONE_API_KEY").ok(),
            index,
            namespace,
        )
    }

    pub fn new(
        control_url: impl Into<String>,
        api_key: Option<String>,
        index: &str,
        namespace: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            control_url: control_url.into().trim_end_matches('/').to_string(),
            index: index.to_string(),
            namespace,
            host: OnceCell::new(),
        }
    }

    fn key(&self) -> Result<&str, RetrievalError> {
        self.api_key.as_deref().ok_or_else(|| {
            RetrievalError::NotConfigured("PINECONE_API_KEY is not set".into())
        })
    }

    /// Resolves the data-plane host for the index and normalizes it to a URL.
    async fn resolve_host(&self) -> Result<String, RetrievalError> {
        let key = self.key()?;
        let url = format!("{}/indexes/{}", self.control_url, self.index);
        let resp = self
            .http
            .get(&url)
            .header("Api-Key", key)
            .send()
            .await
            .map_err(|e| RetrievalError::Http(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RetrievalError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(RetrievalError::Backend(format!(
                "describe index HTTP {}: {}",
                status, text
            )));
        }
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| RetrievalError::Backend(format!("describe index parse: {}", e)))?;
        let host = value
            .get("host")
            .and_then(Value::as_str)
            .ok_or_else(|| RetrievalError::Backend("describe index: no host".into()))?;
        Ok(if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        })
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        _min_score: f32,
    ) -> Result<Vec<RetrievedDoc>, RetrievalError> {
        let key = self.key()?.to_string();
        let host = self
            .host
            .get_or_try_init(|| self.resolve_host())
            .await?
            .clone();

        let mut body = json!({
            "vector": embedding,
            "topK": top_k,
            "includeMetadata": true,
        });
        if let Some(namespace) = &self.namespace {
            body["namespace"] = Value::String(namespace.clone());
        }
        let resp = self
            .http
            .post(format!("{}/query", host))
            .header("Api-Key", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Http(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RetrievalError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(RetrievalError::Backend(format!(
                "query HTTP {}: {}",
                status, text
            )));
        }
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| RetrievalError::Backend(format!("query parse: {}", e)))?;
        let matches = value
            .get("matches")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(matches
            .into_iter()
            .map(|m| {
                let metadata = m.get("metadata").cloned();
                let content = metadata
                    .as_ref()
                    .and_then(|md| {
                        md.get("content")
                            .or_else(|| md.get("text"))
                            .and_then(Value::as_str)
                    })
                    .unwrap_or("")
                    .to_string();
                RetrievedDoc {
                    id: m
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    score: m.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
                    content,
                    metadata,
                }
            })
            .collect())
    }
}
