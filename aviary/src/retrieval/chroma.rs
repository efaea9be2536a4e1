//! HTTP collection backend with distance-based scoring.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{RetrievalError, RetrievedDoc, VectorStore};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Chroma-style vector store: POST a collection query, read parallel arrays
/// of ids/documents/distances/metadatas, convert distance `d` to score
/// `1 / (1 + d)`.
pub struct ChromaStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
}

impl ChromaStore {
    pub fn from_env(collection: &str) -> Self {
        Self::new(
            std::env::var("CHROMA_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            collection,
        )
    }

    pub fn new(base_url: impl Into<String>, collection: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        }
    }
}

fn column<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .and_then(|outer| outer.first())
        .and_then(Value::as_array)
        .map(|inner| inner.iter().collect())
        .unwrap_or_default()
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        _min_score: f32,
    ) -> Result<Vec<RetrievedDoc>, RetrievalError> {
        let url = format!(
            "{}/api/v1/collections/{}/query",
            self.base_url, self.collection
        );
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["documents", "distances", "metadatas"],
        });
        let resp = self
            .http
            .post(&url)
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

        let ids = column(&value, "ids");
        let documents = column(&value, "documents");
        let distances = column(&value, "distances");
        let metadatas = column(&value, "metadatas");

        Ok(ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let distance = distances
                    .get(i)
                    .and_then(|d| d.as_f64())
                    .unwrap_or(f64::MAX);
                RetrievedDoc {
                    id: id.as_str().unwrap_or_default().to_string(),
                    content: documents
                        .get(i)
                        .and_then(|d| d.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    score: (1.0 / (1.0 + distance)) as f32,
                    metadata: metadatas.get(i).map(|m| (*m).clone()).filter(|m| !m.is_null()),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_http_server, MockResponse};

    #[tokio::test]
    async fn query_zips_parallel_arrays_and_converts_distance() {
        let (base_url, seen) = spawn_http_server(vec![MockResponse::json(json!({
            "ids": [["a", "b"]],
            "documents": [["Alpha", "Beta"]],
            "distances": [[0.0, 1.0]],
            "metadatas": [[{"source": "kb"}, null]]
        }))])
        .await;

        let store = ChromaStore::new(base_url, "docs");
        let docs = store.query(&[0.5], 2, 0.0).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a");
        assert!((docs[0].score - 1.0).abs() < 1e-6);
        assert!((docs[1].score - 0.5).abs() < 1e-6);
        assert_eq!(docs[0].metadata.as_ref().unwrap()["source"], "kb");
        assert!(docs[1].metadata.is_none());

        let requests = seen.lock().unwrap();
        assert!(requests[0]
            .headers
            .contains("POST /api/v1/collections/docs/query"));
        let body: Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["n_results"], 2);
    }

    #[tokio::test]
    async fn backend_error_is_surfaced() {
        let (base_url, _seen) =
            spawn_http_server(vec![MockResponse::status(500, "collection missing")]).await;
        let store = ChromaStore::new(base_url, "docs");
        assert!(matches!(
            store.query(&[0.5], 2, 0.0).await,
            Err(RetrievalError::Backend(msg)) if msg.contains("collection missing")
        ));
    }
}
