//! SQL-extension backend via an optional REST sidecar.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{RetrievalError, RetrievedDoc, VectorStore};

/// Pgvector-style store. Queries go to a REST sidecar
/// (`PGVECTOR_API_URL`); without one configured, queries log a warning and
/// return no documents rather than failing the turn.
pub struct PgvectorStore {
    http: reqwest::Client,
    api_url: Option<String>,
    table: String,
}

impl PgvectorStore {
    pub fn from_env(table: &str) -> Self {
        Self::new(std::env::var("PGVECTOR_API_URL").ok(), table)
    }

    pub fn new(api_url: Option<String>, table: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.map(|u| u.trim_end_matches('/').to_string()),
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl VectorStore for PgvectorStore {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedDoc>, RetrievalError> {
        let Some(api_url) = &self.api_url else {
            tracing::warn!(
                table = %self.table,
                "pgvector retrieval skipped: PGVECTOR_API_URL is not set"
            );
            return Ok(Vec::new());
        };
        let body = json!({
            "table": self.table,
            "embedding": embedding,
            "topK": top_k,
            "minScore": min_score,
        });
        let resp = self
            .http
            .post(format!("{}/query", api_url))
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
        let results = value
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(results
            .into_iter()
            .map(|r| RetrievedDoc {
                id: r
                    .get("id")
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default(),
                content: r
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                score: r.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
                metadata: r.get("metadata").cloned().filter(|m| !m.is_null()),
            })
            .collect())
    }
}
