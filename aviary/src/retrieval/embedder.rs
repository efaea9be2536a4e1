//! Query embedding via the native embedding service.

use async_trait::async_trait;
use serde_json::json;

use super::{Embedder, RetrievalError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "text-embedding-004";

/// Embedder over the Gemini `embedContent` endpoint: POST
/// `{content: {parts: [{text}]}}`, read `embedding.values`.
pub struct GeminiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl GeminiEmbedder {
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            std::env::var("GEMINI_API_KEY").ok(),
            std::env::var("AVIARY_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
        )
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            RetrievalError::NotConfigured("GEMINI_API_KEY is not set".into())
        })?;
        let url = format!(
            "{}/v1beta/models/{}:embedContent?key={}",
            self.base_url, self.model, key
        );
        let body = json!({ "content": { "parts": [{ "text": text }] } });
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
            return Err(RetrievalError::Embedding(format!(
                "HTTP {}: {}",
                status, text
            )));
        }
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| RetrievalError::Embedding(format!("parse: {}", e)))?;
        let values = value
            .get("embedding")
            .and_then(|e| e.get("values"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| RetrievalError::Embedding("no embedding.values in response".into()))?;
        Ok(values
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_http_server, MockResponse};

    #[tokio::test]
    async fn embed_posts_parts_and_reads_values() {
        let (base_url, seen) = spawn_http_server(vec![MockResponse::json(serde_json::json!({
            "embedding": { "values": [0.25, -0.5, 1.0] }
        }))])
        .await;

        let embedder = GeminiEmbedder::new(base_url, Some("k".into()), "test-embed");
        let values = embedder.embed("hello").await.unwrap();
        assert_eq!(values, vec![0.25, -0.5, 1.0]);

        let requests = seen.lock().unwrap();
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["content"]["parts"][0]["text"], "hello");
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let embedder = GeminiEmbedder::new("http://localhost", None, "m");
        assert!(matches!(
            embedder.embed("q").await,
            Err(RetrievalError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn http_failure_is_an_embedding_error() {
        let (base_url, _seen) = spawn_http_server(vec![MockResponse::status(500, "down")]).await;
        let embedder = GeminiEmbedder::new(base_url, Some("k".into()), "m");
        assert!(matches!(
            embedder.embed("q").await,
            Err(RetrievalError::Embedding(_))
        ));
    }
}
