//! Native provider client: Gemini-style `generateContent` REST API.
//!
//! Credentials come from `GEMINI_API_KEY` / `GEMINI_BASE_URL` (the construction
//! never fails; a missing key surfaces at invocation). Tools are passed as
//! function declarations; tool results flow back as `functionResponse` parts.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use super::{LlmClient, LlmError, LlmResponse, ToolCall, ToolDescriptor};
use crate::message::Message;
use stream_event::{FinishReason, Usage};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiClient {
    /// Builds a client from the environment. A missing key is reported at
    /// invocation time, not here, so agents can load without credentials.
    pub fn from_env(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self::new(
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            std::env::var("GEMINI_API_KEY").ok(),
            model,
            temperature,
            max_tokens,
        )
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    fn endpoint(&self, method: &str, stream: bool) -> Result<String, LlmError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            LlmError::MissingCredentials("GEMINI_API_KEY is not set".into())
        })?;
        let alt = if stream { "alt=sse&" } else { "" };
        Ok(format!(
            "{}/v1beta/models/{}:{}?{}key={}",
            self.base_url, self.model, method, alt, key
        ))
    }

    fn request_body(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Value {
        let mut system_parts: Vec<Value> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        for message in messages {
            match message {
                Message::System(text) => system_parts.push(json!({ "text": text })),
                Message::User(text) => {
                    contents.push(json!({ "role": "user", "parts": [{ "text": text }] }));
                }
                Message::Assistant {
                    content,
                    tool_calls,
                } => {
                    let mut parts: Vec<Value> = Vec::new();
                    if !content.is_empty() {
                        parts.push(json!({ "text": content }));
                    }
                    for tc in tool_calls {
                        parts.push(json!({
                            "functionCall": { "name": tc.name, "args": tc.arguments }
                        }));
                    }
                    if parts.is_empty() {
                        parts.push(json!({ "text": "" }));
                    }
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
                Message::Tool { name, content, .. } => {
                    contents.push(json!({
                        "role": "user",
                        "parts": [{
                            "functionResponse": {
                                "name": name,
                                "response": { "content": content }
                            }
                        }]
                    }));
                }
            }
        }

        let mut body = Map::new();
        if !system_parts.is_empty() {
            body.insert(
                "systemInstruction".into(),
                json!({ "parts": system_parts }),
            );
        }
        body.insert("contents".into(), Value::Array(contents));
        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body.insert(
                "tools".into(),
                json!([{ "functionDeclarations": declarations }]),
            );
        }
        body.insert(
            "generationConfig".into(),
            json!({
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            }),
        );
        Value::Object(body)
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: u32,
}

impl From<UsageMetadata> for Usage {
    fn from(u: UsageMetadata) -> Self {
        Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }
    }
}

fn map_finish_reason(raw: Option<&str>, has_tool_calls: bool) -> FinishReason {
    if has_tool_calls {
        return FinishReason::ToolCalls;
    }
    match raw {
        Some("MAX_TOKENS") => FinishReason::Length,
        _ => FinishReason::Stop,
    }
}

/// Folds one response (or stream frame) into the accumulating turn state.
fn accumulate(
    parsed: GenerateResponse,
    content: &mut String,
    tool_calls: &mut Vec<ToolCall>,
    usage: &mut Option<Usage>,
    finish_raw: &mut Option<String>,
) -> Option<String> {
    if let Some(meta) = parsed.usage_metadata {
        *usage = Some(meta.into());
    }
    let mut delta = String::new();
    if let Some(candidate) = parsed.candidates.into_iter().next() {
        if let Some(reason) = candidate.finish_reason {
            *finish_raw = Some(reason);
        }
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                delta.push_str(&text);
            }
            if let Some(call) = part.function_call {
                let id = format!("{}-{}", call.name, tool_calls.len());
                tool_calls.push(ToolCall {
                    id,
                    name: call.name,
                    arguments: call.args,
                });
            }
        }
    }
    if delta.is_empty() {
        None
    } else {
        content.push_str(&delta);
        Some(delta)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<LlmResponse, LlmError> {
        let url = self.endpoint("generateContent", false)?;
        let body = self.request_body(messages, tools);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::Provider(format!("HTTP {}: {}", status, text)));
        }
        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Parse(e.to_string()))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = None;
        let mut finish_raw = None;
        accumulate(
            parsed,
            &mut content,
            &mut tool_calls,
            &mut usage,
            &mut finish_raw,
        );

        Ok(LlmResponse {
            finish_reason: map_finish_reason(finish_raw.as_deref(), !tool_calls.is_empty()),
            content,
            tool_calls,
            usage,
        })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        delta_tx: Option<mpsc::Sender<String>>,
    ) -> Result<LlmResponse, LlmError> {
        let url = self.endpoint("streamGenerateContent", true)?;
        let body = self.request_body(messages, tools);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Provider(format!("HTTP {}: {}", status, text)));
        }

        let mut events = resp.bytes_stream().eventsource();
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = None;
        let mut finish_raw = None;

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| LlmError::Http(e.to_string()))?;
            let parsed: GenerateResponse = match serde_json::from_str(&event.data) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let delta = accumulate(
                parsed,
                &mut content,
                &mut tool_calls,
                &mut usage,
                &mut finish_raw,
            );
            if let (Some(delta), Some(tx)) = (delta, &delta_tx) {
                let _ = tx.send(delta).await;
            }
        }

        Ok(LlmResponse {
            finish_reason: map_finish_reason(finish_raw.as_deref(), !tool_calls.is_empty()),
            content,
            tool_calls,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_http_server, MockResponse};

    fn client(base_url: String) -> GeminiClient {
        GeminiClient::new(base_url, Some("test-key".into()), "test-model", 0.7, 1024)
    }

    #[test]
    fn missing_key_fails_at_invocation_time() {
        let client = GeminiClient::new("http://localhost", None, "m", 0.7, 10);
        assert!(matches!(
            client.endpoint("generateContent", false),
            Err(LlmError::MissingCredentials(_))
        ));
    }

    #[test]
    fn request_body_splits_system_and_maps_tool_results() {
        let client = client("http://localhost".into());
        let body = client.request_body(
            &[
                Message::system("Be terse."),
                Message::user("hi"),
                Message::assistant_with_calls(
                    "",
                    vec![ToolCall {
                        id: "lookup-0".into(),
                        name: "lookup".into(),
                        arguments: json!({"q": "x"}),
                    }],
                ),
                Message::tool("lookup-0", "lookup", "42"),
            ],
            &[ToolDescriptor {
                name: "lookup".into(),
                description: "d".into(),
                parameters: json!({"type": "object"}),
            }],
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be terse.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(
            body["contents"][1]["parts"][0]["functionCall"]["name"],
            "lookup"
        );
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["response"]["content"],
            "42"
        );
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "lookup"
        );
    }

    #[tokio::test]
    async fn invoke_parses_text_and_function_calls() {
        let (base_url, seen) = spawn_http_server(vec![MockResponse::json(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Checking."},
                    {"functionCall": {"name": "lookup", "args": {"q": "price"}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        }))])
        .await;

        let resp = client(base_url)
            .invoke(&[Message::user("price?")], &[])
            .await
            .unwrap();
        assert_eq!(resp.content, "Checking.");
        assert_eq!(resp.finish_reason, FinishReason::ToolCalls);
        assert_eq!(resp.tool_calls[0].name, "lookup");
        assert_eq!(resp.tool_calls[0].id, "lookup-0");
        assert_eq!(resp.usage.unwrap().total_tokens, 6);

        let requests = seen.lock().unwrap();
        assert!(requests[0]
            .headers
            .contains("POST /v1beta/models/test-model:generateContent?key=test-key"));
    }

    #[tokio::test]
    async fn invoke_stream_concatenates_sse_text_parts() {
        let sse = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"}]}}]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"lo\"}]},\"finishReason\":\"STOP\"}],",
            "\"usageMetadata\":{\"promptTokenCount\":1,\"candidatesTokenCount\":1,\"totalTokenCount\":2}}\n\n",
        );
        let (base_url, _seen) = spawn_http_server(vec![MockResponse::sse(sse)]).await;

        let (tx, mut rx) = mpsc::channel(8);
        let resp = client(base_url)
            .invoke_stream(&[Message::user("hi")], &[], Some(tx))
            .await
            .unwrap();
        assert_eq!(resp.content, "Hello");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(rx.recv().await.as_deref(), Some("Hel"));
        assert_eq!(rx.recv().await.as_deref(), Some("lo"));
    }

    #[tokio::test]
    async fn provider_error_is_surfaced() {
        let (base_url, _seen) =
            spawn_http_server(vec![MockResponse::status(400, "bad request")]).await;
        let err = client(base_url).invoke(&[], &[]).await.unwrap_err();
        assert!(matches!(err, LlmError::Provider(msg) if msg.contains("bad request")));
    }
}
