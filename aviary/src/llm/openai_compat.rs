//! OpenAI-compatible Chat Completions client over reqwest.
//!
//! Speaks to any endpoint that implements `POST {base}/chat/completions`,
//! with per-agent base URL, optional API key, and extra headers from
//! `providerConfig`. Streaming uses SSE (`stream: true`) parsed with
//! eventsource-stream; tool-call deltas are aggregated by index.

use std::collections::BTreeMap;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::{LlmClient, LlmError, LlmResponse, ToolCall, ToolDescriptor};
use crate::agent_config::ProviderConfig;
use crate::message::Message;
use stream_event::{FinishReason, Usage};

/// Client for one OpenAI-compatible endpoint, configured per agent.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    headers: BTreeMap<String, String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatClient {
    pub fn new(
        provider: &ProviderConfig,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key: provider.api_key.clone(),
            headers: provider.headers.clone(),
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        stream: bool,
    ) -> Value {
        let messages: Vec<Value> = messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
        }
        if stream {
            body["stream"] = Value::Bool(true);
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        let mut req = self.http.post(self.completions_url()).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }
}

/// Maps one transcript message to the Chat Completions wire shape.
fn wire_message(message: &Message) -> Value {
    match message {
        Message::System(content) => json!({ "role": "system", "content": content }),
        Message::User(content) => json!({ "role": "user", "content": content }),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut msg = json!({ "role": "assistant", "content": content });
            if !tool_calls.is_empty() {
                msg["tool_calls"] = Value::Array(
                    tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string(),
                                }
                            })
                        })
                        .collect(),
                );
            }
            msg
        }
        Message::Tool {
            call_id, content, ..
        } => json!({ "role": "tool", "tool_call_id": call_id, "content": content }),
    }
}

fn map_finish_reason(raw: Option<&str>, has_tool_calls: bool) -> FinishReason {
    match raw {
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        _ if has_tool_calls => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

/// Parses a tool-call arguments string; malformed JSON falls back to the raw
/// string so the tool still sees what the model produced.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<UsageDto>,
}

#[derive(Deserialize)]
struct Choice {
    message: RespMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct RespMessage {
    content: Option<String>,
    tool_calls: Option<Vec<RespToolCall>>,
}

#[derive(Deserialize)]
struct RespToolCall {
    id: Option<String>,
    function: RespFunction,
}

#[derive(Deserialize)]
struct RespFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct UsageDto {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<UsageDto> for Usage {
    fn from(u: UsageDto) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<UsageDto>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Deserialize)]
struct DeltaToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<DeltaFunction>,
}

#[derive(Deserialize)]
struct DeltaFunction {
    name: Option<String>,
    arguments: Option<String>,
}

/// Accumulates tool-call deltas keyed by choice index.
#[derive(Default)]
struct ToolCallAggregate {
    id: String,
    name: String,
    arguments: String,
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<LlmResponse, LlmError> {
        let body = self.request_body(messages, tools, false);
        let resp = self
            .post(&body)
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
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Parse(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Parse("response has no choices".into()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, tc)| ToolCall {
                id: tc.id.unwrap_or_else(|| format!("call-{i}")),
                name: tc.function.name,
                arguments: parse_arguments(&tc.function.arguments),
            })
            .collect();

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: map_finish_reason(choice.finish_reason.as_deref(), !tool_calls.is_empty()),
            tool_calls,
            usage: parsed.usage.map(Usage::from),
        })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        delta_tx: Option<mpsc::Sender<String>>,
    ) -> Result<LlmResponse, LlmError> {
        let body = self.request_body(messages, tools, true);
        let resp = self
            .post(&body)
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
        let mut aggregates: BTreeMap<usize, ToolCallAggregate> = BTreeMap::new();
        let mut usage: Option<Usage> = None;
        let mut finish_raw: Option<String> = None;

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| LlmError::Http(e.to_string()))?;
            if event.data.trim() == "[DONE]" {
                break;
            }
            let chunk: StreamChunk = match serde_json::from_str(&event.data) {
                Ok(c) => c,
                // Some servers interleave comments or keep-alives; skip them.
                Err(_) => continue,
            };
            if let Some(u) = chunk.usage {
                usage = Some(u.into());
            }
            for choice in chunk.choices {
                if let Some(reason) = choice.finish_reason {
                    finish_raw = Some(reason);
                }
                if let Some(text) = choice.delta.content {
                    if !text.is_empty() {
                        content.push_str(&text);
                        if let Some(tx) = &delta_tx {
                            let _ = tx.send(text).await;
                        }
                    }
                }
                for delta in choice.delta.tool_calls.unwrap_or_default() {
                    let agg = aggregates.entry(delta.index).or_default();
                    if let Some(id) = delta.id {
                        agg.id = id;
                    }
                    if let Some(function) = delta.function {
                        if let Some(name) = function.name {
                            agg.name = name;
                        }
                        if let Some(arguments) = function.arguments {
                            agg.arguments.push_str(&arguments);
                        }
                    }
                }
            }
        }

        let tool_calls: Vec<ToolCall> = aggregates
            .into_iter()
            .map(|(index, agg)| ToolCall {
                id: if agg.id.is_empty() {
                    format!("call-{index}")
                } else {
                    agg.id
                },
                name: agg.name,
                arguments: parse_arguments(&agg.arguments),
            })
            .collect();

        Ok(LlmResponse {
            content,
            finish_reason: map_finish_reason(finish_raw.as_deref(), !tool_calls.is_empty()),
            tool_calls,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_http_server, MockResponse};

    fn client(base_url: String) -> OpenAiCompatClient {
        OpenAiCompatClient::new(
            &ProviderConfig {
                base_url,
                api_key: Some("test-key".into()),
                headers: BTreeMap::from([("X-Org".to_string(), "acme".to_string())]),
            },
            "test-model",
            0.2,
            256,
        )
    }

    #[test]
    fn wire_message_maps_roles() {
        let msg = wire_message(&Message::tool("call-1", "lookup", "42"));
        assert_eq!(msg["role"], "tool");
        assert_eq!(msg["tool_call_id"], "call-1");

        let msg = wire_message(&Message::assistant_with_calls(
            "",
            vec![ToolCall {
                id: "call-2".into(),
                name: "lookup".into(),
                arguments: json!({"q": 1}),
            }],
        ));
        assert_eq!(msg["tool_calls"][0]["function"]["name"], "lookup");
        assert_eq!(msg["tool_calls"][0]["function"]["arguments"], "{\"q\":1}");
    }

    #[test]
    fn parse_arguments_falls_back_to_raw_string() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_arguments("not json"), json!("not json"));
    }

    #[tokio::test]
    async fn invoke_parses_message_and_usage() {
        let (base_url, seen) = spawn_http_server(vec![MockResponse::json(json!({
            "choices": [{
                "message": {"content": "4", "tool_calls": null},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 7, "completion_tokens": 1, "total_tokens": 8}
        }))])
        .await;

        let resp = client(base_url)
            .invoke(&[Message::user("2+2?")], &[])
            .await
            .unwrap();
        assert_eq!(resp.content, "4");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(resp.usage.unwrap().total_tokens, 8);

        let requests = seen.lock().unwrap();
        assert!(requests[0].headers.contains("Bearer test-key"));
        assert!(requests[0].headers.to_lowercase().contains("x-org"));
        let body: Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn invoke_maps_tool_calls() {
        let (base_url, _seen) = spawn_http_server(vec![MockResponse::json(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call-abc",
                        "type": "function",
                        "function": {"name": "askSales", "arguments": "{\"message\":\"price?\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))])
        .await;

        let resp = client(base_url).invoke(&[Message::user("hi")], &[]).await.unwrap();
        assert_eq!(resp.finish_reason, FinishReason::ToolCalls);
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "askSales");
        assert_eq!(resp.tool_calls[0].arguments["message"], "price?");
    }

    #[tokio::test]
    async fn invoke_surfaces_http_error_body() {
        let (base_url, _seen) =
            spawn_http_server(vec![MockResponse::status(500, "model exploded")]).await;
        let err = client(base_url).invoke(&[], &[]).await.unwrap_err();
        assert!(matches!(err, LlmError::Provider(msg) if msg.contains("model exploded")));
    }

    #[tokio::test]
    async fn invoke_stream_aggregates_deltas_and_tool_calls() {
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call-1\",\"function\":{\"name\":\"lookup\",\"arguments\":\"{\\\"q\\\":\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"1}\"}}]},\"finish_reason\":\"tool_calls\"}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2,\"total_tokens\":5}}\n\n",
            "data: [DONE]\n\n",
        );
        let (base_url, _seen) = spawn_http_server(vec![MockResponse::sse(sse)]).await;

        let (tx, mut rx) = mpsc::channel(16);
        let resp = client(base_url)
            .invoke_stream(&[Message::user("hi")], &[], Some(tx))
            .await
            .unwrap();

        assert_eq!(resp.content, "Hello");
        assert_eq!(resp.finish_reason, FinishReason::ToolCalls);
        assert_eq!(resp.tool_calls[0].id, "call-1");
        assert_eq!(resp.tool_calls[0].arguments, json!({"q": 1}));
        assert_eq!(resp.usage.unwrap().total_tokens, 5);

        let mut deltas = Vec::new();
        while let Ok(d) = rx.try_recv() {
            deltas.push(d);
        }
        assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);
    }
}
