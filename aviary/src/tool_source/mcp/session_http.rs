//! MCP session over streamable HTTP: POST one JSON-RPC message per request,
//! parse the reply from a JSON body or SSE data frames.
//!
//! Serves both the `http` and `sse` source transports. Sends
//! `Accept: application/json, text/event-stream` and propagates the server's
//! `MCP-Session-Id` header on subsequent requests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use reqwest::Client;
use serde_json::{json, Value};

use super::{RpcReply, INITIALIZE_REQUEST_ID, PROTOCOL_VERSION};
use crate::tool_source::ToolSourceError;

/// Parses a JSON-RPC reply from an HTTP body. Supports application/json
/// (single object) and text/event-stream (data lines); returns the first
/// message carrying a result or error.
fn parse_reply_from_body(
    body: &str,
    content_type: Option<&str>,
) -> Result<RpcReply, ToolSourceError> {
    let is_sse = content_type
        .map(|s| s.contains("text/event-stream"))
        .unwrap_or(false);

    if !is_sse {
        return serde_json::from_str(body)
            .map_err(|e| ToolSourceError::Transport(format!("response json: {}", e)));
    }

    let mut data_buffer = String::new();
    let mut try_parse = |buffer: &str| -> Option<RpcReply> {
        let reply: RpcReply = serde_json::from_str(buffer).ok()?;
        (reply.result.is_some() || reply.error.is_some()).then_some(reply)
    };
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if data == "[DONE]" || data.is_empty() {
                if let Some(reply) = try_parse(&data_buffer) {
                    return Ok(reply);
                }
                data_buffer.clear();
                continue;
            }
            if !data_buffer.is_empty() {
                data_buffer.push('\n');
            }
            data_buffer.push_str(data);
            if let Some(reply) = try_parse(&data_buffer) {
                return Ok(reply);
            }
        } else if line.trim().is_empty() {
            if let Some(reply) = try_parse(&data_buffer) {
                return Ok(reply);
            }
            data_buffer.clear();
        }
    }
    if let Some(reply) = try_parse(&data_buffer) {
        return Ok(reply);
    }
    Err(ToolSourceError::Transport(
        "SSE stream: no JSON-RPC reply (result/error) found".into(),
    ))
}

/// MCP session over streamable HTTP. Created by `McpToolSource::connect` for
/// `transport: "http"` and `transport: "sse"` sources.
pub struct McpHttpSession {
    client: Client,
    url: String,
    /// Extra headers (e.g. API keys) sent on every request.
    headers: Vec<(String, String)>,
    /// Session id from the server's `MCP-Session-Id` header.
    session_id: Mutex<Option<String>>,
}

impl McpHttpSession {
    /// Connects and completes the initialize handshake.
    pub async fn connect(
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Self, ToolSourceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let session = Self {
            client,
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            session_id: Mutex::new(None),
        };
        session.initialize().await?;
        Ok(session)
    }

    fn post(&self, body: Vec<u8>) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header("MCP-Protocol-Version", PROTOCOL_VERSION)
            .body(body);
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if let Ok(guard) = self.session_id.lock() {
            if let Some(sid) = guard.as_deref() {
                req = req.header("MCP-Session-Id", sid);
            }
        }
        req
    }

    /// POST `initialize`, capture `MCP-Session-Id`, POST
    /// `notifications/initialized`. A 202 response is accepted as a completed
    /// handshake.
    async fn initialize(&self) -> Result<(), ToolSourceError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": INITIALIZE_REQUEST_ID,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "clientInfo": {
                    "name": "aviary-mcp",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }
        });
        let body =
            serde_json::to_vec(&request).map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let resp = self
            .post(body)
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let status = resp.status();
        if let Some(sid) = resp
            .headers()
            .get("MCP-Session-Id")
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut guard) = self.session_id.lock() {
                *guard = Some(sid.to_string());
            }
        }
        if status != reqwest::StatusCode::ACCEPTED {
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(ToolSourceError::Transport(format!(
                    "initialize HTTP {}: {}",
                    status,
                    if text.is_empty() { "no body" } else { &text }
                )));
            }
            let content_type = resp
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let text = resp
                .text()
                .await
                .map_err(|e| ToolSourceError::Transport(format!("initialize body: {}", e)))?;
            let reply = parse_reply_from_body(&text, content_type.as_deref())
                .map_err(|e| ToolSourceError::Transport(format!("initialize {}", e)))?;
            if let Some(err) = reply.error {
                return Err(ToolSourceError::Transport(format!(
                    "initialize: {}",
                    err.message
                )));
            }
        }

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        });
        let body = serde_json::to_vec(&notification)
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let resp = self
            .post(body)
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let status = resp.status();
        if status != reqwest::StatusCode::ACCEPTED && !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ToolSourceError::Transport(format!(
                "notifications/initialized HTTP {}: {}",
                status,
                if text.is_empty() { "no body" } else { &text }
            )));
        }
        Ok(())
    }

    /// One JSON-RPC round trip: POST the request, parse the reply.
    pub async fn request(
        &self,
        id: &str,
        method: &str,
        params: Value,
    ) -> Result<RpcReply, ToolSourceError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        let body =
            serde_json::to_vec(&request).map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let resp = self
            .post(body)
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ToolSourceError::Transport(format!(
                "{} HTTP {}: {}",
                method,
                status,
                if text.is_empty() { "no body" } else { &text }
            )));
        }
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let text = resp
            .text()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        parse_reply_from_body(&text, content_type.as_deref())
    }
}
