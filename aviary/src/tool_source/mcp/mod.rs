//! MCP tool source: speaks `tools/list` and `tools/call` over stdio or
//! streamable HTTP.
//!
//! The `sse` and `http` transports both use [`McpHttpSession`] (one POST per
//! JSON-RPC message; the response body may be a JSON object or SSE frames).
//! The `stdio` transport spawns the configured command and frames JSON-RPC as
//! newline-delimited messages on its pipes, serialized per connection.

mod session;
mod session_http;

pub use session::McpStdioSession;
pub use session_http::McpHttpSession;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{ToolCallContent, ToolSource, ToolSourceError, ToolSpec};
use crate::agent_config::{ToolSourceConfig, ToolTransport};

/// Protocol version sent in the initialize handshake.
pub(crate) const PROTOCOL_VERSION: &str = "2025-03-26";
/// Request id used for initialize.
pub(crate) const INITIALIZE_REQUEST_ID: &str = "aviary-mcp-initialize";

/// JSON-RPC error object.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RpcErrorObject {
    #[allow(dead_code)]
    pub code: i64,
    pub message: String,
}

/// Outcome of one JSON-RPC request: result or error.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct RpcReply {
    pub result: Option<Value>,
    pub error: Option<RpcErrorObject>,
}

enum SessionKind {
    Stdio(McpStdioSession),
    Http(McpHttpSession),
}

/// Tool source backed by an MCP server.
pub struct McpToolSource {
    session: SessionKind,
}

impl McpToolSource {
    /// Opens the connection described by `config` and completes the initialize
    /// handshake. Stdio spawns the command; sse/http POST to the URL with the
    /// configured headers.
    pub async fn connect(config: &ToolSourceConfig) -> Result<Self, ToolSourceError> {
        let session = match config.transport {
            ToolTransport::Stdio => {
                let command = config.command.as_deref().ok_or_else(|| {
                    ToolSourceError::Transport("stdio transport requires a command".into())
                })?;
                SessionKind::Stdio(
                    McpStdioSession::spawn(command, &config.args, &config.env).await?,
                )
            }
            ToolTransport::Sse | ToolTransport::Http => {
                let url = config.url.as_deref().ok_or_else(|| {
                    ToolSourceError::Transport("sse/http transport requires a url".into())
                })?;
                SessionKind::Http(McpHttpSession::connect(url, &config.headers).await?)
            }
        };
        Ok(Self { session })
    }

    async fn request(&self, id: &str, method: &str, params: Value) -> Result<RpcReply, ToolSourceError> {
        match &self.session {
            SessionKind::Stdio(s) => s.request(id, method, params).await,
            SessionKind::Http(s) => s.request(id, method, params).await,
        }
    }

    /// Closes the underlying connection. Idempotent.
    pub async fn shutdown(&self) {
        if let SessionKind::Stdio(s) = &self.session {
            s.shutdown().await;
        }
        // HTTP sessions are stateless per request; nothing to close.
    }
}

/// Parses a `tools/list` reply into `Vec<ToolSpec>`.
fn parse_list_tools_reply(reply: RpcReply) -> Result<Vec<ToolSpec>, ToolSourceError> {
    if let Some(err) = reply.error {
        return Err(ToolSourceError::JsonRpc(err.message));
    }
    let tools_value = reply
        .result
        .and_then(|r| r.get("tools").cloned())
        .ok_or_else(|| ToolSourceError::Transport("no tools in response".into()))?;
    let tools_array = tools_value
        .as_array()
        .ok_or_else(|| ToolSourceError::Transport("tools not an array".into()))?;
    let mut specs = Vec::with_capacity(tools_array.len());
    for t in tools_array {
        let obj = t
            .as_object()
            .ok_or_else(|| ToolSourceError::Transport("tool item not an object".into()))?;
        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let description = obj
            .get("description")
            .and_then(|v| v.as_str())
            .map(String::from);
        let input_schema = obj
            .get("inputSchema")
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()));
        specs.push(ToolSpec {
            name,
            description,
            input_schema,
        });
    }
    Ok(specs)
}

/// Parses a `tools/call` reply into text content. A source-level error flag
/// (`isError`) propagates as an ordinary call failure.
fn parse_call_tool_reply(reply: RpcReply) -> Result<ToolCallContent, ToolSourceError> {
    if let Some(err) = reply.error {
        return Err(ToolSourceError::JsonRpc(err.message));
    }
    let result = reply
        .result
        .ok_or_else(|| ToolSourceError::Transport("no result in tools/call response".into()))?;
    if result
        .get("isError")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        let msg = result
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|a| a.first())
            .and_then(|b| b.get("text").and_then(|t| t.as_str()))
            .unwrap_or("tool returned error")
            .to_string();
        return Err(ToolSourceError::Transport(msg));
    }
    let mut text_parts = Vec::new();
    if let Some(content_array) = result.get("content").and_then(|c| c.as_array()) {
        for block in content_array {
            if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    text_parts.push(t);
                }
            }
        }
    }
    let mut text = text_parts.join("\n").trim().to_string();
    if text.is_empty() {
        if let Some(structured) = result.get("structuredContent") {
            text = serde_json::to_string(structured).unwrap_or_default();
        }
    }
    if text.is_empty() {
        return Err(ToolSourceError::Transport(
            "no text or structuredContent in tools/call response".into(),
        ));
    }
    Ok(ToolCallContent { text })
}

#[async_trait]
impl ToolSource for McpToolSource {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        let reply = self
            .request(
                "aviary-tools-list",
                "tools/list",
                Value::Object(serde_json::Map::new()),
            )
            .await?;
        parse_list_tools_reply(reply)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let id = format!("aviary-call-{}", name);
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let reply = self.request(&id, "tools/call", params).await?;
        parse_call_tool_reply(reply)
    }
}
