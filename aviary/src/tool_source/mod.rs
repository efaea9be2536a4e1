//! External tool providers.
//!
//! A tool source advertises tools and executes calls over a framed JSON-RPC
//! protocol (MCP). The agent holds one long-lived connection per configured
//! source; [`ToolSource`] is the seam the runtime and the schema translator
//! depend on, [`McpToolSource`] the production implementation, and
//! [`MockToolSource`] the test double.

pub mod mcp;

pub use mcp::McpToolSource;

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

/// A tool as described by its source: name, optional description, and a
/// JSON-Schema-like input schema.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Text content returned by one tool call.
#[derive(Clone, Debug)]
pub struct ToolCallContent {
    pub text: String,
}

/// Errors from tool-source operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolSourceError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidInput(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("JSON-RPC error: {0}")]
    JsonRpc(String),
}

/// Tool source: list tools and call a tool.
///
/// The runtime uses `list_tools()` once at agent initialization to build the
/// static tool table and `call_tool(name, args)` during the tool loop.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Lists available tools (e.g. MCP `tools/list`).
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError>;

    /// Calls a tool by name with JSON arguments (e.g. MCP `tools/call`).
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallContent, ToolSourceError>;
}

/// In-memory tool source for tests: fixed specs, canned results per tool.
#[derive(Default)]
pub struct MockToolSource {
    specs: Vec<ToolSpec>,
    results: BTreeMap<String, String>,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl MockToolSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        result: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.specs.push(ToolSpec {
            name: name.clone(),
            description: Some(description.into()),
            input_schema,
        });
        self.results.insert(name, result.into());
        self
    }
}

#[async_trait]
impl ToolSource for MockToolSource {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        Ok(self.specs.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallContent, ToolSourceError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((name.to_string(), arguments));
        match self.results.get(name) {
            Some(text) => Ok(ToolCallContent { text: text.clone() }),
            None => Err(ToolSourceError::NotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_source_lists_and_calls() {
        let source = MockToolSource::new().with_tool(
            "get_time",
            "Get time",
            serde_json::json!({"type": "object"}),
            "12:00",
        );
        let tools = source.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_time");

        let out = source
            .call_tool("get_time", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(out.text, "12:00");

        let err = source
            .call_tool("missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::NotFound(_)));
    }
}
