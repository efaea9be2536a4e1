//! Chat request/response types for one agent turn.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stream_event::{FinishReason, Usage};

/// Metadata key that triggers the per-request page-content tool.
pub const PAGE_CONTEXT_KEY: &str = "pageContext";

/// One inbound chat request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInput {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Opaque key-value bag. Recognized keys (currently only `pageContext`)
    /// inject per-request tools; everything else is ignored.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ChatInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The `pageContext` metadata string, when present and non-empty.
    pub fn page_context(&self) -> Option<&str> {
        self.metadata
            .get(PAGE_CONTEXT_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Record of one tool invocation made during a turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub id: String,
    pub tool_name: String,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Result of one buffered (non-streaming) agent turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutput {
    pub text: String,
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub finish_reason: FinishReason,
}
