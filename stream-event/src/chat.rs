//! Chat stream wire types: one chunk per frame (type + payload).
//!
//! Stream invariants: `text` may appear any number of times; every
//! `tool-call` is followed later in the stream by a `tool-result` with the
//! same id or by an `error`; `finish` appears at most once, never with
//! reason `tool-calls`; an `error` chunk terminates the stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a turn ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// Model produced a normal final message.
    Stop,
    /// Model requested tool calls; never a terminal finish reason on the wire.
    ToolCalls,
    /// The per-turn step cap was reached before a normal finish.
    Steps,
    /// Provider truncated the completion at its token limit.
    Length,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool-calls",
            FinishReason::Steps => "steps",
            FinishReason::Length => "length",
        }
    }
}

/// Token usage for one turn (summed over loop steps when available).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Adds another step's usage into this one.
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// One streamed chunk of a chat turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChatChunk {
    /// Assistant text delta.
    #[serde(rename_all = "camelCase")]
    Text { content: String },
    /// The model requested a tool invocation.
    #[serde(rename_all = "camelCase")]
    ToolCall {
        id: String,
        name: String,
        args: Value,
    },
    /// A tool invocation returned; `id` matches the earlier `tool-call`.
    #[serde(rename_all = "camelCase")]
    ToolResult { id: String, result: Value },
    /// Terminal failure; no `finish` follows.
    #[serde(rename_all = "camelCase")]
    Error { content: String },
    /// Terminal success marker; emitted once, with reason ≠ tool-calls.
    #[serde(rename_all = "camelCase")]
    Finish {
        finish_reason: FinishReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}

impl ChatChunk {
    pub fn text(content: impl Into<String>) -> Self {
        ChatChunk::Text {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        ChatChunk::Error {
            content: content.into(),
        }
    }

    pub fn finish(finish_reason: FinishReason, usage: Option<Usage>) -> Self {
        ChatChunk::Finish {
            finish_reason,
            usage,
        }
    }

    /// True for `error` and `finish`, the two chunks that end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatChunk::Error { .. } | ChatChunk::Finish { .. })
    }
}
