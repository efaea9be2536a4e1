//! Conversation messages exchanged with a model provider during one turn.

use crate::llm::ToolCall;

/// One message in the turn transcript. Providers map these onto their own wire
/// roles (`system`/`user`/`assistant`/`tool` for Chat Completions,
/// `systemInstruction`/`user`/`model`/`functionResponse` for the native API).
#[derive(Clone, Debug)]
pub enum Message {
    System(String),
    User(String),
    /// Assistant output; `tool_calls` is non-empty when the model requested tools.
    Assistant {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    /// Result of one tool invocation, fed back to the model.
    Tool {
        call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System(content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::Tool {
            call_id: call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    /// The system prompt text, when this is a system message.
    pub fn as_system(&self) -> Option<&str> {
        match self {
            Message::System(s) => Some(s),
            _ => None,
        }
    }
}
