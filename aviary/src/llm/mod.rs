//! Model provider abstraction.
//!
//! The agent loop depends on a callable that turns a message transcript plus
//! a tool table into assistant text and optional tool calls; this module
//! defines the trait and its implementations: [`MockLlm`] (tests),
//! [`GeminiClient`] (the native provider), and [`OpenAiCompatClient`]
//! (any Chat Completions endpoint).
//!
//! # Streaming
//!
//! `invoke_stream` accepts an optional `Sender<String>` for text deltas.
//! Implementations that stream send deltas as they arrive and still return
//! the complete [`LlmResponse`] at the end; the default implementation calls
//! `invoke` and sends the full content as one delta.

mod gemini;
mod mock;
mod openai_compat;

pub use gemini::GeminiClient;
pub use mock::MockLlm;
pub use openai_compat::OpenAiCompatClient;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::message::Message;
use stream_event::{FinishReason, Usage};

/// One tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Wire-facing tool description handed to a provider.
#[derive(Clone, Debug)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON-Schema object for the arguments.
    pub parameters: Value,
}

/// Response from one model invocation.
#[derive(Clone, Debug)]
pub struct LlmResponse {
    /// Assistant message content (plain text).
    pub content: String,
    /// Tool calls from this step; empty means the turn can finish.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage for this call, when the provider reports it.
    pub usage: Option<Usage>,
    /// Provider finish reason, normalized.
    pub finish_reason: FinishReason,
}

/// Errors from a provider call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http: {0}")]
    Http(String),
    #[error("provider: {0}")]
    Provider(String),
    #[error("response parse: {0}")]
    Parse(String),
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("cancelled")]
    Cancelled,
}

/// Model client: given a transcript and tools, produce the next assistant step.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One completion: read messages, return assistant content and tool calls.
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<LlmResponse, LlmError>;

    /// Streaming variant. When `delta_tx` is `Some`, send text deltas through
    /// the channel as they arrive; return the complete response at the end.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        delta_tx: Option<mpsc::Sender<String>>,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.invoke(messages, tools).await?;
        if let Some(tx) = delta_tx {
            if !response.content.is_empty() {
                let _ = tx.send(response.content.clone()).await;
            }
        }
        Ok(response)
    }
}
