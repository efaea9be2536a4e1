//! Scripted LLM for tests: pops a queued response per invocation and records
//! the messages it was called with.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{LlmClient, LlmError, LlmResponse, ToolCall, ToolDescriptor};
use crate::message::Message;
use stream_event::FinishReason;

/// Mock model client.
///
/// Responses are consumed front-to-back; when the script runs out, the last
/// response repeats. `calls()` exposes the transcripts seen so far, so tests
/// can assert on prompt assembly.
pub struct MockLlm {
    script: Mutex<Vec<LlmResponse>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlm {
    /// A mock that always answers with the given text and no tool calls.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_script(vec![LlmResponse {
            content: content.into(),
            tool_calls: vec![],
            usage: None,
            finish_reason: FinishReason::Stop,
        }])
    }

    /// A mock that plays the given responses in order, repeating the last.
    pub fn with_script(script: Vec<LlmResponse>) -> Self {
        assert!(!script.is_empty(), "script must have at least one response");
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A response that requests the given tool calls.
    pub fn tool_call_response(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> LlmResponse {
        LlmResponse {
            content: content.into(),
            tool_calls,
            usage: None,
            finish_reason: FinishReason::ToolCalls,
        }
    }

    /// A plain final response.
    pub fn text_response(content: impl Into<String>) -> LlmResponse {
        LlmResponse {
            content: content.into(),
            tool_calls: vec![],
            usage: None,
            finish_reason: FinishReason::Stop,
        }
    }

    /// Transcripts from every invocation so far, in call order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// The system prompt of the most recent invocation, if any.
    pub fn last_system_prompt(&self) -> Option<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .last()
            .and_then(|messages| {
                messages
                    .iter()
                    .find_map(|m| m.as_system().map(str::to_string))
            })
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(
        &self,
        messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<LlmResponse, LlmError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(messages.to_vec());
        let mut script = self.script.lock().expect("script lock");
        if script.len() > 1 {
            Ok(script.remove(0))
        } else {
            Ok(script[0].clone())
        }
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        delta_tx: Option<mpsc::Sender<String>>,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.invoke(messages, tools).await?;
        if let Some(tx) = delta_tx {
            // Split on whitespace to exercise multi-delta consumers.
            for word in response.content.split_inclusive(' ') {
                let _ = tx.send(word.to_string()).await;
            }
        }
        Ok(response)
    }
}
