//! Runtime agent: a declarative config bound to live collaborators.
//!
//! Lifecycle is `created → initialized → shutdown`. Initialization is lazy
//! (first use) and idempotent: tool sources that fail to connect are logged
//! and skipped, so an agent stays usable without those tools. A turn computes
//! its tool table as `static ∪ dynamic(input)`, assembles the system prompt
//! (base, retrieval context, page instruction), and drives a bounded
//! tool-calling loop against the configured provider.

pub mod dynamic_tools;
pub mod prompt;

pub use dynamic_tools::{DynamicToolRule, PageContextRule};
pub use prompt::{assemble_system_prompt, PAGE_CONTEXT_INSTRUCTION};

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::agent_config::{AgentConfig, Provider};
use crate::chat::{ChatInput, ChatOutput, ToolCallRecord};
use crate::error::AgentError;
use crate::llm::{GeminiClient, LlmClient, LlmResponse, OpenAiCompatClient};
use crate::message::Message;
use crate::registry::Registry;
use crate::retrieval::RetrievalClient;
use crate::tool_source::{McpToolSource, ToolSource};
use crate::tools::page_context::PAGE_CONTENT_TOOL;
use crate::tools::{delegation_tool, translate_tool, ToolSet};
use stream_event::{ChatChunk, FinishReason, Usage};

/// Steps per turn: one model invocation per step. A cost/latency bound, set
/// at construction and never per-request.
pub const DEFAULT_MAX_STEPS: usize = 5;

/// Streaming chunk channel capacity.
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// A consumer that cannot drain a chunk within this budget cancels the turn.
const STREAM_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Initialized,
    Shutdown,
}

#[derive(Default)]
struct Collaborators {
    sources: Vec<Arc<McpToolSource>>,
    static_tools: ToolSet,
    retrieval: Option<Arc<RetrievalClient>>,
}

struct AgentState {
    lifecycle: Lifecycle,
    collaborators: Collaborators,
}

/// A runnable agent owned by the registry.
pub struct RuntimeAgent {
    config: AgentConfig,
    registry: Weak<Registry>,
    llm: Arc<dyn LlmClient>,
    max_steps: usize,
    dynamic_rules: Vec<Arc<dyn DynamicToolRule>>,
    state: tokio::sync::Mutex<AgentState>,
}

impl std::fmt::Debug for RuntimeAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeAgent")
            .field("config", &self.config)
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

impl RuntimeAgent {
    /// Builds an agent from a validated config, constructing the provider
    /// client. No network traffic happens here; connections open on first use.
    pub fn from_config(
        config: AgentConfig,
        registry: Weak<Registry>,
    ) -> Result<Self, AgentError> {
        let llm: Arc<dyn LlmClient> = match config.provider {
            Provider::Native => Arc::new(GeminiClient::from_env(
                &config.model,
                config.temperature,
                config.max_tokens,
            )),
            Provider::OpenaiCompatible => {
                let provider = config.provider_config.as_ref().ok_or_else(|| {
                    AgentError::Config {
                        file: config.id.clone(),
                        reason: "providerConfig is required for provider \"openai-compatible\""
                            .into(),
                    }
                })?;
                Arc::new(OpenAiCompatClient::new(
                    provider,
                    &config.model,
                    config.temperature,
                    config.max_tokens,
                ))
            }
        };
        Ok(Self::with_llm(config, registry, llm))
    }

    /// Builds an agent around an explicit model client. Used by tests and by
    /// embedders that bring their own provider.
    pub fn with_llm(
        config: AgentConfig,
        registry: Weak<Registry>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            config,
            registry,
            llm,
            max_steps: DEFAULT_MAX_STEPS,
            dynamic_rules: vec![Arc::new(PageContextRule)],
            state: tokio::sync::Mutex::new(AgentState {
                lifecycle: Lifecycle::Created,
                collaborators: Collaborators::default(),
            }),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Registers an additional dynamic-tool rule.
    pub fn with_dynamic_rule(mut self, rule: Arc<dyn DynamicToolRule>) -> Self {
        self.dynamic_rules.push(rule);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.lifecycle == Lifecycle::Initialized
    }

    /// Opens tool-source connections, builds the retrieval client, and
    /// synthesizes delegation tools. Idempotent; safe to race. Individual
    /// tool-source failures are logged and skipped.
    pub async fn initialize(&self) -> Result<(), AgentError> {
        if self.is_initialized().await {
            return Ok(());
        }
        // Build collaborators without holding the state lock across I/O.
        let built = self.build_collaborators().await;
        let mut state = self.state.lock().await;
        if state.lifecycle == Lifecycle::Initialized {
            // Lost the race; the duplicate connections drop (and kill their
            // child processes) here.
            return Ok(());
        }
        state.collaborators = built;
        state.lifecycle = Lifecycle::Initialized;
        Ok(())
    }

    async fn build_collaborators(&self) -> Collaborators {
        let mut built = Collaborators::default();
        if self.config.enable_tools {
            for source_config in &self.config.tool_sources {
                match McpToolSource::connect(source_config).await {
                    Ok(source) => {
                        let source = Arc::new(source);
                        match source.list_tools().await {
                            Ok(specs) => {
                                for spec in &specs {
                                    built.static_tools.insert(translate_tool(
                                        &source_config.id,
                                        spec,
                                        Arc::clone(&source) as Arc<dyn ToolSource>,
                                    ));
                                }
                            }
                            Err(e) => {
                                tracing::warn!(
                                    agent = %self.config.id,
                                    source = %source_config.id,
                                    error = %e,
                                    "tools/list failed, continuing without this source"
                                );
                            }
                        }
                        built.sources.push(source);
                    }
                    Err(e) => {
                        tracing::warn!(
                            agent = %self.config.id,
                            source = %source_config.id,
                            error = %e,
                            "tool source connection failed, continuing without its tools"
                        );
                    }
                }
            }
            for target in self.config.delegation_targets() {
                built
                    .static_tools
                    .insert(delegation_tool(target, self.registry.clone()));
            }
        }
        if let Some(retrieval_config) = self.config.retrieval_enabled() {
            built.retrieval = Some(Arc::new(RetrievalClient::from_config(retrieval_config)));
        }
        built
    }

    /// Closes tool-source connections, drops the retrieval client, and marks
    /// the agent uninitialized.
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        let sources = {
            let mut state = self.state.lock().await;
            state.lifecycle = Lifecycle::Shutdown;
            std::mem::take(&mut state.collaborators).sources
        };
        for source in sources {
            source.shutdown().await;
        }
        Ok(())
    }

    /// One buffered turn.
    pub async fn execute(&self, input: ChatInput) -> Result<ChatOutput, AgentError> {
        self.execute_with_cancel(input, &CancellationToken::new())
            .await
    }

    /// One buffered turn honoring a caller-supplied cancellation token.
    pub async fn execute_with_cancel(
        &self,
        input: ChatInput,
        cancel: &CancellationToken,
    ) -> Result<ChatOutput, AgentError> {
        self.run_turn(&input, None, cancel).await
    }

    /// One streaming turn. Chunks observe the stream invariant: text deltas,
    /// tool-call/tool-result pairs, then exactly one `finish` — or a single
    /// terminal `error`.
    pub fn execute_stream(
        self: &Arc<Self>,
        input: ChatInput,
        cancel: CancellationToken,
    ) -> ReceiverStream<ChatChunk> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = agent.run_turn(&input, Some(&tx), &cancel).await {
                let _ = send_chunk(&tx, ChatChunk::error(err.to_string())).await;
            }
        });
        ReceiverStream::new(rx)
    }

    async fn snapshot(&self) -> (ToolSet, Option<Arc<RetrievalClient>>) {
        let state = self.state.lock().await;
        (
            state.collaborators.static_tools.clone(),
            state.collaborators.retrieval.clone(),
        )
    }

    fn dynamic_tools(&self, input: &ChatInput) -> ToolSet {
        let mut set = ToolSet::new();
        for rule in &self.dynamic_rules {
            for tool in rule.tools_for(input) {
                set.insert(tool);
            }
        }
        set
    }

    async fn run_turn(
        &self,
        input: &ChatInput,
        sink: Option<&mpsc::Sender<ChatChunk>>,
        cancel: &CancellationToken,
    ) -> Result<ChatOutput, AgentError> {
        self.initialize().await?;
        let (static_tools, retrieval) = self.snapshot().await;
        let dynamic = self.dynamic_tools(input);
        let page_tool_present = dynamic.contains(PAGE_CONTENT_TOOL);
        let tools = static_tools.merged_with(dynamic);

        let system_prompt = assemble_system_prompt(
            &self.config,
            retrieval.as_deref(),
            &input.message,
            page_tool_present,
        )
        .await;
        let mut messages = vec![
            Message::system(system_prompt),
            Message::user(input.message.clone()),
        ];
        let descriptors = tools.descriptors();

        let mut records: Vec<ToolCallRecord> = Vec::new();
        let mut usage_total: Option<Usage> = None;
        let mut last_text = String::new();

        for _step in 0..self.max_steps {
            let response = self
                .invoke_step(&messages, &descriptors, sink, cancel)
                .await?;
            if let Some(step_usage) = &response.usage {
                usage_total.get_or_insert_with(Usage::default).add(step_usage);
            }

            if response.tool_calls.is_empty() {
                let finish_reason = match response.finish_reason {
                    FinishReason::Length => FinishReason::Length,
                    _ => FinishReason::Stop,
                };
                self.emit(sink, ChatChunk::finish(finish_reason, usage_total.clone()))
                    .await?;
                return Ok(ChatOutput {
                    text: response.content,
                    tool_calls: records,
                    usage: usage_total,
                    finish_reason,
                });
            }

            last_text = response.content.clone();
            messages.push(Message::assistant_with_calls(
                response.content,
                response.tool_calls.clone(),
            ));
            for call in response.tool_calls {
                if cancel.is_cancelled() {
                    return Err(AgentError::execution(&self.config.id, "cancelled"));
                }
                self.emit(
                    sink,
                    ChatChunk::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    },
                )
                .await?;
                // Tool failures become result strings the model can react to.
                let result = match tools.get(&call.name) {
                    Some(tool) => match tool.execute(call.arguments.clone()).await {
                        Ok(value) => value,
                        Err(e) => Value::String(format!("Error: {e}")),
                    },
                    None => Value::String(format!("Error: unknown tool {}", call.name)),
                };
                self.emit(
                    sink,
                    ChatChunk::ToolResult {
                        id: call.id.clone(),
                        result: result.clone(),
                    },
                )
                .await?;
                let feedback = match &result {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                messages.push(Message::tool(call.id.clone(), call.name.clone(), feedback));
                records.push(ToolCallRecord {
                    id: call.id,
                    tool_name: call.name,
                    args: call.arguments,
                    result: Some(result),
                });
            }
        }

        // Step cap reached: report it rather than silently truncating.
        self.emit(sink, ChatChunk::finish(FinishReason::Steps, usage_total.clone()))
            .await?;
        Ok(ChatOutput {
            text: last_text,
            tool_calls: records,
            usage: usage_total,
            finish_reason: FinishReason::Steps,
        })
    }

    /// One model invocation, cancellable, with text deltas forwarded to the
    /// sink in order (the forwarder drains before tool chunks follow).
    async fn invoke_step(
        &self,
        messages: &[Message],
        descriptors: &[crate::llm::ToolDescriptor],
        sink: Option<&mpsc::Sender<ChatChunk>>,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::execution(&self.config.id, "cancelled"));
        }
        let invocation = async {
            match sink {
                Some(sink) => {
                    let (delta_tx, mut delta_rx) = mpsc::channel::<String>(16);
                    let sink = sink.clone();
                    let forwarder = tokio::spawn(async move {
                        while let Some(delta) = delta_rx.recv().await {
                            if send_chunk(&sink, ChatChunk::text(delta)).await.is_err() {
                                break;
                            }
                        }
                    });
                    let result = self
                        .llm
                        .invoke_stream(messages, descriptors, Some(delta_tx))
                        .await;
                    let _ = forwarder.await;
                    result
                }
                None => self.llm.invoke(messages, descriptors).await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::execution(&self.config.id, "cancelled")),
            result = invocation => result.map_err(|e| AgentError::execution(&self.config.id, e)),
        }
    }

    async fn emit(
        &self,
        sink: Option<&mpsc::Sender<ChatChunk>>,
        chunk: ChatChunk,
    ) -> Result<(), AgentError> {
        let Some(sink) = sink else { return Ok(()) };
        send_chunk(sink, chunk).await.map_err(|_| {
            AgentError::execution(&self.config.id, "stream consumer went away")
        })
    }
}

/// Bounded send: a full channel past the write timeout (or a dropped
/// receiver) fails, which aborts the producing turn at its next emit.
async fn send_chunk(sink: &mpsc::Sender<ChatChunk>, chunk: ChatChunk) -> Result<(), ()> {
    match tokio::time::timeout(STREAM_WRITE_TIMEOUT, sink.send(chunk)).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}
