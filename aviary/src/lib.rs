//! # Aviary
//!
//! A multi-tenant agent runtime: declarative JSON configs become runnable
//! conversational agents behind one process, each with its own provider,
//! tool sources, retrieval policy, and delegation targets.
//!
//! ## Main modules
//!
//! - [`registry`]: [`Registry`] — load agent definitions from a directory,
//!   look agents up by path, sequence shutdown.
//! - [`agent`]: [`RuntimeAgent`] — bounded tool loop, per-request dynamic
//!   tools, system prompt assembly, streaming turns.
//! - [`llm`]: [`LlmClient`] trait with [`GeminiClient`] (native),
//!   [`OpenAiCompatClient`], and [`MockLlm`].
//! - [`tool_source`]: [`ToolSource`], [`McpToolSource`] (stdio / streamable
//!   HTTP JSON-RPC).
//! - [`tools`]: internal [`Tool`] / [`ToolSet`], the schema translator,
//!   delegation tools, and the per-request page-content tool.
//! - [`retrieval`]: [`RetrievalClient`] with Pinecone-, Chroma-, and
//!   pgvector-style backends plus the context formatter.
//! - [`a2a`]: [`TaskExecutor`] — observable background tasks with a strict
//!   status state machine, streaming, cancellation, and retention GC.
//! - [`discovery`]: service and agent capability cards.
//!
//! Wire chunk and event types live in the `stream-event` crate and are
//! re-exported here ([`ChatChunk`], [`A2aStreamEvent`], [`FinishReason`],
//! [`Usage`]).

pub mod a2a;
pub mod agent;
pub mod agent_config;
pub mod chat;
pub mod discovery;
pub mod error;
pub mod llm;
pub mod message;
pub mod registry;
pub mod retrieval;
pub mod tool_source;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use a2a::{A2aTask, CreateTaskRequest, TaskExecutor, TaskStatus, DEFAULT_TASK_MAX_AGE};
pub use agent::{
    DynamicToolRule, PageContextRule, RuntimeAgent, DEFAULT_MAX_STEPS, PAGE_CONTEXT_INSTRUCTION,
};
pub use agent_config::{
    AgentConfig, Capability, DelegationConfig, DelegationTarget, DiscoveryConfig, Provider,
    ProviderConfig, RetrievalConfig, RetrievalProvider, ToolSourceConfig, ToolTransport,
};
pub use chat::{ChatInput, ChatOutput, ToolCallRecord, PAGE_CONTEXT_KEY};
pub use discovery::{agent_card, service_card, AgentCard, ServiceCard, Skill, PROTOCOL_VERSION};
pub use error::AgentError;
pub use llm::{
    GeminiClient, LlmClient, LlmError, LlmResponse, MockLlm, OpenAiCompatClient, ToolCall,
    ToolDescriptor,
};
pub use message::Message;
pub use registry::{AgentSummary, Registry};
pub use retrieval::{
    format_context, ChromaStore, Embedder, GeminiEmbedder, PgvectorStore, PineconeStore,
    RetrievalClient, RetrievalError, RetrievedDoc, VectorStore,
};
pub use tool_source::{
    McpToolSource, MockToolSource, ToolCallContent, ToolSource, ToolSourceError, ToolSpec,
};
pub use tools::{
    delegation_tool, page_content_tool, translate_tool, ArgSchema, Tool, ToolError, ToolSet,
};
pub use stream_event::{A2aEventType, A2aStreamEvent, ChatChunk, FinishReason, Usage};
