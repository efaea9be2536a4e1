//! Service-level error taxonomy.
//!
//! One enum covers the whole surface so transport code can map any failure to
//! the wire envelope via [`AgentError::code`] and [`AgentError::http_status`].
//! Lower layers keep their own error types (`LlmError`, `ToolSourceError`,
//! `RetrievalError`) and are wrapped at the agent boundary.

use thiserror::Error;

/// Top-level error for registry, runtime, and A2A operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No agent registered under the requested path.
    #[error("agent not found: {0}")]
    NotFound(String),

    /// An agent definition file failed to parse or validate. Names the file so
    /// the operator can fix and reload.
    #[error("agent config error in {file}: {reason}")]
    Config { file: String, reason: String },

    /// A tool-source connection could not be established.
    #[error("tool source connection failed: {0}")]
    McpConnection(String),

    /// A provider or tool call failed while executing a turn.
    #[error("agent {agent_id} execution failed: {reason}")]
    Execution { agent_id: String, reason: String },

    /// A request body failed validation.
    #[error("validation: {0}")]
    Validation(String),

    /// No task with the given id.
    #[error("a2a task not found: {0}")]
    TaskNotFound(String),

    /// An A2A task operation failed.
    #[error("a2a task error: {0}")]
    Task(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Builds an execution error for the given agent from any displayable cause.
    pub fn execution(agent_id: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        AgentError::Execution {
            agent_id: agent_id.into(),
            reason: cause.to_string(),
        }
    }

    /// Stable machine-readable error code for the wire envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::NotFound(_) => "AGENT_NOT_FOUND",
            AgentError::Config { .. } => "AGENT_CONFIG_ERROR",
            AgentError::McpConnection(_) => "MCP_CONNECTION_ERROR",
            AgentError::Execution { .. } => "AGENT_EXECUTION_ERROR",
            AgentError::Validation(_) => "VALIDATION_ERROR",
            AgentError::TaskNotFound(_) | AgentError::Task(_) => "A2A_TASK_ERROR",
            AgentError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the transport layer should use for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            AgentError::NotFound(_) | AgentError::TaskNotFound(_) => 404,
            AgentError::Validation(_) => 400,
            AgentError::McpConnection(_) => 503,
            AgentError::Config { .. }
            | AgentError::Execution { .. }
            | AgentError::Task(_)
            | AgentError::Internal(_) => 500,
        }
    }
}
