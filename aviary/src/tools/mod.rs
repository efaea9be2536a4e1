//! Internal tool representation.
//!
//! A [`Tool`] pairs a wire-facing JSON schema (what the model sees) with a
//! validating argument decoder derived from it and an async execute closure.
//! [`ToolSet`] is the name-keyed table the agent loop works against; the
//! per-turn table is the union of the static set and any dynamic tools.

pub mod delegate;
pub mod page_context;
pub mod translate;

pub use delegate::delegation_tool;
pub use page_context::page_content_tool;
pub use translate::{translate_tool, ArgSchema};

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::llm::ToolDescriptor;

/// Errors from invoking a tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("execution failed: {0}")]
    Execution(String),
}

type ToolExecutor = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// One callable tool: name, description, argument schema, execute closure.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    /// JSON-Schema object handed to providers.
    parameters: Value,
    schema: ArgSchema,
    executor: ToolExecutor,
}

impl Tool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        executor: F,
    ) -> Self
    where
        F: Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync + 'static,
    {
        let schema = ArgSchema::from_schema(&parameters);
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            schema,
            executor: Arc::new(executor),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn arg_schema(&self) -> &ArgSchema {
        &self.schema
    }

    /// Validates `args` against the schema, then runs the executor.
    pub async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        self.schema.validate(&args)?;
        (self.executor)(args).await
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Name-keyed tool table with deterministic iteration order.
#[derive(Clone, Debug, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Tool>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tool; a later insert under the same name replaces the earlier
    /// one (dynamic tools shadow static ones).
    pub fn insert(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Union with `other`; entries from `other` win on name collisions.
    pub fn merged_with(&self, other: ToolSet) -> ToolSet {
        let mut merged = self.clone();
        for (_, tool) in other.tools {
            merged.insert(tool);
        }
        merged
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(Tool::descriptor).collect()
    }
}
