//! Delegation tools: expose another agent's execute as a callable tool.
//!
//! The tool holds a `Weak` registry reference — the registry owns the agents
//! and is shut down last, so the tool looks the target up at invocation time
//! and never keeps it alive. Failures come back as a plain string result so
//! the calling model can recover instead of aborting the turn.

use std::sync::Weak;

use serde_json::{json, Value};

use super::Tool;
use crate::agent_config::DelegationTarget;
use crate::chat::ChatInput;
use crate::registry::Registry;

/// Builds the tool for one delegation target. Target resolution is deferred
/// to invocation: a target missing from the registry is a tool-level error
/// string, not an initialization failure.
pub fn delegation_tool(target: &DelegationTarget, registry: Weak<Registry>) -> Tool {
    let parameters = json!({
        "type": "object",
        "properties": {
            "message": {
                "type": "string",
                "description": "The message to send to the delegate agent"
            }
        },
        "required": ["message"]
    });
    let agent_path = target.agent_path.clone();
    Tool::new(
        target.tool_name.clone(),
        target.description.clone(),
        parameters,
        move |args| {
            let registry = registry.clone();
            let agent_path = agent_path.clone();
            Box::pin(async move {
                let message = args
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(Value::String(delegate(registry, &agent_path, message).await))
            })
        },
    )
}

/// Runs one delegated turn; any failure is rendered into the error string the
/// model sees.
async fn delegate(registry: Weak<Registry>, agent_path: &str, message: String) -> String {
    let outcome = async {
        let registry = registry
            .upgrade()
            .ok_or_else(|| "registry is shutting down".to_string())?;
        let agent = registry
            .get(agent_path)
            .map_err(|e| e.to_string())?;
        let output = agent
            .execute(ChatInput::new(message))
            .await
            .map_err(|e| e.to_string())?;
        Ok::<String, String>(output.text)
    }
    .await;

    match outcome {
        Ok(text) => text,
        Err(reason) => format!(
            "Error: Failed to get response from {} agent. {}",
            agent_path, reason
        ),
    }
}
