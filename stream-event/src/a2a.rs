//! A2A task event wire type.
//!
//! The first event on a task stream is always `status` with
//! `data.status == "in_progress"`; the last is `complete` or `error`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event kind for one A2A stream frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum A2aEventType {
    Status,
    Text,
    Artifact,
    Error,
    Complete,
}

/// One A2A stream event: kind + owning task + payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A2aStreamEvent {
    #[serde(rename = "type")]
    pub event_type: A2aEventType,
    pub task_id: String,
    pub data: Value,
}

impl A2aStreamEvent {
    pub fn status(task_id: impl Into<String>, status: &str) -> Self {
        Self {
            event_type: A2aEventType::Status,
            task_id: task_id.into(),
            data: serde_json::json!({ "status": status }),
        }
    }

    pub fn text(task_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            event_type: A2aEventType::Text,
            task_id: task_id.into(),
            data: serde_json::json!({ "content": content.into() }),
        }
    }

    pub fn artifact(task_id: impl Into<String>, artifact: Value) -> Self {
        Self {
            event_type: A2aEventType::Artifact,
            task_id: task_id.into(),
            data: artifact,
        }
    }

    pub fn error(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type: A2aEventType::Error,
            task_id: task_id.into(),
            data: serde_json::json!({ "message": message.into() }),
        }
    }

    pub fn complete(task_id: impl Into<String>, result: Value) -> Self {
        Self {
            event_type: A2aEventType::Complete,
            task_id: task_id.into(),
            data: result,
        }
    }

    /// True for `complete` and `error`, the two frames that end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event_type,
            A2aEventType::Complete | A2aEventType::Error
        )
    }
}
