//! Agent-to-agent task protocol: observable background executions.
//!
//! A task is a client-visible record of one agent turn with its own
//! lifecycle. Status moves `pending → in_progress → {completed|failed|
//! cancelled}`; `cancelled` is reachable from `pending` or `in_progress`
//! only; `input_required` can interleave with `in_progress`. `created_at`
//! never changes and `updated_at` advances on every transition.

pub mod executor;

pub use executor::{CreateTaskRequest, TaskExecutor, DEFAULT_TASK_MAX_AGE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChatOutput;

/// Task lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    InputRequired,
}

impl TaskStatus {
    /// Completed, failed, and cancelled tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// The transition table; everything not listed is rejected.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (InProgress, InputRequired)
                | (InputRequired, InProgress)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::InputRequired => "input_required",
        }
    }
}

/// One A2A task record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct A2aTask {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub agent_path: String,
    pub message: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ChatOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
