//! A2A task executor: create, track, stream, cancel, and GC background tasks.
//!
//! Task records live in a concurrent map; every status change goes through
//! [`TaskExecutor::transition`], which checks the state machine under the
//! map's entry lock (compare-and-set — `completed → cancelled` and friends
//! are rejected). Cancellation is cooperative: a token per task is read at
//! each loop step and awaited I/O boundary of the underlying turn.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{A2aTask, TaskStatus};
use crate::chat::{ChatInput, ChatOutput, ToolCallRecord};
use crate::error::AgentError;
use crate::registry::Registry;
use stream_event::{A2aStreamEvent, ChatChunk};

/// Terminal completed/failed tasks older than this are garbage collected.
pub const DEFAULT_TASK_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Event channel capacity for one task stream.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Body of a task-creation request.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub agent_path: String,
    pub message: String,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Owns all task records and their cancellation tokens.
pub struct TaskExecutor {
    registry: Arc<Registry>,
    tasks: DashMap<String, A2aTask>,
    cancellations: DashMap<String, CancellationToken>,
}

impl TaskExecutor {
    pub fn new(registry: Arc<Registry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            tasks: DashMap::new(),
            cancellations: DashMap::new(),
        })
    }

    /// Validates the request, records a pending task, and schedules the
    /// background execution. Returns the task descriptor immediately.
    pub fn create_task(self: &Arc<Self>, request: CreateTaskRequest) -> Result<A2aTask, AgentError> {
        if request.message.trim().is_empty() {
            return Err(AgentError::Validation("message must be non-empty".into()));
        }
        if !self.registry.has(&request.agent_path) {
            return Err(AgentError::NotFound(request.agent_path));
        }
        let now = Utc::now();
        let task = A2aTask {
            task_id: uuid::Uuid::new_v4().to_string(),
            context_id: request.context_id,
            agent_path: request.agent_path,
            message: request.message,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        let token = CancellationToken::new();
        self.tasks.insert(task.task_id.clone(), task.clone());
        self.cancellations.insert(task.task_id.clone(), token.clone());

        let executor = Arc::clone(self);
        let metadata = request.metadata;
        let spawned = task.clone();
        tokio::spawn(async move {
            executor.run_background(spawned, metadata, token).await;
        });
        Ok(task)
    }

    /// Applies `next` to the task iff the state machine allows it, advancing
    /// `updated_at`. Runs under the map entry lock; never awaits.
    fn transition(
        &self,
        task_id: &str,
        next: TaskStatus,
        apply: impl FnOnce(&mut A2aTask),
    ) -> bool {
        match self.tasks.get_mut(task_id) {
            Some(mut task) if task.status.can_transition_to(next) => {
                task.status = next;
                task.updated_at = Utc::now();
                apply(&mut task);
                true
            }
            _ => false,
        }
    }

    async fn run_background(
        self: Arc<Self>,
        task: A2aTask,
        metadata: Option<Map<String, Value>>,
        token: CancellationToken,
    ) {
        // A cancel that landed while the task was pending wins here.
        if !self.transition(&task.task_id, TaskStatus::InProgress, |_| {}) {
            self.cancellations.remove(&task.task_id);
            return;
        }
        let outcome = match self.registry.get(&task.agent_path) {
            Ok(agent) => {
                let mut input = ChatInput::new(task.message.clone());
                input.conversation_id = task.context_id.clone();
                if let Some(metadata) = metadata {
                    input.metadata = metadata;
                }
                agent.execute_with_cancel(input, &token).await
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(output) => {
                self.transition(&task.task_id, TaskStatus::Completed, |t| {
                    t.result = Some(output);
                });
            }
            Err(_) if token.is_cancelled() => {
                // cancel_task already moved the record to cancelled; the
                // discarded result needs no further bookkeeping.
            }
            Err(err) => {
                self.transition(&task.task_id, TaskStatus::Failed, |t| {
                    t.error = Some(err.to_string());
                });
            }
        }
        self.cancellations.remove(&task.task_id);
    }

    pub fn get_task(&self, task_id: &str) -> Option<A2aTask> {
        self.tasks.get(task_id).map(|t| t.value().clone())
    }

    /// All tasks, optionally filtered by agent path. Order is unspecified.
    pub fn list_tasks(&self, agent_path: Option<&str>) -> Vec<A2aTask> {
        self.tasks
            .iter()
            .filter(|entry| agent_path.map_or(true, |p| entry.value().agent_path == p))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Cancels a pending or in-progress task. Returns whether the
    /// cancellation took effect; a terminal task stays untouched and yields
    /// `false`.
    pub fn cancel_task(&self, task_id: &str) -> Result<bool, AgentError> {
        if !self.tasks.contains_key(task_id) {
            return Err(AgentError::TaskNotFound(task_id.to_string()));
        }
        let cancelled = self.transition(task_id, TaskStatus::Cancelled, |_| {});
        if cancelled {
            if let Some(token) = self.cancellations.get(task_id) {
                token.cancel();
            }
        }
        Ok(cancelled)
    }

    /// Deletes completed and failed tasks whose last update is older than
    /// `max_age`. Cancelled tasks are retained. Returns the count deleted.
    pub fn cleanup_old_tasks(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let mut removed = 0usize;
        self.tasks.retain(|_, task| {
            let eligible = matches!(task.status, TaskStatus::Completed | TaskStatus::Failed);
            let age = (now - task.updated_at).to_std().unwrap_or_default();
            if eligible && age > max_age {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            tracing::debug!(removed, "a2a task gc");
        }
        removed
    }

    /// Streams one task's execution as A2A events. The streamed execution
    /// drives its own run of the agent (it does not attach to a parallel
    /// background execute); the first event is always `status(in_progress)`
    /// and the last is `complete` or `error`.
    pub fn stream_task(
        self: &Arc<Self>,
        task_id: &str,
    ) -> Result<ReceiverStream<A2aStreamEvent>, AgentError> {
        let task = self
            .get_task(task_id)
            .ok_or_else(|| AgentError::TaskNotFound(task_id.to_string()))?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            executor.drive_stream(task, tx).await;
        });
        Ok(ReceiverStream::new(rx))
    }

    async fn drive_stream(self: Arc<Self>, task: A2aTask, tx: mpsc::Sender<A2aStreamEvent>) {
        let task_id = task.task_id.clone();
        if tx
            .send(A2aStreamEvent::status(&task_id, TaskStatus::InProgress.as_str()))
            .await
            .is_err()
        {
            return;
        }
        self.transition(&task_id, TaskStatus::InProgress, |_| {});

        let agent = match self.registry.get(&task.agent_path) {
            Ok(agent) => agent,
            Err(e) => {
                self.transition(&task_id, TaskStatus::Failed, |t| {
                    t.error = Some(e.to_string());
                });
                let _ = tx.send(A2aStreamEvent::error(&task_id, e.to_string())).await;
                return;
            }
        };
        let token = self
            .cancellations
            .get(&task_id)
            .map(|t| t.value().clone())
            .unwrap_or_default();

        let mut input = ChatInput::new(task.message.clone());
        input.conversation_id = task.context_id.clone();
        let mut chunks = agent.execute_stream(input, token.clone());

        let mut text = String::new();
        let mut records: Vec<ToolCallRecord> = Vec::new();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                ChatChunk::Text { content } => {
                    text.push_str(&content);
                    if tx
                        .send(A2aStreamEvent::text(&task_id, content))
                        .await
                        .is_err()
                    {
                        // Observer went away; stop the underlying turn.
                        token.cancel();
                        return;
                    }
                }
                ChatChunk::ToolCall { id, name, args } => {
                    let event = A2aStreamEvent::artifact(
                        &task_id,
                        serde_json::json!({"kind": "tool-call", "id": id, "name": name, "args": args}),
                    );
                    records.push(ToolCallRecord {
                        id,
                        tool_name: name,
                        args,
                        result: None,
                    });
                    if tx.send(event).await.is_err() {
                        token.cancel();
                        return;
                    }
                }
                ChatChunk::ToolResult { id, result } => {
                    if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                        record.result = Some(result.clone());
                    }
                    let event = A2aStreamEvent::artifact(
                        &task_id,
                        serde_json::json!({"kind": "tool-result", "id": id, "result": result}),
                    );
                    if tx.send(event).await.is_err() {
                        token.cancel();
                        return;
                    }
                }
                ChatChunk::Error { content } => {
                    if token.is_cancelled() {
                        let _ = tx
                            .send(A2aStreamEvent::error(&task_id, "task cancelled"))
                            .await;
                    } else {
                        self.transition(&task_id, TaskStatus::Failed, |t| {
                            t.error = Some(content.clone());
                        });
                        let _ = tx.send(A2aStreamEvent::error(&task_id, content)).await;
                    }
                    return;
                }
                ChatChunk::Finish { finish_reason, usage } => {
                    let output = ChatOutput {
                        text: text.clone(),
                        tool_calls: records.clone(),
                        usage,
                        finish_reason,
                    };
                    self.transition(&task_id, TaskStatus::Completed, |t| {
                        t.result = Some(output.clone());
                    });
                    let data = serde_json::to_value(&output).unwrap_or(Value::Null);
                    let _ = tx.send(A2aStreamEvent::complete(&task_id, data)).await;
                    return;
                }
            }
        }
        // The chunk stream ended without a terminal chunk.
        if token.is_cancelled() {
            let _ = tx
                .send(A2aStreamEvent::error(&task_id, "task cancelled"))
                .await;
        } else {
            self.transition(&task_id, TaskStatus::Failed, |t| {
                t.error = Some("stream ended unexpectedly".into());
            });
            let _ = tx
                .send(A2aStreamEvent::error(&task_id, "stream ended unexpectedly"))
                .await;
        }
    }
}
