//! Agent listing, chat, and chat streaming routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use aviary::{AgentError, AgentSummary, ChatInput, ChatOutput};
use stream_event::ChatChunk;

use crate::app::AppState;
use crate::error::{new_trace_id, ApiError};

/// SSE frame channel capacity; the producer turn observes backpressure
/// through the agent's own chunk channel behind this.
const FRAME_CHANNEL_CAPACITY: usize = 32;

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "agents": state.registry.list() }))
}

pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<AgentSummary>, ApiError> {
    let config = state.registry.get_config(&path)?;
    Ok(Json(AgentSummary {
        path: config.path,
        id: config.id,
        name: config.name,
        description: config.description,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    pub data: ChatOutput,
    pub trace_id: String,
}

fn validate(input: &ChatInput) -> Result<(), AgentError> {
    if input.message.trim().is_empty() {
        return Err(AgentError::Validation("message must be non-empty".into()));
    }
    Ok(())
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Json(input): Json<ChatInput>,
) -> Result<Json<ChatResponse>, ApiError> {
    let trace_id = new_trace_id();
    validate(&input).map_err(|e| ApiError::new(e).with_trace(trace_id.clone()))?;
    let agent = state
        .registry
        .get(&path)
        .map_err(|e| ApiError::new(e).with_trace(trace_id.clone()))?;
    let output = agent
        .execute(input)
        .await
        .map_err(|e| ApiError::new(e).with_trace(trace_id.clone()))?;
    Ok(Json(ChatResponse {
        success: true,
        data: output,
        trace_id,
    }))
}

/// SSE stream of one turn: a `start` frame with the trace id, each
/// [`ChatChunk`] JSON-serialized as its own data frame, then `done` — or an
/// `error` frame as the terminal frame. Client disconnect cancels the turn.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Json(input): Json<ChatInput>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError>
{
    let trace_id = new_trace_id();
    validate(&input).map_err(|e| ApiError::new(e).with_trace(trace_id.clone()))?;
    let agent = state
        .registry
        .get(&path)
        .map_err(|e| ApiError::new(e).with_trace(trace_id.clone()))?;

    let cancel = CancellationToken::new();
    let mut chunks = agent.execute_stream(input, cancel.clone());
    let (tx, rx) = mpsc::channel::<Value>(FRAME_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        if tx
            .send(json!({ "type": "start", "traceId": trace_id }))
            .await
            .is_err()
        {
            cancel.cancel();
            return;
        }
        while let Some(chunk) = chunks.next().await {
            let terminal_error = matches!(chunk, ChatChunk::Error { .. });
            let frame = match chunk {
                ChatChunk::Error { content } => json!({ "type": "error", "content": content }),
                other => serde_json::to_value(&other).unwrap_or(Value::Null),
            };
            if tx.send(frame).await.is_err() {
                // Consumer went away; stop the in-flight turn.
                cancel.cancel();
                return;
            }
            if terminal_error {
                return;
            }
        }
        let _ = tx.send(json!({ "type": "done" })).await;
    });

    let stream = ReceiverStream::new(rx)
        .map(|value| Ok(Event::default().data(value.to_string())));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
