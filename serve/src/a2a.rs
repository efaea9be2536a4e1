//! A2A task routes: create, list, get, cancel, stream.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use aviary::{A2aTask, CreateTaskRequest};

use crate::app::AppState;
use crate::error::{new_trace_id, ApiError};

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<A2aTask>), ApiError> {
    let trace_id = new_trace_id();
    let task = state
        .executor
        .create_task(request)
        .map_err(|e| ApiError::new(e).with_trace(trace_id))?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksQuery {
    pub agent_path: Option<String>,
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TasksQuery>,
) -> Json<Value> {
    let tasks = state.executor.list_tasks(query.agent_path.as_deref());
    Json(json!({ "tasks": tasks }))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<A2aTask>, ApiError> {
    let trace_id = new_trace_id();
    state
        .executor
        .get_task(&id)
        .map(Json)
        .ok_or_else(|| {
            ApiError::new(aviary::AgentError::TaskNotFound(id)).with_trace(trace_id)
        })
}

pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let trace_id = new_trace_id();
    let cancelled = state
        .executor
        .cancel_task(&id)
        .map_err(|e| ApiError::new(e).with_trace(trace_id))?;
    let status = state.executor.get_task(&id).map(|t| t.status);
    Ok(Json(json!({
        "taskId": id,
        "cancelled": cancelled,
        "status": status,
    })))
}

/// SSE stream of one task's events. The event stream itself is terminal-safe:
/// the executor guarantees the last event is `complete` or `error`.
pub async fn stream_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError>
{
    let trace_id = new_trace_id();
    let events = state
        .executor
        .stream_task(&id)
        .map_err(|e| ApiError::new(e).with_trace(trace_id))?;
    let stream = events.map(|event| {
        let value = serde_json::to_value(&event).unwrap_or(Value::Null);
        Ok(Event::default().data(value.to_string()))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
