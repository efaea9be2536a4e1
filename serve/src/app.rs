//! Axum app: shared state and router.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use aviary::{Registry, TaskExecutor};
use config::ServerSettings;

use crate::{a2a, agents, health, well_known};

/// State shared by every request handler. Constructed once at startup and
/// passed in; nothing here is a process global.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub executor: Arc<TaskExecutor>,
    pub settings: ServerSettings,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/agents", get(agents::list_agents))
        .route("/agents/:path", get(agents::get_agent))
        .route("/agents/:path/chat", post(agents::chat))
        .route("/agents/:path/stream", post(agents::stream))
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/.well-known/agent.json", get(well_known::service_card))
        .route(
            "/.well-known/agents/:path/agent.json",
            get(well_known::agent_card),
        )
        .route("/a2a/tasks", post(a2a::create_task).get(a2a::list_tasks))
        .route("/a2a/tasks/:id", get(a2a::get_task))
        .route("/a2a/tasks/:id/cancel", post(a2a::cancel_task))
        .route("/a2a/tasks/:id/stream", get(a2a::stream_task))
        .with_state(state)
}
