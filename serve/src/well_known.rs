//! Well-known discovery endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use aviary::{AgentCard, AgentError, ServiceCard};

use crate::app::AppState;
use crate::error::{new_trace_id, ApiError};

const SERVICE_NAME: &str = "aviary";
const SERVICE_DESCRIPTION: &str = "Multi-tenant agent hosting service";

pub async fn service_card(State(state): State<Arc<AppState>>) -> Json<ServiceCard> {
    Json(aviary::service_card(
        &state.registry,
        SERVICE_NAME,
        SERVICE_DESCRIPTION,
        &state.settings.public_url,
        env!("CARGO_PKG_VERSION"),
    ))
}

pub async fn agent_card(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<AgentCard>, ApiError> {
    let trace_id = new_trace_id();
    aviary::agent_card(
        &state.registry,
        &path,
        &state.settings.public_url,
        env!("CARGO_PKG_VERSION"),
    )
    .map(Json)
    .ok_or_else(|| ApiError::new(AgentError::NotFound(path)).with_trace(trace_id))
}
