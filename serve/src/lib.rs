//! HTTP server for aviary (axum + SSE).
//!
//! Routes: agent listing and chat (`/agents/...`), health probes, well-known
//! discovery cards, and the A2A task surface (`/a2a/tasks/...`). Streaming
//! endpoints are server-sent events framed as `{type:"start"}` …chunks…
//! `{type:"done"}` / `{type:"error"}`.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`], [`AppState`].

mod a2a;
mod agents;
pub mod app;
mod error;
mod health;
mod well_known;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

pub use app::{router, AppState};

use aviary::{Registry, TaskExecutor, DEFAULT_TASK_MAX_AGE};
use config::ServerSettings;

/// How often terminal tasks are swept.
const TASK_GC_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Runs the server on an existing listener. Used by tests (bind to
/// 127.0.0.1:0 first, then pass the listener). Serves until ctrl-c, then
/// shuts the registry down.
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("aviary listening on http://{}", addr);

    let gc_executor = Arc::clone(&state.executor);
    let gc = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TASK_GC_INTERVAL);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            gc_executor.cleanup_old_tasks(DEFAULT_TASK_MAX_AGE);
        }
    });

    let registry = Arc::clone(&state.registry);
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    gc.abort();
    registry.shutdown_all().await;
    Ok(())
}

/// Loads the registry from the configured directory and serves on the
/// configured port.
pub async fn run_serve(
    settings: ServerSettings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Registry::load_all(&settings.agents_dir)?;
    info!(agents = registry.len(), dir = %settings.agents_dir.display(), "registry loaded");
    let executor = TaskExecutor::new(Arc::clone(&registry));
    let listener = TcpListener::bind(("0.0.0.0", settings.port)).await?;
    let state = Arc::new(AppState {
        registry,
        executor,
        settings,
    });
    run_serve_on_listener(listener, state).await
}
