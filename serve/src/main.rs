//! aviary-server: load config, init tracing, serve.

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_and_apply("aviary", None) {
        eprintln!("config load failed: {e}");
        std::process::exit(1);
    }

    let filter = std::env::var("AVIARY_LOG")
        .ok()
        .and_then(|raw| raw.parse::<EnvFilter>().ok())
        .unwrap_or_else(|| {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = match config::ServerSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("invalid settings: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = serve::run_serve(settings).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
