//! Rest Clock - A state-managed HTTP server for workout rest timers
//!
//! This is the main entry point for the rest-clock application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use rest_clock::{
    api::create_router,
    config::Config,
    services::HttpBackendClient,
    state::AppState,
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("rest_clock={},tower_http=info", config.log_level()))
        .init();

    info!("Starting rest-clock server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, backend={}, sync every {}s",
          config.host, config.port, config.backend_url, config.sync_interval().as_secs());

    let backend = HttpBackendClient::new(
        config.backend_url.clone(),
        config.backend_key.clone(),
        config.request_timeout(),
    )?;

    // Create application state
    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        config.warning_threshold,
        config.sync_interval(),
        Arc::new(backend),
        Arc::new(SystemClock),
    ));

    // Background sync waits for a session before probing
    let sync_task = state.spawn_background_sync();

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /timer               - Current rest timer");
    info!("  POST /timer/start         - Start a rest period");
    info!("  POST /timer/pause|resume  - Pause or resume the countdown");
    info!("  POST /timer/reset|cancel  - Restart or dismiss the countdown");
    info!("  POST /timer/add-time      - Extend the rest period");
    info!("  GET  /timer/events        - Timer updates (SSE)");
    info!("  GET  /sync/status         - Background sync status");
    info!("  POST /sync/trigger        - Probe the backend now");
    info!("  POST|DELETE /session      - Sign in or out");
    info!("  GET  /status              - Combined status");
    info!("  GET  /health              - Health check");

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_signal(shutdown).await })
        .await?;

    // Stop background work before exiting
    state.shutdown.cancel();
    if let Err(e) = sync_task.await {
        tracing::error!("Background sync task failed: {}", e);
    }
    if let Err(e) = state.timer.cancel_timer() {
        tracing::error!("Failed to stop rest timer: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
