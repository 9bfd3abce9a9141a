use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use toolrelay_server::app_state::AppState;
use toolrelay_server::config::ServerConfig;
use toolrelay_server::session::TransportRegistry;
use toolrelay_server::tools;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;
    let http = reqwest::Client::new();

    let registry = tools::builtin_registry(&config, &http);
    tracing::info!(count = registry.len(), "registered tools");

    let state = AppState::new(registry);
    let sessions = Arc::clone(&state.sessions);
    let app = toolrelay_server::router::create_router(state);

    let addr = config.bind_addr();
    tracing::info!("toolrelay server listening on {addr}");
    tracing::info!("push channel available at http://{addr}/sse");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await?;

    Ok(())
}

/// Wait for Ctrl-C, then end every push channel so open streams let the
/// server drain.
async fn shutdown_signal(sessions: Arc<TransportRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    let closed = sessions.close_all();
    tracing::info!(closed, "shutting down");
}
