use std::{error::Error, sync::Arc};

mod core;
mod error_handler;
mod routes;

pub use crate::core::{app_state::AppState, config::ApiConfig};
pub use crate::error_handler::{AppError, AppResult};

use axum::{Router, routing::post};
use tokio::signal;
use tracing::info;

use crate::routes::ask::ask_route::ask;

/// Builds the HTTP router over an already constructed state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/finders/{finder_id}/ask", post(ask))
        .with_state(state)
}

pub async fn start() -> Result<(), Box<dyn Error>> {
    let cfg = ApiConfig::from_env()?;
    info!(?cfg, "Starting QA API");

    // Model loading blocks (downloads, weight mapping).
    let state = {
        let cfg = cfg.clone();
        tokio::task::spawn_blocking(move || AppState::from_config(&cfg)).await??
    };
    let app = router(Arc::new(state));

    // Bind to address
    let listener = tokio::net::TcpListener::bind(&cfg.address)
        .await
        .map_err(AppError::Bind)?;

    info!("Listening on http://{}", cfg.address);
    info!(
        r#"Try it out: curl --request POST --url 'http://127.0.0.1:{}/finders/1/ask' --data '{{"question": "Who is the father of Arya Stark?"}}'"#,
        listener.local_addr().map(|a| a.port()).unwrap_or(8000)
    );

    // Start server with graceful shutdown on Ctrl+C
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    Ok(())
}

/// Returns a future that resolves when Ctrl+C is pressed
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests;
