//! HTTP surface over the current reading and the stored history.
//!
//! `GET /readings` serves the latest snapshot (optionally setting the fan),
//! `GET /graph?time=` serves a stored range and `GET /api/health` reports
//! liveness.

pub mod config;
pub mod handlers;
pub mod router;

pub use config::WebConfig;
pub use handlers::AppState;
pub use router::create_app;

use crate::error::{EnviroError, Result};
use std::future::Future;
use std::net::SocketAddr;
use tracing::info;

/// Serve until `shutdown_signal` resolves.
pub async fn start_web_server<F>(config: WebConfig, state: AppState, shutdown_signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(&config, state);

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| EnviroError::config_error(format!("Invalid bind address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| EnviroError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Starting enviro_web server on http://{}", addr);
    info!("Current readings: http://{}/readings", addr);
    info!("History: http://{}/graph?time=day", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| EnviroError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}
