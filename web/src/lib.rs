//! HTTP surface for the live visitor counter.
//!
//! Routes:
//!
//! - `GET /sse`: the count stream (see [`sse`])
//! - `GET /status`: one JSON snapshot of the current counts
//! - `GET /visitor`: the caller's visitor identity
//! - `GET /health`: liveness probe
use log::*;
pub use service::AppState;
use tokio::net::TcpListener;

mod controller;
pub mod error;
mod extractors;
mod middleware;
pub mod router;
pub mod sse;

/// Bind the configured address and serve until the process is stopped.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state.config.interface().to_string();
    let port = app_state.config.port;
    let listener = TcpListener::bind((host.as_str(), port)).await?;

    info!(
        "Server starting... listening for connections on http://{}:{}",
        host, port
    );

    let app = router::define_routes(app_state);
    axum::serve(listener, app).await
}
