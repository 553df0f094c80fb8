//! Liveness endpoint.
//!
//! A single always-200 route used for process liveness probing. It shares
//! no state with the pipeline and serves from startup, before the broker
//! connection is attempted.

use std::net::SocketAddr;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use crate::error::Result;

/// Create the HTTP router.
pub fn router() -> Router {
    Router::new().route("/health", get(health_handler))
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// Serve the health endpoint until the task is cancelled.
pub async fn serve(listen: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;

    tracing::info!(addr = %listen, "Health endpoint listening");

    axum::serve(listener, router()).await?;

    Ok(())
}
