//! Prometheus scrape endpoint.

use std::net::SocketAddr;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
}

async fn metrics_handler() -> impl IntoResponse {
    match validator_telemetry::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, validator_telemetry::metrics_content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Bind the metrics port and serve scrapes on a background task.
///
/// Returns the bound address, which differs from `addr` when port 0 is given.
pub async fn spawn_metrics_server(
    addr: SocketAddr,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "Prometheus metrics server listening");

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, metrics_router()).await {
            error!(error = %e, "Metrics server stopped");
        }
    });
    Ok((local_addr, handle))
}
