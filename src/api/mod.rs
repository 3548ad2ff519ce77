//! HTTP API. Axum server exposing pricing and valuation.
//!
//! Serves a small JSON REST API over the engine. CORS enabled for
//! the admin front-end.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use routes::AppState;

/// Bind and serve the API until the task is dropped.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!(port, "API server listening on http://localhost:{port}");

    axum::serve(listener, app).await.context("API server error")
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/price", get(routes::get_price))
        .route("/api/sweep", get(routes::get_sweep))
        .route("/api/sweeps", get(routes::get_sweeps))
        .route("/api/value", post(routes::post_value))
        .route("/api/convert", get(routes::get_convert))
        .route("/api/catalog/mutations", get(routes::get_mutations))
        .route("/api/catalog/traits", get(routes::get_traits))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
