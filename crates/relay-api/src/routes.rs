//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, body limits, and all
//! endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use relay_core::RelayError;

use crate::state::AppState;
use crate::{handlers, oauth, webhook};

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Viewers may be served from any origin (the Zoom app's own front end).
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let viewer_routes = Router::new()
        .route("/stream", get(handlers::stream))
        .route("/detection/current", get(handlers::current_detection));

    let ingest_routes = Router::new()
        .route(
            "/transcripts",
            post(handlers::ingest_transcript).layer(DefaultBodyLimit::max(64 * 1024)),
        )
        .route("/rtms", get(handlers::rtms));

    let zoom_routes = Router::new()
        .route("/zoom_webhook_endpoint", post(webhook::zoom_webhook))
        .route("/zoom_oauth_callback", get(oauth::oauth_callback));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(viewer_routes)
        .merge(ingest_routes)
        .merge(zoom_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address and serve until Ctrl-C.
pub async fn start_server(state: AppState) -> relay_core::Result<()> {
    let addr = state.config.server.bind_addr();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
