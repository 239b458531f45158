//! Objection relay API crate - axum HTTP server, SSE detection stream,
//! transcript ingestion, and the Zoom webhook and OAuth endpoints.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod oauth;
pub mod routes;
pub mod state;
pub mod webhook;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
