//! Application state shared across all route handlers.
//!
//! AppState holds the detector and the collaborators around it. It is passed
//! to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_core::{Detector, RelayConfig};

use crate::oauth::TokenStore;
use crate::webhook::CallRegistry;

/// Shared application state.
///
/// Every field is cheap to clone; shared mutable state lives behind `Arc`s
/// inside the individual types.
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration. Read-only after startup.
    pub config: Arc<RelayConfig>,
    /// The single detection stream.
    pub detector: Detector,
    /// Live phone calls reported by the webhook.
    pub calls: CallRegistry,
    /// Tokens from the most recent OAuth grant.
    pub tokens: TokenStore,
    /// Outbound HTTP client for Zoom endpoints.
    pub http: reqwest::Client,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: RelayConfig, detector: Detector) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("objection-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: Arc::new(config),
            detector,
            calls: CallRegistry::new(),
            tokens: TokenStore::new(),
            http,
            start_time: Instant::now(),
        }
    }
}
