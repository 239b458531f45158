//! Zoom OAuth authorization-code callback.
//!
//! Exchanges the `code` Zoom redirects with for access and refresh tokens,
//! and keeps them in memory for the life of the process.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use relay_core::config::ZoomConfig;
use relay_core::{RelayError, Result};

use crate::error::ApiError;
use crate::state::AppState;

pub const AUTHORIZED_MESSAGE: &str =
    "Your app has been successfully authorized! You can now close this window.";

/// Tokens returned by the Zoom token endpoint.
#[derive(Clone)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthTokens {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// In-memory holder for the most recent token grant.
#[derive(Clone, Debug, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<OAuthTokens>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, tokens: OAuthTokens) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
    }

    pub fn get(&self) -> Option<OAuthTokens> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether an unexpired access token is held.
    pub fn is_authorized(&self) -> bool {
        self.get().is_some_and(|t| !t.is_expired(Utc::now()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchange an authorization code at `zoom.token_url`.
pub async fn exchange_code(
    client: &reqwest::Client,
    zoom: &ZoomConfig,
    code: &str,
) -> Result<OAuthTokens> {
    let (client_id, client_secret) = zoom.oauth_credentials().ok_or_else(|| {
        RelayError::Config("Zoom client id and secret are not configured".to_string())
    })?;

    let mut params = vec![("grant_type", "authorization_code"), ("code", code)];
    if let Some(redirect_uri) = zoom.redirect_uri.as_deref() {
        params.push(("redirect_uri", redirect_uri));
    }

    let response = client
        .post(&zoom.token_url)
        .query(&params)
        .basic_auth(client_id, Some(client_secret))
        .send()
        .await
        .map_err(|e| RelayError::OAuth(format!("token request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, body = %body, "Zoom token exchange rejected");
        return Err(RelayError::OAuth(format!(
            "token endpoint returned {}",
            status
        )));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| RelayError::OAuth(format!("invalid token response: {}", e)))?;

    Ok(OAuthTokens {
        access_token: body.access_token,
        refresh_token: body.refresh_token,
        expires_at: body
            .expires_in
            .and_then(Duration::try_seconds)
            .map(|ttl| Utc::now() + ttl),
    })
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
}

/// GET /zoom_oauth_callback
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallbackParams>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    tracing::info!("Received OAuth callback");

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Authorization code not found.".to_string()))?;

    let tokens = exchange_code(&state.http, &state.config.zoom, &code)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Error exchanging code for token");
            ApiError::from(e)
        })?;

    tracing::info!(
        expires_at = ?tokens.expires_at,
        has_refresh_token = tokens.refresh_token.is_some(),
        "Zoom access token received"
    );
    state.tokens.store(tokens);

    Ok((StatusCode::OK, AUTHORIZED_MESSAGE))
}
