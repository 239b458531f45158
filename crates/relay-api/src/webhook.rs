//! Zoom webhook endpoint.
//!
//! Answers the URL-validation handshake, authenticates ordinary events, and
//! tracks which phone calls are live. It never talks to the detector; the
//! transcript feed for a call reaches the detector through `/rtms` or
//! `/transcripts`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::auth;
use crate::error::ApiError;
use crate::state::AppState;

pub const URL_VALIDATION_EVENT: &str = "endpoint.url_validation";
pub const PHONE_CALL_STARTED: &str = "phone_call.started";
pub const PHONE_CALL_ENDED: &str = "phone_call.ended";

/// Live phone calls keyed by call id.
#[derive(Clone, Debug, Default)]
pub struct CallRegistry {
    calls: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call start. Returns false if the call was already live.
    pub fn start(&self, call_id: &str) -> bool {
        self.lock()
            .insert(call_id.to_string(), Utc::now())
            .is_none()
    }

    /// Record a call end, returning how long it was live.
    pub fn end(&self, call_id: &str) -> Option<chrono::Duration> {
        self.lock()
            .remove(call_id)
            .map(|started| Utc::now() - started)
    }

    pub fn is_active(&self, call_id: &str) -> bool {
        self.lock().contains_key(call_id)
    }

    pub fn active(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// POST /zoom_webhook_endpoint
pub async fn zoom_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let payload: Value = serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(error = %e, "Webhook body is not valid JSON");
        ApiError::BadRequest("Bad Request".to_string())
    })?;

    let event = payload.get("event").and_then(Value::as_str).unwrap_or("");

    if let Some(plain_token) = validation_token(&payload, event)? {
        tracing::info!("Webhook URL validation requested");
        let verification_token = state.config.zoom.verification_token.as_deref();
        return url_validation_response(verification_token, plain_token).map(Json);
    }

    auth::verify_secret_token(&headers, state.config.zoom.secret_token.as_deref())?;

    match event {
        PHONE_CALL_STARTED => match call_id(&payload) {
            Some(id) => {
                if state.calls.start(id) {
                    tracing::info!(
                        call_id = %id,
                        active = state.calls.active(),
                        "Phone call started; awaiting transcript feed"
                    );
                } else {
                    tracing::debug!(call_id = %id, "Duplicate phone_call.started");
                }
            }
            None => tracing::warn!("phone_call.started without a call id"),
        },
        PHONE_CALL_ENDED => match call_id(&payload) {
            Some(id) => match state.calls.end(id) {
                Some(duration) => tracing::info!(
                    call_id = %id,
                    duration_secs = duration.num_seconds(),
                    "Phone call ended; transcript feed can be torn down"
                ),
                None => tracing::debug!(call_id = %id, "phone_call.ended for unknown call"),
            },
            None => tracing::warn!("phone_call.ended without a call id"),
        },
        other => tracing::info!(event = %other, "Received Zoom event"),
    }

    Ok(Json(json!({ "status": "received" })))
}

/// The `plainToken` of a validation request, if this is one.
///
/// Both the `endpoint.url_validation` event shape and a bare top-level
/// `plainToken` are accepted.
fn validation_token<'a>(payload: &'a Value, event: &str) -> Result<Option<&'a str>, ApiError> {
    if event == URL_VALIDATION_EVENT {
        return payload
            .pointer("/payload/plainToken")
            .and_then(Value::as_str)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest("Invalid validation payload".to_string()));
    }
    Ok(payload.get("plainToken").and_then(Value::as_str))
}

fn url_validation_response(
    verification_token: Option<&str>,
    plain_token: &str,
) -> Result<Value, ApiError> {
    match verification_token {
        Some(secret) => Ok(json!({
            "plainToken": plain_token,
            "encryptedToken": auth::sign_plain_token(secret, plain_token)?,
        })),
        None => Ok(json!({
            "plainToken": plain_token,
            "status": "success",
        })),
    }
}

fn call_id(payload: &Value) -> Option<&str> {
    let object = payload.pointer("/payload/object")?;
    object
        .get("callId")
        .or_else(|| object.get("call_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_registry_lifecycle() {
        let calls = CallRegistry::new();
        assert!(calls.start("c-1"));
        assert!(!calls.start("c-1"));
        assert!(calls.is_active("c-1"));
        assert_eq!(calls.active(), 1);

        assert!(calls.end("c-1").is_some());
        assert!(calls.end("c-1").is_none());
        assert_eq!(calls.active(), 0);
    }

    #[test]
    fn test_validation_token_shapes() {
        let event_shape = json!({
            "event": "endpoint.url_validation",
            "payload": {"plainToken": "abc"}
        });
        assert_eq!(
            validation_token(&event_shape, URL_VALIDATION_EVENT).unwrap(),
            Some("abc")
        );

        let bare = json!({"plainToken": "xyz"});
        assert_eq!(validation_token(&bare, "").unwrap(), Some("xyz"));

        let missing = json!({"event": "endpoint.url_validation", "payload": {}});
        assert!(validation_token(&missing, URL_VALIDATION_EVENT).is_err());

        let ordinary = json!({"event": "phone_call.started"});
        assert_eq!(validation_token(&ordinary, PHONE_CALL_STARTED).unwrap(), None);
    }

    #[test]
    fn test_call_id_accepts_both_spellings() {
        let camel = json!({"payload": {"object": {"callId": "A"}}});
        let snake = json!({"payload": {"object": {"call_id": "B"}}});
        let blank = json!({"payload": {"object": {"callId": ""}}});
        assert_eq!(call_id(&camel), Some("A"));
        assert_eq!(call_id(&snake), Some("B"));
        assert_eq!(call_id(&blank), None);
        assert_eq!(call_id(&json!({})), None);
    }
}
