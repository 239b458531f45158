//! Route handlers for health, detection viewing, and transcript ingestion.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use relay_core::events::DETECTION_EVENT_NAME;
use relay_core::{DetectionEvent, Detector};

use crate::state::AppState;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub dictionary_size: usize,
    pub observers: usize,
    pub fragments_processed: u64,
    pub detections: u64,
    pub observers_dropped: u64,
    pub active_calls: usize,
    pub authorized: bool,
}

/// Response for POST /transcripts.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptAck {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionEvent>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.detector.stats();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        dictionary_size: state.detector.dictionary().len(),
        observers: stats.observers,
        fragments_processed: stats.fragments_processed,
        detections: stats.detections,
        observers_dropped: stats.observers_dropped,
        active_calls: state.calls.active(),
        authorized: state.tokens.is_authorized(),
    })
}

/// GET /detection/current - the latest detection, or 204 before the first.
pub async fn current_detection(State(state): State<AppState>) -> Response {
    match state.detector.current() {
        Some(event) => Json(event).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /stream - SSE detection stream.
///
/// A new viewer first receives the current detection, if there is one.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let subscription = state
        .detector
        .subscribe(state.config.detector.observer_capacity);
    tracing::debug!(observer = %subscription.id(), "Viewer connected to detection stream");

    let stream = subscription.map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().event(DETECTION_EVENT_NAME).data(data))
    });

    let keepalive = Duration::from_secs(state.config.detector.keepalive_secs.max(1));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keepalive))
}

/// POST /transcripts - submit one transcript message.
///
/// JSON bodies are parsed as `{type?, text}`; `text/plain` bodies are the
/// fragment itself. Always 202: a bad fragment is simply not a match.
pub async fn ingest_transcript(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<TranscriptAck>) {
    let is_plain_text = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/plain"));

    let detection = match std::str::from_utf8(&body) {
        Ok(text) if is_plain_text => state.detector.submit(text),
        Ok(text) => state.detector.submit_raw(text),
        Err(_) => {
            tracing::debug!(len = body.len(), "Ignoring non-UTF-8 transcript body");
            None
        }
    };

    (
        StatusCode::ACCEPTED,
        Json(TranscriptAck {
            matched: detection.is_some(),
            detection,
        }),
    )
}

/// GET /rtms - WebSocket feed from the realtime media stream.
///
/// Each text frame is one transcript message. A match is echoed back on
/// the same socket as `{phrase, response}`.
pub async fn rtms(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let detector = state.detector.clone();
    ws.on_upgrade(move |socket| rtms_session(socket, detector))
}

async fn rtms_session(mut socket: WebSocket, detector: Detector) {
    tracing::info!("RTMS WebSocket connection established");

    while let Some(message) = socket.recv().await {
        let detection = match message {
            Ok(Message::Text(text)) => detector.submit_raw(text.as_str()),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => detector.submit_raw(text),
                Err(_) => {
                    tracing::debug!(len = bytes.len(), "Ignoring non-UTF-8 RTMS frame");
                    None
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "RTMS WebSocket error");
                break;
            }
        };

        if let Some(event) = detection {
            reply_detection(&mut socket, &event).await;
        }
    }

    tracing::info!("RTMS WebSocket connection closed");
}

async fn reply_detection(socket: &mut WebSocket, event: &DetectionEvent) {
    let data = match serde_json::to_string(event) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode detection for RTMS reply");
            return;
        }
    };
    if let Err(e) = socket.send(Message::Text(data.into())).await {
        tracing::warn!(error = %e, "Failed to send detection on RTMS socket");
    }
}
