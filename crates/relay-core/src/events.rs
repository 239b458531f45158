//! Wire types crossing the core boundary.
//!
//! `DetectionEvent` is what observers receive; its JSON shape is exactly
//! `{"phrase": ..., "response": ...}` and existing consumers depend on it.
//! `TranscriptFragment` is what the transcript source sends in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::phrases::PhraseEntry;

/// SSE event name used when a detection is pushed to viewers.
pub const DETECTION_EVENT_NAME: &str = "detection";

/// Message `type` the transcript source uses for transcription data.
pub const TRANSCRIPT_MESSAGE_TYPE: &str = "transcript";

/// The most recently detected objection and its scripted rebuttal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub phrase: String,
    pub response: String,
}

impl DetectionEvent {
    pub fn new(phrase: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            response: response.into(),
        }
    }
}

impl From<&PhraseEntry> for DetectionEvent {
    fn from(entry: &PhraseEntry) -> Self {
        Self {
            phrase: entry.phrase().to_string(),
            response: entry.response().to_string(),
        }
    }
}

/// One unit of incoming transcript text.
///
/// A missing or non-string `text` is carried as `None` and treated as an
/// empty fragment by the detector.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl TranscriptFragment {
    /// Parse a raw transcript-source message.
    ///
    /// Returns `None` when the payload is not a JSON object or when it is a
    /// non-transcript message (its `type` is present and not `"transcript"`).
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        Self::from_value(&value)
    }

    /// Interpret an already-decoded JSON value. See [`TranscriptFragment::parse`].
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let kind = match obj.get("type") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s == TRANSCRIPT_MESSAGE_TYPE => Some(s.clone()),
            Some(_) => return None,
        };
        let text = obj.get("text").and_then(Value::as_str).map(str::to_string);
        Some(Self { kind, text })
    }

    /// The fragment text, or `""` when absent.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}
