//! Objection detector and broadcaster.
//!
//! Turns each transcript fragment into zero or one [`DetectionEvent`]s and
//! fans them out to every attached observer. The detector keeps exactly one
//! "current" detection, which is replayed once to each newly attached
//! observer so late joiners see the latest state.
//!
//! A single mutex guards both the current slot and the observer registry.
//! `submit` and `attach` each run entirely under it, so:
//! - fragments are processed one at a time in lock-acquisition order;
//! - an attaching observer sees either the pre- or post-update detection,
//!   never both and never neither.
//!
//! Delivery never blocks: observers take events with a non-blocking send and
//! any failure (full buffer, closed receiver) detaches the observer.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::Stream;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::events::{DetectionEvent, TranscriptFragment};
use crate::phrases::PhraseDictionary;

/// Handle identifying an attached observer for its connection lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ObserverId(Uuid);

impl ObserverId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Why a delivery attempt failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryError {
    /// The observer's buffer is full; it is not keeping up.
    Full,
    /// The observer is gone.
    Closed,
}

/// A listener that receives pushed detections.
///
/// `deliver` is called with the detector lock held and must return promptly;
/// an `Err` detaches the observer.
pub trait Observer: Send + Sync {
    fn deliver(&self, event: &DetectionEvent) -> Result<(), DeliveryError>;
}

/// Observer backed by a bounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<DetectionEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<DetectionEvent>) -> Self {
        Self { tx }
    }
}

impl Observer for ChannelObserver {
    fn deliver(&self, event: &DetectionEvent) -> Result<(), DeliveryError> {
        self.tx.try_send(event.clone()).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Counters exposed for health reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DetectorStats {
    pub fragments_processed: u64,
    pub detections: u64,
    pub observers_dropped: u64,
    pub observers: usize,
}

#[derive(Default)]
struct Registry {
    current: Option<DetectionEvent>,
    observers: HashMap<ObserverId, Arc<dyn Observer>>,
}

struct Shared {
    dictionary: PhraseDictionary,
    registry: Mutex<Registry>,
    fragments_processed: AtomicU64,
    detections: AtomicU64,
    observers_dropped: AtomicU64,
}

/// The detection stream. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct Detector {
    shared: Arc<Shared>,
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("dictionary_size", &self.shared.dictionary.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Detector {
    pub fn new(dictionary: PhraseDictionary) -> Self {
        Self {
            shared: Arc::new(Shared {
                dictionary,
                registry: Mutex::new(Registry::default()),
                fragments_processed: AtomicU64::new(0),
                detections: AtomicU64::new(0),
                observers_dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn dictionary(&self) -> &PhraseDictionary {
        &self.shared.dictionary
    }

    /// Test one fragment and publish the match, if any.
    ///
    /// Never fails: an empty or unmatched fragment is a no-op. Returns the
    /// published event for callers that want to echo it.
    pub fn submit(&self, fragment: &str) -> Option<DetectionEvent> {
        self.shared.fragments_processed.fetch_add(1, Ordering::Relaxed);

        if fragment.trim().is_empty() {
            debug!("Ignoring empty transcript fragment");
            return None;
        }
        trace!(text = %fragment, "Transcript fragment received");

        let entry = self.shared.dictionary.lookup(fragment)?;
        let event = DetectionEvent::from(entry);

        let mut registry = self.registry();
        registry.current = Some(event.clone());
        self.shared.detections.fetch_add(1, Ordering::Relaxed);

        let failed: Vec<(ObserverId, DeliveryError)> = registry
            .observers
            .iter()
            .filter_map(|(id, observer)| observer.deliver(&event).err().map(|e| (*id, e)))
            .collect();
        for (id, reason) in failed {
            registry.observers.remove(&id);
            self.record_dropped(id, reason);
        }

        info!(
            phrase = %event.phrase,
            observers = registry.observers.len(),
            "Objection detected"
        );
        Some(event)
    }

    /// Submit a decoded transcript message. Absent text counts as empty.
    pub fn submit_fragment(&self, fragment: &TranscriptFragment) -> Option<DetectionEvent> {
        self.submit(fragment.text())
    }

    /// Submit a raw transcript-source message, ignoring anything that does
    /// not parse as a transcript.
    pub fn submit_raw(&self, raw: &str) -> Option<DetectionEvent> {
        match TranscriptFragment::parse(raw) {
            Some(fragment) => self.submit_fragment(&fragment),
            None => {
                debug!(len = raw.len(), "Ignoring non-transcript message");
                None
            }
        }
    }

    /// Register an observer, replaying the current detection to it first.
    ///
    /// An observer that fails the replay is never registered.
    pub fn attach(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId::new();
        let mut registry = self.registry();

        if let Some(current) = &registry.current {
            if let Err(reason) = observer.deliver(current) {
                self.record_dropped(id, reason);
                return id;
            }
        }

        registry.observers.insert(id, observer);
        debug!(observer = %id, observers = registry.observers.len(), "Observer attached");
        id
    }

    /// Remove an observer. Unknown or already-removed ids are a no-op.
    ///
    /// Returns whether the observer was attached.
    pub fn detach(&self, id: ObserverId) -> bool {
        let mut registry = self.registry();
        let removed = registry.observers.remove(&id).is_some();
        if removed {
            debug!(observer = %id, observers = registry.observers.len(), "Observer detached");
        }
        removed
    }

    /// Attach a channel observer buffering up to `capacity` events.
    pub fn subscribe(&self, capacity: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.attach(Arc::new(ChannelObserver::new(tx)));
        Subscription {
            id,
            rx,
            detector: self.clone(),
        }
    }

    /// The most recent detection, if any.
    pub fn current(&self) -> Option<DetectionEvent> {
        self.registry().current.clone()
    }

    pub fn observer_count(&self) -> usize {
        self.registry().observers.len()
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            fragments_processed: self.shared.fragments_processed.load(Ordering::Relaxed),
            detections: self.shared.detections.load(Ordering::Relaxed),
            observers_dropped: self.shared.observers_dropped.load(Ordering::Relaxed),
            observers: self.observer_count(),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.shared
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record_dropped(&self, id: ObserverId, reason: DeliveryError) {
        self.shared.observers_dropped.fetch_add(1, Ordering::Relaxed);
        debug!(observer = %id, ?reason, "Observer dropped after failed delivery");
    }
}

/// A channel-backed observer registration.
///
/// Yields detections as a [`Stream`]. Dropping it detaches the observer. The
/// stream ends if the detector drops the observer for falling behind.
pub struct Subscription {
    id: ObserverId,
    rx: mpsc::Receiver<DetectionEvent>,
    detector: Detector,
}

impl Subscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Wait for the next detection. `None` once the observer was dropped.
    pub async fn recv(&mut self) -> Option<DetectionEvent> {
        self.rx.recv().await
    }

    /// Take a buffered detection without waiting.
    pub fn try_recv(&mut self) -> Option<DetectionEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = DetectionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detector.detach(self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
