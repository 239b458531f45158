//! Objection relay core: phrase dictionary, detector/broadcaster, wire types,
//! configuration and errors.

pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod phrases;

pub use config::RelayConfig;
pub use detector::{
    ChannelObserver, DeliveryError, Detector, DetectorStats, Observer, ObserverId, Subscription,
};
pub use error::{RelayError, Result};
pub use events::{DetectionEvent, TranscriptFragment};
pub use phrases::{PhraseDictionary, PhraseEntry};
