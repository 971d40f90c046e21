//! Playback core for the traffic detection dashboard.
//!
//! A canned dataset of timestamped detections is replayed per channel so the
//! dashboard behaves as if detections were arriving live. Records are
//! revealed exactly once at their activation instant, and every run owns its
//! timers so tearing a view down can never leak a late delivery.

pub mod dataset;
pub mod detection;
pub mod playback;
pub mod prelude;
pub mod reveal;
pub mod telemetry;

pub use dataset::EventDataset;
pub use detection::{Channel, DetectionRecord, RawDetection};
pub use playback::{PlaybackHandle, PlaybackScheduler};
pub use prelude::{DetectionObserver, SharedRecord};
pub use reveal::{PlaybackSession, RevealedState, StateFold};
