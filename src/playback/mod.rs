//! Playback — gapless scheduling of synthesized speech.
//!
//! [`PlaybackScheduler`] lays decoded frames out on a virtual timeline over
//! an [`OutputSink`]; [`CpalSink`] is the production sink (one persistent
//! 24 kHz mixing stream).  Handles into the active-set are generation-tagged
//! ([`PlaybackHandle`]) so end notifications and interruption sweeps can
//! race safely.

pub mod cpal_sink;
pub mod scheduler;
pub mod sink;

pub use cpal_sink::{CpalSink, PlaybackError, SinkStreamGuard};
pub use scheduler::{PlaybackHandle, PlaybackScheduler};
pub use sink::OutputSink;
