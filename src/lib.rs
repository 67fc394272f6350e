//! # live-voice
//!
//! Client core for real-time, full-duplex voice conversation with a remote
//! conversational AI service: microphone capture streams out continuously
//! while synthesized speech streams back in and plays gaplessly, and both
//! directions are analyzed into low/mid/high band parameters for an
//! external renderer.
//!
//! ## Architecture
//!
//! ```text
//!  mic ──▶ CapturePipeline ──chunks──▶ SessionController ──▶ Transport ──▶ service
//!              │ tap                                            │
//!              ▼                                          TransportEvent
//!          Analyzer (input)                                     │
//!                                                               ▼
//!  speaker ◀── CpalSink ◀── PlaybackScheduler ◀── ReorderBuffer ◀── decode
//!              │ tap
//!              ▼
//!          Analyzer (output) ──▶ BandFrame (watch) ──▶ renderer
//! ```
//!
//! Everything between the two device callbacks runs on one
//! [`engine::ConversationEngine`] task.
//!
//! ## Modules
//!
//! * [`audio`] — capture pipeline, PCM16 wire codec, rate conversion, taps.
//! * [`session`] — connection lifecycle over a pluggable [`session::Transport`].
//! * [`playback`] — gapless scheduling onto an output sink.
//! * [`analyzer`] — FFT magnitude spectra and band parameters.
//! * [`engine`] — the orchestrating task and its control surface.
//! * [`config`] — settings, voices, TOML persistence.

pub mod analyzer;
pub mod audio;
pub mod config;
pub mod engine;
pub mod playback;
pub mod session;
