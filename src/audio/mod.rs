//! Audio plumbing — capture, wire codec, rate conversion, analyzer taps.
//!
//! # Outbound path
//!
//! ```text
//! Microphone → cpal callback → downmix_to_mono → resample_linear (16 kHz)
//!           → AudioTap (input analyzer) → BlockAccumulator (4096)
//!           → encode_pcm16 → EncodedAudioChunk (mpsc) → SessionController
//! ```
//!
//! # Inbound path
//!
//! Inbound payloads are decoded by [`decode_pcm16`] into [`AudioFrame`]s
//! (24 kHz mono) and handed to the playback scheduler; the output-side
//! [`AudioTap`] is fed by the output sink as frames are rendered.

pub mod capture;
pub mod encode;
pub mod resample;
pub mod tap;

pub use capture::{BlockAccumulator, CaptureError, CapturePipeline, CAPTURE_BLOCK_SAMPLES};
pub use encode::{
    decode_pcm16, encode_pcm16, AudioFrame, DecodeError, EncodedAudioChunk, CAPTURE_SAMPLE_RATE,
    PLAYBACK_SAMPLE_RATE,
};
pub use resample::{downmix_to_mono, resample_linear};
pub use tap::AudioTap;
