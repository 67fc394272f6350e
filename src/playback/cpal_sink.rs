//! cpal-backed output sink — a persistent 24 kHz mixing stream.
//!
//! [`CpalSink`] implements [`OutputSink`] on top of one long-lived cpal
//! output stream.  Scheduled frames become mixer voices pinned to absolute
//! sample positions; the callback sums every voice due at the current
//! render position, duplicates the mono mix across hardware channels, and
//! feeds it to the output [`AudioTap`] so the output analyzer sees exactly
//! what is audible.
//!
//! The output clock is the number of frames rendered since stream start,
//! divided by the sink rate — monotonic by construction.
//!
//! `CpalSink::new` returns the sink (Send, lives inside the engine task)
//! and a [`SinkStreamGuard`] (not Send — `cpal::Stream` is thread-bound)
//! that the caller keeps alive for the duration of playback, mirroring the
//! capture-side RAII guard.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::{downmix_to_mono, resample_linear, AudioFrame, AudioTap, PLAYBACK_SAMPLE_RATE};

use super::scheduler::PlaybackHandle;
use super::sink::OutputSink;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening the output device.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query output configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("no output config supports {PLAYBACK_SAMPLE_RATE} Hz")]
    NoMatchingConfig,

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// Mixer state
// ---------------------------------------------------------------------------

/// One scheduled buffer inside the mixer.
struct MixerVoice {
    tag: PlaybackHandle,
    samples: Vec<f32>,
    /// Absolute frame position at which sample 0 plays.
    start_frame: u64,
    cursor: usize,
}

#[derive(Default)]
struct MixerState {
    voices: Vec<MixerVoice>,
    /// Frames rendered since stream start.
    rendered: u64,
}

// ---------------------------------------------------------------------------
// CpalSink
// ---------------------------------------------------------------------------

/// RAII guard keeping the cpal output stream alive.
///
/// Not `Send`; stays on the thread that created the sink.
pub struct SinkStreamGuard {
    _stream: cpal::Stream,
}

/// `OutputSink` implementation over a shared mixer and a cpal stream.
pub struct CpalSink {
    state: Arc<Mutex<MixerState>>,
    ended_tx: mpsc::UnboundedSender<PlaybackHandle>,
}

impl CpalSink {
    /// Open the default output device at the playback rate.
    ///
    /// `output_tap` receives the rendered mono mix; `ended_tx` carries
    /// natural-end tags back to the engine.
    ///
    /// # Errors
    ///
    /// Any [`PlaybackError`] when no device or no 24 kHz-capable
    /// configuration is available.
    pub fn new(
        output_tap: AudioTap,
        ended_tx: mpsc::UnboundedSender<PlaybackHandle>,
    ) -> Result<(Self, SinkStreamGuard), PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(PlaybackError::NoDevice)?;

        // Prefer mono at 24 kHz, fall back to stereo.
        let supported = device
            .supported_output_configs()?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or(PlaybackError::NoMatchingConfig)?;

        let config = supported
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();
        let channels = config.channels as usize;

        let state = Arc::new(Mutex::new(MixerState::default()));
        let callback_state = Arc::clone(&state);
        let callback_ended = ended_tx.clone();

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut mixer = callback_state.lock().unwrap();
                let mut mono = Vec::with_capacity(data.len() / channels);

                for frame in data.chunks_mut(channels) {
                    let t = mixer.rendered;
                    let mut mix = 0.0_f32;
                    for voice in mixer.voices.iter_mut() {
                        if t >= voice.start_frame && voice.cursor < voice.samples.len() {
                            mix += voice.samples[voice.cursor];
                            voice.cursor += 1;
                        }
                    }
                    let mix = mix.clamp(-1.0, 1.0);
                    for out in frame.iter_mut() {
                        *out = mix;
                    }
                    mono.push(mix);
                    mixer.rendered += 1;
                }

                // Notify and retire voices that played to completion.
                mixer.voices.retain(|voice| {
                    if voice.cursor >= voice.samples.len() {
                        let _ = callback_ended.send(voice.tag);
                        false
                    } else {
                        true
                    }
                });
                drop(mixer);

                output_tap.push(&mono);
            },
            |err: cpal::StreamError| {
                log::error!("playback: cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        log::info!("playback: sink open ({PLAYBACK_SAMPLE_RATE} Hz, {channels} ch)");

        Ok((
            Self { state, ended_tx },
            SinkStreamGuard { _stream: stream },
        ))
    }
}

impl OutputSink for CpalSink {
    fn current_time(&self) -> f64 {
        let rendered = self.state.lock().unwrap().rendered;
        rendered as f64 / f64::from(PLAYBACK_SAMPLE_RATE)
    }

    fn start(&mut self, frame: &AudioFrame, at: f64, tag: PlaybackHandle) {
        // Normalize whatever arrives to the sink's mono rate.
        let mono = downmix_to_mono(&frame.samples, frame.channels);
        let samples = resample_linear(&mono, frame.sample_rate, PLAYBACK_SAMPLE_RATE);
        if samples.is_empty() {
            // Nothing audible; report immediate completion so the handle is
            // not stranded in the active-set.
            let _ = self.ended_tx.send(tag);
            return;
        }

        let start_frame = (at * f64::from(PLAYBACK_SAMPLE_RATE)).round() as u64;
        let mut mixer = self.state.lock().unwrap();
        // A start time already in the past begins mid-buffer rather than
        // replaying stale audio late.
        let cursor = mixer.rendered.saturating_sub(start_frame).min(samples.len() as u64) as usize;

        mixer.voices.push(MixerVoice {
            tag,
            samples,
            start_frame,
            cursor,
        });
    }

    fn stop(&mut self, tag: PlaybackHandle) {
        // Removal without an end notification; the scheduler's interrupt
        // sweep already retired the handle.
        self.state.lock().unwrap().voices.retain(|v| v.tag != tag);
    }
}
