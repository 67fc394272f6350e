//! Microphone capture via `cpal`.
//!
//! [`CapturePipeline`] owns the cpal host/device/stream lifecycle for the
//! outbound half of the conversation.  While the recording flag is set,
//! every hardware buffer is downmixed to mono, resampled to 16 kHz, fed to
//! the input [`AudioTap`], accumulated into fixed 4096-sample blocks, and
//! each full block is PCM16-encoded and forwarded over an unbounded channel
//! toward the session controller.  Emission is fire-and-forget: the audio
//! thread never blocks on the transport, and send errors are ignored so the
//! callback can never panic.
//!
//! [`CapturePipeline::start`] is idempotent; a second call while a stream is
//! live is a no-op.  Acquisition failure is reported through the returned
//! `Result` and leaves the recording flag untouched.
//! [`CapturePipeline::stop`] synchronously drops the stream guard, which
//! releases the device handle — no leaked input resource.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc;

use super::encode::{encode_pcm16, EncodedAudioChunk, CAPTURE_SAMPLE_RATE};
use super::resample::{downmix_to_mono, resample_linear};
use super::tap::AudioTap;

/// Samples per outbound block (256 ms at 16 kHz).
pub const CAPTURE_BLOCK_SAMPLES: usize = 4096;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring or starting the microphone stream.
///
/// All of these are user-visible: the caller surfaces them as status text
/// and the recording flag is rolled back (never set) on failure.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// BlockAccumulator
// ---------------------------------------------------------------------------

/// Splits an irregular sample flow into fixed-size blocks.
///
/// cpal delivers whatever buffer size the platform favors; the wire format
/// wants exact [`CAPTURE_BLOCK_SAMPLES`]-sample blocks.  Residual samples
/// stay pending until the next push.
pub struct BlockAccumulator {
    block_size: usize,
    pending: Vec<f32>,
}

impl BlockAccumulator {
    /// Create an accumulator emitting blocks of `block_size` samples.
    ///
    /// # Panics
    ///
    /// Panics if `block_size == 0`.
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "BlockAccumulator block size must be > 0");
        Self {
            block_size,
            pending: Vec::with_capacity(block_size),
        }
    }

    /// Append `samples` and return every block completed by them.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(samples);

        let mut blocks = Vec::new();
        while self.pending.len() >= self.block_size {
            let rest = self.pending.split_off(self.block_size);
            blocks.push(std::mem::replace(&mut self.pending, rest));
        }
        blocks
    }

    /// Samples currently waiting for a full block.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// CapturePipeline
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal input stream alive.
struct StreamGuard {
    _stream: cpal::Stream,
}

/// Microphone capture pipeline: device → 16 kHz mono blocks → PCM16 chunks.
///
/// # Example
///
/// ```rust,no_run
/// use live_voice::audio::{AudioTap, CapturePipeline};
///
/// let (chunk_tx, _chunk_rx) = tokio::sync::mpsc::unbounded_channel();
/// let tap = AudioTap::new(4096);
/// let mut capture = CapturePipeline::new(tap, chunk_tx);
///
/// capture.start().expect("microphone unavailable");
/// assert!(capture.is_recording());
/// capture.stop();
/// ```
pub struct CapturePipeline {
    recording: Arc<AtomicBool>,
    stream: Option<StreamGuard>,
    tap: AudioTap,
    chunk_tx: mpsc::UnboundedSender<EncodedAudioChunk>,
}

impl CapturePipeline {
    /// Create an idle capture pipeline.
    ///
    /// `tap` is the input-side analyzer attachment point; `chunk_tx` carries
    /// encoded blocks toward the session controller.
    pub fn new(tap: AudioTap, chunk_tx: mpsc::UnboundedSender<EncodedAudioChunk>) -> Self {
        Self {
            recording: Arc::new(AtomicBool::new(false)),
            stream: None,
            tap,
            chunk_tx,
        }
    }

    /// Acquire the default input device and begin streaming blocks.
    ///
    /// Idempotent: when a stream is already live this returns `Ok(())`
    /// without touching the device, so repeated start calls yield exactly
    /// one active capture stream.
    ///
    /// # Errors
    ///
    /// Any [`CaptureError`]; on failure the recording flag stays unset.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            log::debug!("capture: start() while already recording — no-op");
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let native_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let recording = Arc::clone(&self.recording);
        let tap = self.tap.clone();
        let chunk_tx = self.chunk_tx.clone();
        let mut blocks = BlockAccumulator::new(CAPTURE_BLOCK_SAMPLES);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !recording.load(Ordering::Relaxed) {
                    return;
                }

                let mono = downmix_to_mono(data, channels);
                let resampled = resample_linear(&mono, native_rate, CAPTURE_SAMPLE_RATE);

                tap.push(&resampled);
                for block in blocks.push(&resampled) {
                    // Fire-and-forget; the receiver may be gone during teardown.
                    let _ = chunk_tx.send(encode_pcm16(&block, CAPTURE_SAMPLE_RATE));
                }
            },
            |err: cpal::StreamError| {
                log::error!("capture: cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;

        self.stream = Some(StreamGuard { _stream: stream });
        self.recording.store(true, Ordering::Relaxed);
        log::info!("capture: started ({native_rate} Hz, {channels} ch → 16 kHz mono)");
        Ok(())
    }

    /// Stop capturing and release the device handle.
    ///
    /// Synchronous and infallible; calling it while not capturing is a no-op.
    pub fn stop(&mut self) {
        self.recording.store(false, Ordering::Relaxed);
        if self.stream.take().is_some() {
            log::info!("capture: stopped");
        }
    }

    /// Returns `true` while blocks are being emitted.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // Device-dependent paths (start/stop against real hardware) are not unit
    // tested; the blocking logic is.

    #[test]
    fn accumulator_emits_nothing_below_block_size() {
        let mut acc = BlockAccumulator::new(4096);
        let blocks = acc.push(&[0.0; 4095]);
        assert!(blocks.is_empty());
        assert_eq!(acc.pending_len(), 4095);
    }

    #[test]
    fn accumulator_emits_exact_block() {
        let mut acc = BlockAccumulator::new(4);
        let blocks = acc.push(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(acc.pending_len(), 0);
    }

    #[test]
    fn accumulator_keeps_remainder() {
        let mut acc = BlockAccumulator::new(4);
        let blocks = acc.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(acc.pending_len(), 2);

        // Remainder carries into the next block in order.
        let blocks = acc.push(&[7.0, 8.0]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn accumulator_emits_multiple_blocks_at_once() {
        let mut acc = BlockAccumulator::new(2);
        let blocks = acc.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], vec![1.0, 2.0]);
        assert_eq!(blocks[1], vec![3.0, 4.0]);
        assert_eq!(acc.pending_len(), 1);
    }

    #[test]
    #[should_panic(expected = "BlockAccumulator block size must be > 0")]
    fn zero_block_size_panics() {
        let _ = BlockAccumulator::new(0);
    }

    #[test]
    fn stop_when_idle_is_noop() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut capture = CapturePipeline::new(AudioTap::new(16), tx);
        assert!(!capture.is_recording());
        capture.stop();
        assert!(!capture.is_recording());
    }
}
