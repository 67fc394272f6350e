//! Wire codec — `f32` sample buffers ⇄ PCM16 little-endian payloads.
//!
//! The remote service speaks 16-bit signed little-endian PCM in both
//! directions: 16 kHz mono outbound (microphone), 24 kHz mono inbound
//! (synthesized speech).  [`encode_pcm16`] produces an [`EncodedAudioChunk`]
//! ready to hand to the session; [`decode_pcm16`] turns an inbound payload
//! back into an [`AudioFrame`] for the playback scheduler.
//!
//! An empty payload decodes to a zero-duration frame, which the scheduler
//! treats as a no-op.  A payload whose length is not a multiple of two bytes
//! is rejected with [`DecodeError::Misaligned`].

use thiserror::Error;

/// Capture sample rate in Hz (microphone → service).
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Playback sample rate in Hz (service → speakers).
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// A decoded buffer of audio ready for scheduling.
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this frame in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono).
    pub channels: u16,
}

impl AudioFrame {
    /// Duration of the frame in seconds.
    ///
    /// Returns `0.0` when the frame is empty or carries a degenerate format
    /// (zero rate / zero channels), so such frames fall through the
    /// scheduler's zero-duration no-op path.
    ///
    /// ```
    /// use live_voice::audio::AudioFrame;
    ///
    /// let frame = AudioFrame {
    ///     samples: vec![0.0; 24_000],
    ///     sample_rate: 24_000,
    ///     channels: 1,
    /// };
    /// assert!((frame.duration_secs() - 1.0).abs() < 1e-9);
    /// ```
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels as usize;
        frames as f64 / f64::from(self.sample_rate)
    }

    /// Returns `true` when the frame holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EncodedAudioChunk
// ---------------------------------------------------------------------------

/// A wire-ready PCM16-LE payload plus its format descriptor.
#[derive(Debug, Clone)]
pub struct EncodedAudioChunk {
    /// Little-endian 16-bit signed PCM bytes, two bytes per sample.
    pub payload: Vec<u8>,
    /// Sample rate of the encoded audio in Hz.
    pub sample_rate: u32,
}

impl EncodedAudioChunk {
    /// Number of samples encoded in the payload.
    pub fn sample_count(&self) -> usize {
        self.payload.len() / 2
    }
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Errors raised while decoding an inbound payload.
///
/// Decode failures are best-effort: the affected chunk is dropped and the
/// scheduler is left untouched.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// Payload length is not a whole number of 16-bit samples.
    #[error("PCM16 payload of {0} bytes is not sample-aligned")]
    Misaligned(usize),
}

// ---------------------------------------------------------------------------
// encode_pcm16
// ---------------------------------------------------------------------------

/// Encode mono `f32` samples as a PCM16-LE chunk.
///
/// Samples are clamped to `[-1.0, 1.0]` before quantization so an
/// out-of-range capture buffer can never wrap around.
///
/// ```
/// use live_voice::audio::{encode_pcm16, CAPTURE_SAMPLE_RATE};
///
/// let chunk = encode_pcm16(&[0.0, 1.0, -1.0], CAPTURE_SAMPLE_RATE);
/// assert_eq!(chunk.payload.len(), 6);
/// assert_eq!(chunk.sample_count(), 3);
/// ```
pub fn encode_pcm16(samples: &[f32], sample_rate: u32) -> EncodedAudioChunk {
    let mut payload = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        let quantized = (clamped * 32_767.0) as i16;
        payload.extend_from_slice(&quantized.to_le_bytes());
    }
    EncodedAudioChunk {
        payload,
        sample_rate,
    }
}

// ---------------------------------------------------------------------------
// decode_pcm16
// ---------------------------------------------------------------------------

/// Decode a PCM16-LE payload into a mono [`AudioFrame`].
///
/// An empty payload yields an empty frame (duration `0.0`).
///
/// # Errors
///
/// Returns [`DecodeError::Misaligned`] when `payload.len()` is odd.
pub fn decode_pcm16(payload: &[u8], sample_rate: u32) -> Result<AudioFrame, DecodeError> {
    if payload.len() % 2 != 0 {
        return Err(DecodeError::Misaligned(payload.len()));
    }

    let samples: Vec<f32> = payload
        .chunks_exact(2)
        .map(|pair| {
            let v = i16::from_le_bytes([pair[0], pair[1]]);
            f32::from(v) / 32_768.0
        })
        .collect();

    Ok(AudioFrame {
        samples,
        sample_rate,
        channels: 1,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- encode ------------------------------------------------------------

    #[test]
    fn encode_produces_two_bytes_per_sample() {
        let chunk = encode_pcm16(&[0.1, 0.2, 0.3, 0.4], CAPTURE_SAMPLE_RATE);
        assert_eq!(chunk.payload.len(), 8);
        assert_eq!(chunk.sample_rate, 16_000);
    }

    #[test]
    fn encode_zero_is_zero_bytes() {
        let chunk = encode_pcm16(&[0.0], CAPTURE_SAMPLE_RATE);
        assert_eq!(chunk.payload, vec![0, 0]);
    }

    #[test]
    fn encode_clamps_out_of_range_samples() {
        let chunk = encode_pcm16(&[2.0, -2.0], CAPTURE_SAMPLE_RATE);
        let hi = i16::from_le_bytes([chunk.payload[0], chunk.payload[1]]);
        let lo = i16::from_le_bytes([chunk.payload[2], chunk.payload[3]]);
        assert_eq!(hi, 32_767);
        assert_eq!(lo, -32_767);
    }

    #[test]
    fn encode_full_scale_positive() {
        let chunk = encode_pcm16(&[1.0], CAPTURE_SAMPLE_RATE);
        let v = i16::from_le_bytes([chunk.payload[0], chunk.payload[1]]);
        assert_eq!(v, 32_767);
    }

    // ---- decode ------------------------------------------------------------

    #[test]
    fn decode_empty_payload_is_zero_duration() {
        let frame = decode_pcm16(&[], PLAYBACK_SAMPLE_RATE).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.duration_secs(), 0.0);
    }

    #[test]
    fn decode_rejects_odd_length() {
        let err = decode_pcm16(&[0x01, 0x02, 0x03], PLAYBACK_SAMPLE_RATE).unwrap_err();
        assert!(matches!(err, DecodeError::Misaligned(3)));
    }

    #[test]
    fn decode_known_values() {
        // 0x7FFF = 32767 → ~1.0, 0x8000 = -32768 → -1.0
        let payload = [0xFF, 0x7F, 0x00, 0x80, 0x00, 0x00];
        let frame = decode_pcm16(&payload, PLAYBACK_SAMPLE_RATE).unwrap();
        assert_eq!(frame.samples.len(), 3);
        assert!((frame.samples[0] - 32_767.0 / 32_768.0).abs() < 1e-6);
        assert!((frame.samples[1] + 1.0).abs() < 1e-6);
        assert_eq!(frame.samples[2], 0.0);
    }

    #[test]
    fn round_trip_preserves_amplitude() {
        let original: Vec<f32> = (0..480)
            .map(|i| (i as f32 * 0.05).sin() * 0.8)
            .collect();
        let chunk = encode_pcm16(&original, CAPTURE_SAMPLE_RATE);
        let frame = decode_pcm16(&chunk.payload, CAPTURE_SAMPLE_RATE).unwrap();
        for (a, b) in original.iter().zip(frame.samples.iter()) {
            // 16-bit quantization error bound
            assert!((a - b).abs() < 1.0 / 32_000.0, "sample drift: {a} vs {b}");
        }
    }

    // ---- duration ----------------------------------------------------------

    #[test]
    fn duration_of_one_second_frame() {
        let frame = AudioFrame {
            samples: vec![0.0; 24_000],
            sample_rate: 24_000,
            channels: 1,
        };
        assert!((frame.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duration_accounts_for_channels() {
        let frame = AudioFrame {
            samples: vec![0.0; 48_000],
            sample_rate: 24_000,
            channels: 2,
        };
        assert!((frame.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_format_has_zero_duration() {
        let frame = AudioFrame {
            samples: vec![0.0; 100],
            sample_rate: 0,
            channels: 1,
        };
        assert_eq!(frame.duration_secs(), 0.0);
    }
}
