//! Sample-rate and channel conversion for the capture path.
//!
//! Real input devices rarely offer native 16 kHz mono, so every cpal buffer
//! passes through two steps before it is blocked and encoded:
//!
//! 1. [`downmix_to_mono`] — average interleaved channels into one.
//! 2. [`resample_linear`] — linear-interpolation rate conversion to the
//!    capture rate (16 kHz).
//!
//! Linear interpolation is adequate for speech headed to a conversational
//! model; it keeps the capture callback allocation-light and dependency-free.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Average interleaved multi-channel audio down to a single channel.
///
/// Output length is `samples.len() / channels`.  Mono input is returned
/// unchanged (owned); `channels == 0` yields an empty vector.
///
/// ```
/// use live_voice::audio::downmix_to_mono;
///
/// let stereo = [1.0_f32, 0.0, -0.5, 0.5]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono, vec![0.5, 0.0]);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample mono audio from `source_rate` to `target_rate` Hz by linear
/// interpolation.
///
/// Equal rates and empty input are no-op fast paths.  Output length is
/// approximately `samples.len() * target_rate / source_rate`.
///
/// ```
/// use live_voice::audio::resample_linear;
///
/// // 480 samples @ 48 kHz (10 ms) → 160 samples @ 16 kHz
/// let out = resample_linear(&vec![0.25_f32; 480], 48_000, 16_000);
/// assert_eq!(out.len(), 160);
/// ```
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }
    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return Vec::new();
    }

    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
