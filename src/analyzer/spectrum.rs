//! Per-direction magnitude-spectrum analyzer.
//!
//! One [`Analyzer`] watches each audio direction (input = microphone,
//! output = synthesized speech).  It is created by the explicit
//! [`Analyzer::attach`] factory on an [`AudioTap`] — attaching never happens
//! as a side effect of anything else.
//!
//! [`Analyzer::update`] runs once per display tick: it pulls the newest
//! 64-sample window from the tap, applies a Blackman window and a 64-point
//! FFT, time-smooths the linear magnitudes (factor 0.8 toward the previous
//! value), and maps them to 8-bit bytes on a dB scale (−100 dB → 0,
//! −30 dB → 255).  Smoothing makes the analyzer self-decaying: on silence
//! the bins fall by ×0.8 per tick toward zero.
//!
//! The analyzer observes whatever is currently audible or captured — it is
//! fully independent of session state.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::audio::AudioTap;

/// FFT window length in samples.
pub const FFT_SIZE: usize = 64;

/// Number of magnitude bins exposed per direction (`FFT_SIZE / 2 + 1`).
pub const BIN_COUNT: usize = FFT_SIZE / 2 + 1;

/// Per-tick smoothing factor applied to linear magnitudes.
const SMOOTHING: f32 = 0.8;

/// Magnitude mapped to byte 0.
const MIN_DB: f32 = -100.0;

/// Magnitude mapped to byte 255.
const MAX_DB: f32 = -30.0;

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Magnitude-spectrum analyzer over one [`AudioTap`].
///
/// # Example
///
/// ```
/// use live_voice::analyzer::{Analyzer, BIN_COUNT};
/// use live_voice::audio::AudioTap;
///
/// let tap = AudioTap::new(4096);
/// let mut analyzer = Analyzer::attach(&tap);
///
/// analyzer.update();
/// assert_eq!(analyzer.data().len(), BIN_COUNT);
/// // Silence: every bin reads zero.
/// assert!(analyzer.data().iter().all(|&b| b == 0));
/// ```
pub struct Analyzer {
    tap: AudioTap,
    fft: Arc<dyn Fft<f32>>,
    window: [f32; FFT_SIZE],
    scratch: Vec<Complex<f32>>,
    /// Time-smoothed linear magnitudes.
    smoothed: [f32; BIN_COUNT],
    /// Byte view of `smoothed`, refreshed by [`update`](Self::update).
    data: [u8; BIN_COUNT],
}

impl Analyzer {
    /// Attach a new analyzer to `tap`.
    pub fn attach(tap: &AudioTap) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        // Blackman window, matching the windowing the display stack expects.
        let mut window = [0.0_f32; FFT_SIZE];
        for (i, w) in window.iter_mut().enumerate() {
            let x = i as f32 / (FFT_SIZE - 1) as f32;
            *w = 0.42 - 0.5 * (std::f32::consts::TAU * x).cos()
                + 0.08 * (2.0 * std::f32::consts::TAU * x).cos();
        }

        Self {
            tap: tap.clone(),
            fft,
            window,
            scratch: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            smoothed: [0.0; BIN_COUNT],
            data: [0; BIN_COUNT],
        }
    }

    /// Pull the current window from the tap and refresh the byte spectrum.
    pub fn update(&mut self) {
        let mut samples = [0.0_f32; FFT_SIZE];
        self.tap.latest(&mut samples);

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            *slot = Complex::new(samples[i] * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        for (i, s) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[i].norm() / FFT_SIZE as f32;
            *s = SMOOTHING * *s + (1.0 - SMOOTHING) * magnitude;
            self.data[i] = byte_magnitude(*s);
        }
    }

    /// Latest 8-bit magnitude bins, index 0 = DC.
    pub fn data(&self) -> &[u8; BIN_COUNT] {
        &self.data
    }
}

/// Map a linear magnitude onto the dB byte scale.
fn byte_magnitude(linear: f32) -> u8 {
    if linear <= 0.0 {
        return 0;
    }
    let db = 20.0 * linear.log10();
    let scaled = 255.0 * (db - MIN_DB) / (MAX_DB - MIN_DB);
    scaled.clamp(0.0, 255.0) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
