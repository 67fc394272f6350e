//! Audio taps — the analyzer attachment points.
//!
//! An [`AudioTap`] sits on an audio path (one on the capture side, one on
//! the playback side) and retains the most recent window of samples written
//! through it.  Audio callbacks push into the tap; an analyzer created via
//! `Analyzer::attach` reads the latest window once per tick.
//!
//! Taps are process-scoped: the engine creates both at startup and passes
//! them by reference, so there is no ambient global audio state.  A tap is a
//! cheap handle (`Arc` clone) and safe to share between the real-time audio
//! thread and the tick loop — writes and reads each take the lock for a
//! short, bounded copy.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// AudioTap
// ---------------------------------------------------------------------------

/// Shared most-recent-window sample sink.
///
/// When more samples arrive than the tap can hold, the oldest are
/// overwritten — only the newest `capacity` samples are ever retained.
///
/// ```
/// use live_voice::audio::AudioTap;
///
/// let tap = AudioTap::new(4);
/// tap.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
///
/// let mut window = [0.0_f32; 4];
/// tap.latest(&mut window);
/// assert_eq!(window, [2.0, 3.0, 4.0, 5.0]);
/// ```
#[derive(Clone)]
pub struct AudioTap {
    inner: Arc<Mutex<TapWindow>>,
}

struct TapWindow {
    buf: Vec<f32>,
    capacity: usize,
    /// Next write position (wraps around `capacity`).
    write_pos: usize,
    /// Valid samples stored so far (≤ `capacity`).
    len: usize,
}

impl AudioTap {
    /// Create a tap retaining the newest `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "AudioTap capacity must be > 0");
        Self {
            inner: Arc::new(Mutex::new(TapWindow {
                buf: vec![0.0; capacity],
                capacity,
                write_pos: 0,
                len: 0,
            })),
        }
    }

    /// Write `samples` into the tap, overwriting the oldest on overflow.
    pub fn push(&self, samples: &[f32]) {
        let mut w = self.inner.lock().unwrap();
        for &s in samples {
            let pos = w.write_pos;
            w.buf[pos] = s;
            w.write_pos = (pos + 1) % w.capacity;
            if w.len < w.capacity {
                w.len += 1;
            }
        }
    }

    /// Copy the newest `out.len()` samples into `out`, oldest first.
    ///
    /// When fewer samples have been written than requested, the front of
    /// `out` is zero-filled so the window always reads as leading silence
    /// followed by real audio.
    pub fn latest(&self, out: &mut [f32]) {
        let w = self.inner.lock().unwrap();
        let n = out.len();
        let available = w.len.min(n);
        let pad = n - available;

        for slot in out[..pad].iter_mut() {
            *slot = 0.0;
        }

        // Oldest of the requested window sits `available` samples behind the
        // write position.
        let start = (w.write_pos + w.capacity - available) % w.capacity;
        for (i, slot) in out[pad..].iter_mut().enumerate() {
            *slot = w.buf[(start + i) % w.capacity];
        }
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len
    }

    /// Returns `true` when nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_on_empty_tap_is_silence() {
        let tap = AudioTap::new(8);
        let mut out = [1.0_f32; 4];
        tap.latest(&mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn latest_zero_pads_partial_window() {
        let tap = AudioTap::new(8);
        tap.push(&[0.5, 0.6]);

        let mut out = [9.0_f32; 4];
        tap.latest(&mut out);
        assert_eq!(out, [0.0, 0.0, 0.5, 0.6]);
    }

    #[test]
    fn latest_returns_newest_window_after_overflow() {
        let tap = AudioTap::new(4);
        tap.push(&[1.0, 2.0, 3.0, 4.0]);
        tap.push(&[5.0, 6.0]);

        let mut out = [0.0_f32; 4];
        tap.latest(&mut out);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn window_smaller_than_capacity() {
        let tap = AudioTap::new(8);
        tap.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let mut out = [0.0_f32; 2];
        tap.latest(&mut out);
        assert_eq!(out, [4.0, 5.0]);
    }

    #[test]
    fn clones_share_the_same_window() {
        let tap = AudioTap::new(4);
        let writer = tap.clone();
        writer.push(&[0.1, 0.2]);

        assert_eq!(tap.len(), 2);
        let mut out = [0.0_f32; 2];
        tap.latest(&mut out);
        assert!((out[0] - 0.1).abs() < 1e-6);
        assert!((out[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn push_more_than_capacity_in_one_call() {
        let tap = AudioTap::new(3);
        tap.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);

        let mut out = [0.0_f32; 3];
        tap.latest(&mut out);
        assert_eq!(out, [5.0, 6.0, 7.0]);
    }

    #[test]
    fn tap_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AudioTap>();
    }

    #[test]
    #[should_panic(expected = "AudioTap capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = AudioTap::new(0);
    }
}
