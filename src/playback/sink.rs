//! Output sink seam — the platform audio layer behind the scheduler.
//!
//! [`OutputSink`] is the narrow surface the playback scheduler needs from
//! the platform: a monotonic output clock, `start(frame, at, tag)` buffer
//! scheduling, and forced `stop(tag)`.  Natural-end notifications travel
//! out-of-band: the sink is constructed with an mpsc sender of
//! [`PlaybackHandle`] tags, and the engine feeds them back into the
//! scheduler.
//!
//! Production uses [`super::cpal_sink::CpalSink`]; tests use the manually
//! clocked [`VirtualSink`] below.

use crate::audio::AudioFrame;

use super::scheduler::PlaybackHandle;

// ---------------------------------------------------------------------------
// OutputSink
// ---------------------------------------------------------------------------

/// Buffer-scheduling primitives of the platform audio layer.
///
/// Implementations must be `Send`: the scheduler lives inside the engine
/// task.  `start` must honor `at` on the sink's own clock; `stop` on an
/// unknown or finished tag must be a harmless no-op.
pub trait OutputSink: Send {
    /// Monotonic output clock in seconds.
    fn current_time(&self) -> f64;

    /// Schedule `frame` to begin playing at `at` seconds, tagged so end
    /// notifications and stops can refer back to it.
    fn start(&mut self, frame: &AudioFrame, at: f64, tag: PlaybackHandle);

    /// Force-stop the buffer tagged `tag`, making it inaudible immediately.
    fn stop(&mut self, tag: PlaybackHandle);
}

// ---------------------------------------------------------------------------
// VirtualSink (test double)
// ---------------------------------------------------------------------------

/// Manually clocked sink recording every call, for scheduler tests.
#[cfg(test)]
pub struct VirtualSink {
    pub state: std::sync::Arc<std::sync::Mutex<VirtualSinkState>>,
}

#[cfg(test)]
#[derive(Default)]
pub struct VirtualSinkState {
    pub clock: f64,
    /// `(tag, start_time, duration)` for every scheduled buffer.
    pub started: Vec<(PlaybackHandle, f64, f64)>,
    pub stopped: Vec<PlaybackHandle>,
}

#[cfg(test)]
impl VirtualSink {
    pub fn new() -> (Self, std::sync::Arc<std::sync::Mutex<VirtualSinkState>>) {
        let state = std::sync::Arc::new(std::sync::Mutex::new(VirtualSinkState::default()));
        (
            Self {
                state: std::sync::Arc::clone(&state),
            },
            state,
        )
    }
}

#[cfg(test)]
impl OutputSink for VirtualSink {
    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().clock
    }

    fn start(&mut self, frame: &AudioFrame, at: f64, tag: PlaybackHandle) {
        self.state
            .lock()
            .unwrap()
            .started
            .push((tag, at, frame.duration_secs()));
    }

    fn stop(&mut self, tag: PlaybackHandle) {
        self.state.lock().unwrap().stopped.push(tag);
    }
}
