//! Gapless playback scheduler.
//!
//! Decoded inbound frames are laid out on a virtual timeline: each frame
//! starts exactly where the previous one ends, so synthesized speech plays
//! back with no gaps or overlaps even though it arrives in bursts.
//!
//! State is `next_start_time` plus an active-set of playing buffers.  The
//! active-set lives in a generation-tagged slot arena: a [`PlaybackHandle`]
//! is an index plus a generation, and a handle whose generation no longer
//! matches its slot is simply stale.  That makes removal reentrant-safe —
//! a natural-end notification racing a barge-in sweep degrades to a no-op
//! instead of an iterator-invalidation hazard.
//!
//! On interruption every active buffer is force-stopped, the set is cleared
//! and the timeline resets to zero, so the next frame starts at the current
//! clock instead of queued far in the future.

use crate::audio::AudioFrame;

use super::sink::OutputSink;

// ---------------------------------------------------------------------------
// PlaybackHandle
// ---------------------------------------------------------------------------

/// Identity of one scheduled buffer: arena slot index + generation.
///
/// Copies stay valid as identifiers but act on the scheduler only while the
/// generation matches — afterwards they are stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackHandle {
    index: u32,
    generation: u32,
}

/// One arena slot.  `generation` increments on every free, invalidating any
/// handles still in flight.
#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    active: bool,
}

// ---------------------------------------------------------------------------
// PlaybackScheduler
// ---------------------------------------------------------------------------

/// Schedules decoded frames gaplessly onto an [`OutputSink`].
///
/// All mutation happens inside the engine task; the scheduler itself is not
/// shared.
pub struct PlaybackScheduler {
    sink: Box<dyn OutputSink>,
    /// Start time of the next frame, in seconds on the sink's clock.
    next_start_time: f64,
    slots: Vec<Slot>,
    free: Vec<usize>,
    active_count: usize,
}

impl PlaybackScheduler {
    /// Create a scheduler with an empty timeline over `sink`.
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        Self {
            sink,
            next_start_time: 0.0,
            slots: Vec::new(),
            free: Vec::new(),
            active_count: 0,
        }
    }

    /// Schedule one decoded frame for gapless playback.
    ///
    /// Zero-duration frames (decode produced nothing) are a complete no-op:
    /// no handle, no timeline movement, and `None` is returned.
    pub fn schedule(&mut self, frame: &AudioFrame) -> Option<PlaybackHandle> {
        let duration = frame.duration_secs();
        if duration <= 0.0 {
            log::debug!("scheduler: dropping zero-duration frame");
            return None;
        }

        // Clamp drift: if the pipeline stalled past the queued timeline,
        // resume from the current clock instead of the past.
        self.next_start_time = self.next_start_time.max(self.sink.current_time());

        let handle = self.alloc();
        self.sink.start(frame, self.next_start_time, handle);
        log::trace!(
            "scheduler: frame of {duration:.3}s at t={:.3}",
            self.next_start_time
        );
        self.next_start_time += duration;
        Some(handle)
    }

    /// A buffer finished playing naturally: drop it from the active-set.
    ///
    /// Safe to call with a stale handle (already interrupted or already
    /// ended) — that is a no-op, never an error.
    pub fn on_ended(&mut self, handle: PlaybackHandle) {
        self.release(handle);
    }

    /// Barge-in: force-stop everything and reset the timeline.
    ///
    /// After this the active-set is empty and `next_start_time` is zero, so
    /// the next frame is scheduled at the current clock.
    pub fn interrupt(&mut self) {
        let mut stopped = 0usize;
        for index in 0..self.slots.len() {
            if self.slots[index].active {
                let handle = PlaybackHandle {
                    index: index as u32,
                    generation: self.slots[index].generation,
                };
                self.sink.stop(handle);
                self.release(handle);
                stopped += 1;
            }
        }
        self.next_start_time = 0.0;
        if stopped > 0 {
            log::debug!("scheduler: interrupted, {stopped} buffer(s) cancelled");
        }
    }

    /// Number of currently audible buffers.
    pub fn active_len(&self) -> usize {
        self.active_count
    }

    /// Start time the next frame would receive (before clock clamping).
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    // -- arena -------------------------------------------------------------

    fn alloc(&mut self) -> PlaybackHandle {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].active = true;
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    active: true,
                });
                self.slots.len() - 1
            }
        };
        self.active_count += 1;
        PlaybackHandle {
            index: index as u32,
            generation: self.slots[index].generation,
        }
    }

    fn release(&mut self, handle: PlaybackHandle) {
        let index = handle.index as usize;
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        // Stale generation or double-release: no-op.
        if !slot.active || slot.generation != handle.generation {
            return;
        }
        slot.active = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.active_count -= 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
