//! Arrival-order admission for concurrent decodes.
//!
//! Several inbound chunks may be decoding at once, and the fast ones finish
//! first.  Playing frames in completion order would scramble the speech, so
//! every chunk is stamped with a monotonic sequence number on arrival and
//! completions pass through a [`ReorderBuffer`] at the scheduler's entry:
//! nothing is released until every earlier sequence number has been
//! released first.
//!
//! Failed decodes must still occupy their sequence slot (as `None` at the
//! call site) or the stream would stall forever waiting for a frame that
//! will never come.

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ReorderBuffer
// ---------------------------------------------------------------------------

/// Releases values in sequence order regardless of insertion order.
///
/// ```
/// use live_voice::engine::ReorderBuffer;
///
/// let mut buf = ReorderBuffer::new();
/// buf.push(1, "b");
/// assert_eq!(buf.pop_ready(), None); // 0 hasn't arrived
///
/// buf.push(0, "a");
/// assert_eq!(buf.pop_ready(), Some("a"));
/// assert_eq!(buf.pop_ready(), Some("b"));
/// assert_eq!(buf.pop_ready(), None);
/// ```
pub struct ReorderBuffer<T> {
    next_seq: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ReorderBuffer<T> {
    /// Create an empty buffer expecting sequence number 0 first.
    pub fn new() -> Self {
        Self {
            next_seq: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Insert a completed value by its arrival sequence number.
    ///
    /// Sequence numbers below the release point are already spoken for and
    /// are discarded (a duplicate completion cannot rewind the stream).
    pub fn push(&mut self, seq: u64, value: T) {
        if seq < self.next_seq {
            log::debug!("reorder: discarding duplicate seq {seq}");
            return;
        }
        self.pending.insert(seq, value);
    }

    /// Release the next in-order value, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<T> {
        let value = self.pending.remove(&self.next_seq)?;
        self.next_seq += 1;
        Some(value)
    }

    /// Completions waiting on an earlier sequence number.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
