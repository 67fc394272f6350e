//! Shared status state read by the surrounding (excluded) UI layer.
//!
//! [`EngineStatus`] is the single source of truth for what the engine is
//! doing: current session state, a short status line, and the most recent
//! user-visible error.  It lives behind [`SharedStatus`]
//! (`Arc<Mutex<EngineStatus>>`) — cheap to clone, locked only for short
//! critical sections, never held across `.await`.

use std::sync::{Arc, Mutex};

use crate::session::SessionState;

// ---------------------------------------------------------------------------
// EngineStatus
// ---------------------------------------------------------------------------

/// User-visible engine state.
#[derive(Debug, Clone, Default)]
pub struct EngineStatus {
    /// Connection state, mirrored from the session controller every tick.
    pub session: SessionState,
    /// Short human-readable status line.
    pub status: String,
    /// Most recent user-visible error, cleared by the next status update.
    pub error: Option<String>,
}

impl EngineStatus {
    /// Record a status line; clears any standing error.
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
        self.error = None;
    }

    /// Record a user-visible error.
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.error = Some(msg.into());
    }
}

// ---------------------------------------------------------------------------
// SharedStatus
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`EngineStatus`].
pub type SharedStatus = Arc<Mutex<EngineStatus>>;

/// Construct a fresh [`SharedStatus`].
pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(EngineStatus::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_update_clears_error() {
        let mut status = EngineStatus::default();
        status.set_error("microphone unavailable");
        assert!(status.error.is_some());

        status.set_status("Opened");
        assert_eq!(status.status, "Opened");
        assert!(status.error.is_none());
    }

    #[test]
    fn default_session_state_is_idle() {
        let status = EngineStatus::default();
        assert_eq!(status.session, SessionState::Idle);
    }

    #[test]
    fn shared_status_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedStatus>();
    }
}
