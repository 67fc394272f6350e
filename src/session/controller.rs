//! Session controller — connection lifecycle state machine.
//!
//! [`SessionController`] owns exactly one connection to the remote service
//! at a time and gates all outbound audio on its state:
//!
//! ```text
//! Idle ──open()──▶ Connecting ──Opened event──▶ Open
//!                      │                          │
//!                      └──rejected──▶ Closed ◀──close() / Error / Closed
//!                                        (Closing is the transient exit path)
//! ```
//!
//! `send` is valid only in Open.  In every other state the chunk is dropped
//! silently — a documented limitation, not a buffer: capture may race ahead
//! of the connection handshake, and queuing stale microphone audio for a
//! session that is not ready would be worse than losing it.  Callers that
//! care must observe Open before starting capture.
//!
//! There is no automatic reconnection.  After an error or a configuration
//! change (e.g. a voice switch) the surrounding layer must `close()` and
//! `open()` a fresh session explicitly.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::EncodedAudioChunk;
use crate::config::SessionSettings;

use super::transport::{ConnectionError, Transport, TransportEvent};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// States of the service connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection has been requested yet.
    #[default]
    Idle,
    /// `open()` succeeded at the transport level; waiting for the Opened
    /// event before permitting sends.
    Connecting,
    /// Fully established; outbound audio flows.
    Open,
    /// Teardown in progress (transient).
    Closing,
    /// Connection finished or failed; a fresh `open()` is required.
    Closed,
}

impl SessionState {
    /// Returns `true` when outbound audio is permitted.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }

    /// Short label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::Open => "Open",
            SessionState::Closing => "Closing",
            SessionState::Closed => "Closed",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Owns the lifecycle of the connection to the remote service.
pub struct SessionController {
    state: SessionState,
    transport: Arc<dyn Transport>,
    outbound: Option<mpsc::UnboundedSender<EncodedAudioChunk>>,
}

impl SessionController {
    /// Create an idle controller over `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            state: SessionState::Idle,
            transport,
            outbound: None,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Request a connection configured with `settings`.
    ///
    /// On success the controller enters Connecting and the inbound event
    /// stream is returned; the caller must feed [`TransportEvent::Opened`]
    /// back through [`handle_opened`](Self::handle_opened) to unlock sends.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::SessionActive`] when a session is still live, or
    /// the transport's rejection.  On rejection the controller is left
    /// Closed.
    pub async fn open(
        &mut self,
        settings: &SessionSettings,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, ConnectionError> {
        match self.state {
            SessionState::Idle | SessionState::Closed => {}
            _ => return Err(ConnectionError::SessionActive),
        }

        self.state = SessionState::Connecting;
        log::info!(
            "session: connecting (voice {})",
            settings.voice.label()
        );

        match self.transport.connect(settings).await {
            Ok(conn) => {
                self.outbound = Some(conn.outbound);
                Ok(conn.events)
            }
            Err(e) => {
                self.state = SessionState::Closed;
                log::warn!("session: connect failed: {e}");
                Err(e)
            }
        }
    }

    /// The transport reported Opened: permit sends.
    pub fn handle_opened(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Open;
            log::info!("session: open");
        } else {
            log::warn!(
                "session: unexpected Opened event in state {}",
                self.state.label()
            );
        }
    }

    /// Forward an outbound chunk, or drop it when the session is not Open.
    ///
    /// Dropping is silent by design (see module docs); a trace log is the
    /// only breadcrumb.
    pub fn send(&mut self, chunk: EncodedAudioChunk) {
        if !self.state.is_open() {
            log::trace!(
                "session: dropping {}-sample chunk in state {}",
                chunk.sample_count(),
                self.state.label()
            );
            return;
        }

        if let Some(tx) = &self.outbound {
            if tx.send(chunk).is_err() {
                // Receiver vanished under us: the connection is dead.
                log::warn!("session: outbound channel closed; marking session Closed");
                self.mark_closed("outbound channel closed");
            }
        }
    }

    /// Close the session and release its resources.
    pub fn close(&mut self) {
        if matches!(self.state, SessionState::Idle | SessionState::Closed) {
            return;
        }
        self.state = SessionState::Closing;
        // Dropping the sender is the close signal to the transport.
        self.outbound = None;
        self.state = SessionState::Closed;
        log::info!("session: closed");
    }

    /// The transport reported an error or remote close: record it.
    pub fn mark_closed(&mut self, reason: &str) {
        self.outbound = None;
        if self.state != SessionState::Closed {
            self.state = SessionState::Closed;
            log::info!("session: closed ({reason})");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{encode_pcm16, CAPTURE_SAMPLE_RATE};
    use crate::session::transport::MockTransport;

    fn chunk() -> EncodedAudioChunk {
        encode_pcm16(&[0.1; 64], CAPTURE_SAMPLE_RATE)
    }

    #[test]
    fn new_controller_is_idle() {
        let controller = SessionController::new(Arc::new(MockTransport::new()));
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn open_moves_to_connecting_then_opened_unlocks() {
        let transport = Arc::new(MockTransport::new());
        let mut controller = SessionController::new(Arc::clone(&transport) as Arc<dyn Transport>);

        let _events = controller.open(&SessionSettings::default()).await.unwrap();
        assert_eq!(controller.state(), SessionState::Connecting);

        controller.handle_opened();
        assert_eq!(controller.state(), SessionState::Open);
        assert!(controller.state().is_open());
    }

    #[tokio::test]
    async fn rejected_open_leaves_session_closed() {
        let mut controller = SessionController::new(Arc::new(MockTransport::rejecting()));
        let err = controller
            .open(&SessionSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Rejected(_)));
        assert_eq!(controller.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn send_outside_open_drops_silently() {
        let transport = Arc::new(MockTransport::new());
        let mut controller = SessionController::new(Arc::clone(&transport) as Arc<dyn Transport>);

        // Idle: dropped.
        controller.send(chunk());

        // Connecting: still dropped.
        let _events = controller.open(&SessionSettings::default()).await.unwrap();
        controller.send(chunk());
        tokio::task::yield_now().await;
        assert_eq!(transport.sent_count(), 0);

        // Open: forwarded.
        controller.handle_opened();
        controller.send(chunk());
        tokio::task::yield_now().await;
        assert_eq!(transport.sent_count(), 1);

        // Closed: dropped again.
        controller.close();
        controller.send(chunk());
        tokio::task::yield_now().await;
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn open_while_active_is_rejected() {
        let transport = Arc::new(MockTransport::new());
        let mut controller = SessionController::new(Arc::clone(&transport) as Arc<dyn Transport>);

        let _events = controller.open(&SessionSettings::default()).await.unwrap();
        let err = controller
            .open(&SessionSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::SessionActive));
    }

    #[tokio::test]
    async fn close_then_reopen_is_allowed() {
        let transport = Arc::new(MockTransport::new());
        let mut controller = SessionController::new(Arc::clone(&transport) as Arc<dyn Transport>);

        let _events = controller.open(&SessionSettings::default()).await.unwrap();
        controller.handle_opened();
        controller.close();
        assert_eq!(controller.state(), SessionState::Closed);

        let _events = controller.open(&SessionSettings::default()).await.unwrap();
        assert_eq!(controller.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn mark_closed_after_transport_error() {
        let transport = Arc::new(MockTransport::new());
        let mut controller = SessionController::new(Arc::clone(&transport) as Arc<dyn Transport>);

        let _events = controller.open(&SessionSettings::default()).await.unwrap();
        controller.handle_opened();
        controller.mark_closed("remote error");
        assert_eq!(controller.state(), SessionState::Closed);
    }
}
