//! Opaque transport to the remote conversational AI service.
//!
//! The wire protocol is not this crate's business.  [`Transport`] is the
//! seam: `connect` hands back a [`TransportConnection`] — an outbound chunk
//! sender plus an inbound [`TransportEvent`] receiver — and everything
//! behind it (websockets, SDKs, loopback stubs) is interchangeable.
//!
//! Implementations must be `Send + Sync` so they can be held behind an
//! `Arc<dyn Transport>` and called from the engine task.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::{decode_pcm16, encode_pcm16, resample_linear, EncodedAudioChunk};
use crate::audio::{CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE};
use crate::config::SessionSettings;

// ---------------------------------------------------------------------------
// ConnectionError
// ---------------------------------------------------------------------------

/// Failure to establish or hold a session.
///
/// Surfaced as user-visible status; the session is left Closed and no
/// automatic retry happens — a fresh open must be requested explicitly.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// The transport refused the connection.
    #[error("connection rejected: {0}")]
    Rejected(String),

    /// A session is still active; it must be closed before opening another.
    #[error("a session is already active — close it before opening a new one")]
    SessionActive,
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// One inbound message from the service.
#[derive(Debug, Clone, Default)]
pub struct ServerMessage {
    /// Synthesized speech as PCM16-LE @ 24 kHz, when present.
    pub audio: Option<Vec<u8>>,
    /// Set when the remote speaker was cut off; all queued playback must be
    /// cancelled (barge-in).
    pub interrupted: bool,
}

/// Connection lifecycle and payload events, in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is established; sending is now permitted.
    Opened,
    /// An inbound message (audio and/or interruption flag).
    Message(ServerMessage),
    /// Transport-level failure; the session is dead.
    Error(String),
    /// Orderly close, with the remote's reason.
    Closed(String),
}

/// Live connection handed back by [`Transport::connect`].
#[derive(Debug)]
pub struct TransportConnection {
    /// Outbound audio chunks (fire-and-forget).
    pub outbound: mpsc::UnboundedSender<EncodedAudioChunk>,
    /// Inbound events; closes when the connection dies.
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe factory for service connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a connection configured with `settings`.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Rejected`] when the service refuses.  No timeout
    /// is applied here; a hang is the transport implementation's problem.
    async fn connect(
        &self,
        settings: &SessionSettings,
    ) -> Result<TransportConnection, ConnectionError>;
}

// Compile-time assertion: Box<dyn Transport> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transport>) {}
};

// ---------------------------------------------------------------------------
// LoopbackTransport
// ---------------------------------------------------------------------------

/// A local stand-in service that echoes captured speech back as "model"
/// audio.
///
/// Every outbound 16 kHz chunk is decoded, resampled to the 24 kHz playback
/// rate and returned as an inbound message.  Useful for running the full
/// duplex pipeline end-to-end without network access.
pub struct LoopbackTransport;

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(
        &self,
        settings: &SessionSettings,
    ) -> Result<TransportConnection, ConnectionError> {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<EncodedAudioChunk>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();

        log::debug!(
            "loopback: connected (voice {})",
            settings.voice.label()
        );

        tokio::spawn(async move {
            let _ = event_tx.send(TransportEvent::Opened);

            while let Some(chunk) = outbound_rx.recv().await {
                let frame = match decode_pcm16(&chunk.payload, chunk.sample_rate) {
                    Ok(frame) => frame,
                    Err(e) => {
                        let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                        continue;
                    }
                };
                let upsampled =
                    resample_linear(&frame.samples, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE);
                let echoed = encode_pcm16(&upsampled, PLAYBACK_SAMPLE_RATE);
                let _ = event_tx.send(TransportEvent::Message(ServerMessage {
                    audio: Some(echoed.payload),
                    interrupted: false,
                }));
            }

            let _ = event_tx.send(TransportEvent::Closed("loopback sender dropped".into()));
        });

        Ok(TransportConnection {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// MockTransport (test double)
// ---------------------------------------------------------------------------

/// Scriptable transport for unit tests: records everything sent and lets
/// the test inject inbound events at will.
#[cfg(test)]
pub struct MockTransport {
    inner: std::sync::Arc<std::sync::Mutex<MockInner>>,
    reject: bool,
}

#[cfg(test)]
struct MockInner {
    sent: Vec<EncodedAudioChunk>,
    event_tx: Option<mpsc::UnboundedSender<TransportEvent>>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(std::sync::Mutex::new(MockInner {
                sent: Vec::new(),
                event_tx: None,
            })),
            reject: false,
        }
    }

    /// A transport whose `connect` always fails.
    pub fn rejecting() -> Self {
        let mut t = Self::new();
        t.reject = true;
        t
    }

    /// Inject an inbound event, as the remote service would.
    pub fn push_event(&self, event: TransportEvent) {
        let inner = self.inner.lock().unwrap();
        let tx = inner.event_tx.as_ref().expect("not connected");
        tx.send(event).expect("event receiver dropped");
    }

    /// Number of chunks the client has sent so far.
    pub fn sent_count(&self) -> usize {
        self.inner.lock().unwrap().sent.len()
    }

    /// Whether `connect` has been called (and events can be injected).
    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().event_tx.is_some()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        _settings: &SessionSettings,
    ) -> Result<TransportConnection, ConnectionError> {
        if self.reject {
            return Err(ConnectionError::Rejected("mock rejection".into()));
        }

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<EncodedAudioChunk>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();
        self.inner.lock().unwrap().event_tx = Some(event_tx);

        let inner = std::sync::Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(chunk) = outbound_rx.recv().await {
                inner.lock().unwrap().sent.push(chunk);
            }
        });

        Ok(TransportConnection {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_opens_then_echoes_at_playback_rate() {
        let transport = LoopbackTransport;
        let mut conn = transport
            .connect(&SessionSettings::default())
            .await
            .unwrap();

        assert!(matches!(
            conn.events.recv().await,
            Some(TransportEvent::Opened)
        ));

        // 160 samples @ 16 kHz (10 ms) should come back as 240 @ 24 kHz.
        let chunk = encode_pcm16(&vec![0.25_f32; 160], CAPTURE_SAMPLE_RATE);
        conn.outbound.send(chunk).unwrap();

        match conn.events.recv().await {
            Some(TransportEvent::Message(msg)) => {
                let audio = msg.audio.expect("echo carries audio");
                assert_eq!(audio.len() / 2, 240);
                assert!(!msg.interrupted);
            }
            other => panic!("expected echo message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn loopback_reports_close_when_sender_drops() {
        let transport = LoopbackTransport;
        let mut conn = transport
            .connect(&SessionSettings::default())
            .await
            .unwrap();
        let _ = conn.events.recv().await; // Opened

        drop(conn.outbound);
        assert!(matches!(
            conn.events.recv().await,
            Some(TransportEvent::Closed(_))
        ));
    }

    #[tokio::test]
    async fn mock_records_sent_chunks() {
        let transport = MockTransport::new();
        let conn = transport
            .connect(&SessionSettings::default())
            .await
            .unwrap();

        conn.outbound
            .send(encode_pcm16(&[0.0; 16], CAPTURE_SAMPLE_RATE))
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn rejecting_mock_fails_connect() {
        let transport = MockTransport::rejecting();
        let err = transport
            .connect(&SessionSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Rejected(_)));
    }
}
