//! Conversation engine — the single logical thread of control.
//!
//! [`ConversationEngine::run`] is one tokio task multiplexing everything the
//! core does:
//!
//! ```text
//! tick (display cadence) ──▶ analyzers update → BandFrame (watch)
//! capture chunk ready    ──▶ SessionController::send (fire-and-forget)
//! transport event        ──▶ Opened  → unlock sends
//!                            Message → audio: stamp seq, spawn decode
//!                                      interrupted: scheduler.interrupt()
//!                            Error / Closed → session marked Closed
//! decode completion      ──▶ ReorderBuffer → scheduler.schedule (in order)
//! sink end notification  ──▶ scheduler.on_ended
//! EngineCommand          ──▶ Reset (close + fresh open) / Shutdown
//! ```
//!
//! `next_start_time` and the active-set are only ever touched from inside
//! this task; decode is the sole suspending operation and is pushed onto
//! `spawn_blocking` so the loop never stalls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::analyzer::{Analyzer, BandFrame, BandParameters};
use crate::audio::{decode_pcm16, AudioFrame, AudioTap, EncodedAudioChunk, PLAYBACK_SAMPLE_RATE};
use crate::config::SessionSettings;
use crate::playback::{OutputSink, PlaybackHandle, PlaybackScheduler};
use crate::session::{SessionController, Transport, TransportEvent};

use super::reorder::ReorderBuffer;
use super::status::SharedStatus;

// ---------------------------------------------------------------------------
// EngineCommand
// ---------------------------------------------------------------------------

/// Control messages from the surrounding layer.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Close the current session and open a fresh one with new settings
    /// (the voice-change / reset path).  Queued playback is cancelled.
    Reset(SessionSettings),
    /// Close the session and stop the engine.
    Shutdown,
}

// ---------------------------------------------------------------------------
// ConversationEngine
// ---------------------------------------------------------------------------

/// Owns the session, the playback scheduler and both analyzers.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use live_voice::analyzer::BandFrame;
/// use live_voice::audio::AudioTap;
/// use live_voice::config::SessionSettings;
/// use live_voice::engine::{new_shared_status, ConversationEngine};
/// use live_voice::playback::CpalSink;
/// use live_voice::session::LoopbackTransport;
///
/// # async fn example() {
/// let input_tap = AudioTap::new(4096);
/// let output_tap = AudioTap::new(4096);
///
/// let (chunk_tx, chunk_rx) = tokio::sync::mpsc::unbounded_channel();
/// let (ended_tx, ended_rx) = tokio::sync::mpsc::unbounded_channel();
/// let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();
/// let (bands_tx, bands_rx) = tokio::sync::watch::channel(BandFrame::default());
///
/// let (sink, _stream_guard) = CpalSink::new(output_tap.clone(), ended_tx).unwrap();
/// let engine = ConversationEngine::new(
///     Arc::new(LoopbackTransport),
///     Box::new(sink),
///     &input_tap,
///     &output_tap,
///     SessionSettings::default(),
///     60,
///     new_shared_status(),
///     bands_tx,
/// );
///
/// tokio::spawn(engine.run(chunk_rx, ended_rx, command_rx));
/// // chunk_tx goes to the capture pipeline; bands_rx to the renderer;
/// // command_tx to the UI layer.
/// # let _ = (chunk_tx, bands_rx, command_tx);
/// # }
/// ```
pub struct ConversationEngine {
    session: SessionController,
    scheduler: PlaybackScheduler,
    input_analyzer: Analyzer,
    output_analyzer: Analyzer,
    status: SharedStatus,
    bands_tx: watch::Sender<BandFrame>,
    settings: SessionSettings,
    tick_hz: u32,
    reorder: ReorderBuffer<Option<AudioFrame>>,
    next_seq: u64,
    decode_tx: mpsc::UnboundedSender<(u64, Option<AudioFrame>)>,
    decode_rx: Option<mpsc::UnboundedReceiver<(u64, Option<AudioFrame>)>>,
}

impl ConversationEngine {
    /// Assemble an engine over its collaborators.
    ///
    /// Both taps are the process-scoped attachment points: `input_tap` is
    /// fed by the capture pipeline, `output_tap` by the sink.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Box<dyn OutputSink>,
        input_tap: &AudioTap,
        output_tap: &AudioTap,
        settings: SessionSettings,
        tick_hz: u32,
        status: SharedStatus,
        bands_tx: watch::Sender<BandFrame>,
    ) -> Self {
        let (decode_tx, decode_rx) = mpsc::unbounded_channel();
        Self {
            session: SessionController::new(transport),
            scheduler: PlaybackScheduler::new(sink),
            input_analyzer: Analyzer::attach(input_tap),
            output_analyzer: Analyzer::attach(output_tap),
            status,
            bands_tx,
            settings,
            tick_hz: tick_hz.max(1),
            reorder: ReorderBuffer::new(),
            next_seq: 0,
            decode_tx,
            decode_rx: Some(decode_rx),
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until [`EngineCommand::Shutdown`] or until the command channel
    /// closes.
    ///
    /// * `chunk_rx` — encoded blocks from the capture pipeline.
    /// * `ended_rx` — natural-end tags from the output sink.
    /// * `command_rx` — control messages from the surrounding layer.
    pub async fn run(
        mut self,
        mut chunk_rx: mpsc::UnboundedReceiver<EncodedAudioChunk>,
        mut ended_rx: mpsc::UnboundedReceiver<PlaybackHandle>,
        mut command_rx: mpsc::UnboundedReceiver<EngineCommand>,
    ) {
        let mut decode_rx = self.decode_rx.take().expect("run() called twice");
        let mut events = self.connect().await;

        let mut tick =
            tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(self.tick_hz)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.on_tick();
                }

                Some(chunk) = chunk_rx.recv() => {
                    self.session.send(chunk);
                }

                event = async {
                    match events.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match event {
                        Some(event) => self.handle_transport_event(event),
                        None => {
                            // Event stream gone: the connection is dead.
                            self.session.mark_closed("event stream ended");
                            events = None;
                        }
                    }
                }

                Some((seq, frame)) = decode_rx.recv() => {
                    self.on_decode_complete(seq, frame);
                }

                Some(handle) = ended_rx.recv() => {
                    self.scheduler.on_ended(handle);
                }

                command = command_rx.recv() => {
                    match command {
                        Some(EngineCommand::Reset(settings)) => {
                            log::info!(
                                "engine: reset (voice {})",
                                settings.voice.label()
                            );
                            self.settings = settings;
                            self.session.close();
                            self.scheduler.interrupt();
                            events = self.connect().await;
                        }
                        Some(EngineCommand::Shutdown) | None => {
                            self.session.close();
                            log::info!("engine: shut down");
                            return;
                        }
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    /// Open a session with the current settings, surfacing failure as
    /// status.  No retry: a later `Reset` is the only way to try again.
    async fn connect(
        &mut self,
    ) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.status.lock().unwrap().set_status("Connecting...");
        match self.session.open(&self.settings).await {
            Ok(events) => Some(events),
            Err(e) => {
                self.status.lock().unwrap().set_error(e.to_string());
                None
            }
        }
    }

    /// Per-tick work: refresh both spectra and publish band parameters.
    fn on_tick(&mut self) {
        self.input_analyzer.update();
        self.output_analyzer.update();

        let frame = BandFrame {
            input: BandParameters::from_bins(self.input_analyzer.data()),
            output: BandParameters::from_bins(self.output_analyzer.data()),
        };
        self.bands_tx.send_replace(frame);

        self.status.lock().unwrap().session = self.session.state();
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                self.session.handle_opened();
                self.status.lock().unwrap().set_status("Opened");
            }
            TransportEvent::Message(message) => {
                if let Some(audio) = message.audio {
                    self.spawn_decode(audio);
                }
                if message.interrupted {
                    self.scheduler.interrupt();
                }
            }
            TransportEvent::Error(reason) => {
                self.status.lock().unwrap().set_error(reason.clone());
                self.session.mark_closed(&reason);
            }
            TransportEvent::Closed(reason) => {
                self.status
                    .lock()
                    .unwrap()
                    .set_status(format!("Close: {reason}"));
                self.session.mark_closed(&reason);
            }
        }
    }

    /// Stamp the chunk with its arrival sequence and decode off-loop.
    ///
    /// A failed decode still claims its sequence slot (as `None`) so later
    /// frames are never held hostage by a malformed chunk.
    fn spawn_decode(&mut self, audio: Vec<u8>) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let tx = self.decode_tx.clone();
        tokio::spawn(async move {
            let joined =
                tokio::task::spawn_blocking(move || decode_pcm16(&audio, PLAYBACK_SAMPLE_RATE))
                    .await;
            let frame = match joined {
                Ok(Ok(frame)) => Some(frame),
                Ok(Err(e)) => {
                    // Best-effort: dropped, not surfaced.
                    log::debug!("decode: dropping chunk (seq {seq}): {e}");
                    None
                }
                Err(e) => {
                    log::debug!("decode: task failed (seq {seq}): {e}");
                    None
                }
            };
            let _ = tx.send((seq, frame));
        });
    }

    /// Admit completed decodes to the scheduler in arrival order.
    fn on_decode_complete(&mut self, seq: u64, frame: Option<AudioFrame>) {
        self.reorder.push(seq, frame);
        while let Some(slot) = self.reorder.pop_ready() {
            if let Some(frame) = slot {
                self.scheduler.schedule(&frame);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::BandFrame;
    use crate::engine::status::new_shared_status;
    use crate::playback::sink::VirtualSink;
    use crate::session::transport::MockTransport;
    use crate::session::ServerMessage;
    use std::time::Duration;

    struct Harness {
        transport: Arc<MockTransport>,
        sink_state: Arc<std::sync::Mutex<crate::playback::sink::VirtualSinkState>>,
        chunk_tx: mpsc::UnboundedSender<EncodedAudioChunk>,
        command_tx: mpsc::UnboundedSender<EngineCommand>,
        bands_rx: watch::Receiver<BandFrame>,
        status: SharedStatus,
        task: tokio::task::JoinHandle<()>,
    }

    async fn start_engine() -> Harness {
        let transport = Arc::new(MockTransport::new());
        let (sink, sink_state) = VirtualSink::new();
        let input_tap = AudioTap::new(64);
        let output_tap = AudioTap::new(64);
        let status = new_shared_status();
        let (bands_tx, bands_rx) = watch::channel(BandFrame::default());

        let engine = ConversationEngine::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Box::new(sink),
            &input_tap,
            &output_tap,
            SessionSettings::default(),
            200,
            Arc::clone(&status),
            bands_tx,
        );

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (_ended_tx, ended_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(engine.run(chunk_rx, ended_rx, command_rx));

        // Wait for the engine's connect to reach the mock.
        for _ in 0..100 {
            if transport.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(transport.is_connected(), "engine never connected");

        Harness {
            transport,
            sink_state,
            chunk_tx,
            command_tx,
            bands_rx,
            status,
            task,
        }
    }

    fn pcm_silence(samples: usize) -> Vec<u8> {
        vec![0u8; samples * 2]
    }

    async fn wait_for<F: Fn() -> bool>(cond: F, what: &str) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {what}");
    }

    async fn shutdown(h: Harness) {
        h.command_tx.send(EngineCommand::Shutdown).unwrap();
        let _ = h.task.await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn inbound_frames_are_scheduled_gaplessly() {
        let h = start_engine().await;
        h.transport.push_event(TransportEvent::Opened);

        // 1.0 s then 0.5 s of 24 kHz audio.
        h.transport.push_event(TransportEvent::Message(ServerMessage {
            audio: Some(pcm_silence(24_000)),
            interrupted: false,
        }));
        h.transport.push_event(TransportEvent::Message(ServerMessage {
            audio: Some(pcm_silence(12_000)),
            interrupted: false,
        }));

        let state = Arc::clone(&h.sink_state);
        wait_for(|| state.lock().unwrap().started.len() == 2, "two frames").await;

        let started = state.lock().unwrap().started.clone();
        assert_eq!(started[0].1, 0.0);
        assert!((started[0].2 - 1.0).abs() < 1e-9);
        assert!((started[1].1 - 1.0).abs() < 1e-9, "second frame must butt-join");

        shutdown(h).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn interruption_cancels_queued_audio() {
        let h = start_engine().await;
        h.transport.push_event(TransportEvent::Opened);

        h.transport.push_event(TransportEvent::Message(ServerMessage {
            audio: Some(pcm_silence(24_000)),
            interrupted: false,
        }));
        let state = Arc::clone(&h.sink_state);
        wait_for(|| state.lock().unwrap().started.len() == 1, "first frame").await;

        h.transport.push_event(TransportEvent::Message(ServerMessage {
            audio: None,
            interrupted: true,
        }));
        wait_for(|| !state.lock().unwrap().stopped.is_empty(), "force stop").await;

        let tag = state.lock().unwrap().started[0].0;
        assert!(state.lock().unwrap().stopped.contains(&tag));

        shutdown(h).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn capture_chunks_flow_only_while_open() {
        let h = start_engine().await;

        // Session is Connecting: chunk dropped.
        h.chunk_tx
            .send(crate::audio::encode_pcm16(&[0.1; 64], 16_000))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.transport.sent_count(), 0);

        h.transport.push_event(TransportEvent::Opened);
        let status = Arc::clone(&h.status);
        wait_for(
            || status.lock().unwrap().session == crate::session::SessionState::Open,
            "session open",
        )
        .await;

        h.chunk_tx
            .send(crate::audio::encode_pcm16(&[0.1; 64], 16_000))
            .unwrap();
        let transport = Arc::clone(&h.transport);
        wait_for(|| transport.sent_count() == 1, "forwarded chunk").await;

        shutdown(h).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn band_frames_are_published_every_tick() {
        let mut h = start_engine().await;
        tokio::time::timeout(Duration::from_secs(1), h.bands_rx.changed())
            .await
            .expect("no tick within 1 s")
            .expect("watch channel closed");
        // Silence in both taps → all-zero bands.
        assert_eq!(*h.bands_rx.borrow(), BandFrame::default());

        shutdown(h).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn transport_error_closes_the_session() {
        let h = start_engine().await;
        h.transport.push_event(TransportEvent::Opened);
        h.transport
            .push_event(TransportEvent::Error("boom".into()));

        let status = Arc::clone(&h.status);
        wait_for(
            || status.lock().unwrap().session == crate::session::SessionState::Closed,
            "session closed",
        )
        .await;
        assert_eq!(
            h.status.lock().unwrap().error.as_deref(),
            Some("boom")
        );

        shutdown(h).await;
    }
}
