//! live-voice binary — wire the full duplex pipeline together and run it
//! until Ctrl-C.
//!
//! The renderer and UI chrome live outside this crate; this binary stands
//! the core up against the loopback transport so the whole path (capture →
//! session → decode → gapless playback → band analysis) can run end to end
//! on a local machine.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};

use live_voice::analyzer::BandFrame;
use live_voice::audio::{AudioTap, CapturePipeline};
use live_voice::config::AppConfig;
use live_voice::engine::{new_shared_status, ConversationEngine, EngineCommand};
use live_voice::playback::CpalSink;
use live_voice::session::LoopbackTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging, controlled by RUST_LOG (default: info).
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Configuration; a malformed file falls back to defaults with a warning.
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("config: {e:#}; using defaults");
            AppConfig::default()
        }
    };

    // 3. Analyzer attachment points for both audio directions.
    let input_tap = AudioTap::new(config.analyzer.tap_window);
    let output_tap = AudioTap::new(config.analyzer.tap_window);

    // 4. Channels between the device callbacks, the engine and this task.
    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
    let (ended_tx, ended_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (bands_tx, mut bands_rx) = watch::channel(BandFrame::default());

    // 5. Output sink. The stream guard is not Send and stays on this task.
    let (sink, _sink_guard) = CpalSink::new(output_tap.clone(), ended_tx)
        .context("opening the output device")?;

    // 6. Microphone capture. A missing input device is not fatal: inbound
    //    audio still plays, the outbound half just stays silent.
    let mut capture = CapturePipeline::new(input_tap.clone(), chunk_tx);
    if let Err(e) = capture.start() {
        log::warn!("capture: {e}; running playback-only");
    }

    // 7. The engine task over the loopback transport.
    let status = new_shared_status();
    let engine = ConversationEngine::new(
        Arc::new(LoopbackTransport),
        Box::new(sink),
        &input_tap,
        &output_tap,
        config.session.clone(),
        config.analyzer.tick_hz,
        Arc::clone(&status),
        bands_tx,
    );
    let engine_task = tokio::spawn(engine.run(chunk_rx, ended_rx, command_rx));

    // 8. Stand in for the renderer: drain band frames at trace level so the
    //    watch channel stays observable.
    tokio::spawn(async move {
        while bands_rx.changed().await.is_ok() {
            let frame = *bands_rx.borrow();
            log::trace!(
                "bands: in {:.3}/{:.3}/{:.3} out {:.3}/{:.3}/{:.3}",
                frame.input.low,
                frame.input.mid,
                frame.input.high,
                frame.output.low,
                frame.output.mid,
                frame.output.high,
            );
        }
    });

    log::info!("live-voice running — press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;

    // 9. Orderly teardown: stop the mic, then let the engine close the session.
    capture.stop();
    let _ = command_tx.send(EngineCommand::Shutdown);
    engine_task.await.context("engine task panicked")?;

    log::info!("bye");
    Ok(())
}
