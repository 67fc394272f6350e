//! Engine — the single task that ties capture, session, playback and
//! analysis together.
//!
//! [`ConversationEngine::run`] multiplexes capture chunks, transport events,
//! decode completions, sink end notifications and control commands with
//! `tokio::select!`, so all playback bookkeeping stays single-threaded.
//! [`ReorderBuffer`] restores arrival order across concurrent decodes;
//! [`EngineStatus`] is the shared snapshot the surrounding layer displays.

pub mod reorder;
pub mod runner;
pub mod status;

pub use reorder::ReorderBuffer;
pub use runner::{ConversationEngine, EngineCommand};
pub use status::{new_shared_status, EngineStatus, SharedStatus};
