//! Session layer — connection lifecycle and the opaque service transport.
//!
//! [`SessionController`] drives the Idle → Connecting → Open → Closed state
//! machine over a pluggable [`Transport`].  Inbound [`TransportEvent`]s are
//! routed by the engine: audio payloads go to decode + schedule, the
//! interruption flag goes to the playback scheduler's cancellation path.

pub mod controller;
pub mod transport;

pub use controller::{SessionController, SessionState};
pub use transport::{
    ConnectionError, LoopbackTransport, ServerMessage, Transport, TransportConnection,
    TransportEvent,
};
