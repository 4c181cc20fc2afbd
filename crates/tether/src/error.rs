//! Unified error type for Tether.

use tether_protocol::ProtocolError;
use tether_reconnect::ReconnectError;
use tether_session::SessionError;
use tether_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapper variant generates the `From`
/// impl, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// Connection, send, or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding a message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Illegal lifecycle transition or retry budget spent.
    #[error(transparent)]
    Reconnect(#[from] ReconnectError),

    /// Not in a room, rejoin refused, or kicked.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The session task has stopped; the handle is inert.
    #[error("session closed")]
    SessionClosed,

    /// The configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}
