//! Transport layer for Tether clients.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over a
//! single bidirectional, message-oriented link to the coordination server,
//! and the [`TransportAdapter`] that owns that link and turns its lifecycle
//! into a stream of [`TransportEvent`]s.
//!
//! The adapter has no business logic: it does not retry, queue, or decode.
//! Those concerns live in the layers above.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket connector via `tokio-tungstenite`

mod adapter;
mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use adapter::TransportAdapter;
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    SESSION_TOKEN_HEADER, WebSocketConnection, WebSocketConnector,
};

use std::fmt;
use std::future::Future;

/// Dials the coordination server.
///
/// The returned futures must be `Send`: the adapter runs each connection
/// attempt in its own Tokio task so the caller never blocks on a dial.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;
    /// The error type for dial failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens one connection to `endpoint`.
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single open connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the server.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the server.
    ///
    /// Returns `Ok(None)` when the server closed the connection on purpose.
    /// An `Err` means the link was lost, including a close the server
    /// flagged as temporary (going away, restarting).
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// The opaque token the transport assigned to this connection.
    fn session_token(&self) -> &str;
}

/// Why an open connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server closed the connection deliberately (normal or policy
    /// close).
    /// Not a candidate for automatic reconnection.
    ClosedByPeer,
    /// The link failed (reset, EOF without close, write error...).
    Lost(String),
}

impl DisconnectReason {
    /// `true` for a deliberate close, `false` for a failure.
    pub fn is_intentional(&self) -> bool {
        matches!(self, Self::ClosedByPeer)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClosedByPeer => write!(f, "closed by server"),
            Self::Lost(reason) => write!(f, "connection lost: {reason}"),
        }
    }
}

/// What the adapter reports to its owner.
///
/// Each call to [`TransportAdapter::connect`] yields exactly one of
/// `Connected` or `ConnectionError`. An open connection yields any number of
/// `Message`s followed by at most one `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected { session_token: String },
    Disconnected(DisconnectReason),
    ConnectionError(String),
    Message(Vec<u8>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_reason_intentional() {
        assert!(DisconnectReason::ClosedByPeer.is_intentional());
        assert!(!DisconnectReason::Lost("reset".into()).is_intentional());
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(
            DisconnectReason::Lost("reset".into()).to_string(),
            "connection lost: reset"
        );
        assert_eq!(
            DisconnectReason::ClosedByPeer.to_string(),
            "closed by server"
        );
    }
}
