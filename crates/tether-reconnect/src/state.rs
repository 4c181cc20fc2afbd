//! The connection lifecycle state machine.

use std::fmt;

/// Where the connection to the coordination server stands.
///
/// Legal transitions:
///
/// ```text
///                 ┌──────────── retry fires ─────────────┐
///                 ▼                                      │
/// Disconnected → Connecting → Connected → Reconnecting ──┘
///                   │   ▲
///                   ▼   │ retry fires / manual connect
///                  Errored
///
/// any state → Disconnected   (explicit leave, kick, server close)
/// ```
///
/// Exactly one value at a time. Everyone may read it; only the
/// [`ReconnectController`](crate::ReconnectController) writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// The link dropped; a retry is scheduled.
    Reconnecting,
    /// The last attempt failed. A retry may be scheduled, unless the
    /// budget ran out.
    Errored,
}

impl ConnectionState {
    /// Returns `true` if `self → target` is an edge of the lifecycle.
    pub fn can_transition_to(self, target: Self) -> bool {
        use ConnectionState::*;
        match (self, target) {
            (Disconnected, Connecting) => true,
            (Connecting, Connected | Errored) => true,
            (Connected, Reconnecting) => true,
            (Reconnecting | Errored, Connecting) => true,
            (from, Disconnected) => from != Disconnected,
            _ => false,
        }
    }

    /// `true` only while a connection is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// `true` while the session is trying to get (back) online.
    pub fn is_recovering(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting | Self::Errored)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Errored => write!(f, "Errored"),
        }
    }
}
