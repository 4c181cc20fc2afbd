//! What a session tells the application.
//!
//! Two surfaces:
//!
//! - [`SessionEvent`]s on a broadcast channel, for things that *happen*
//!   (any number of subscribers; a lagging subscriber loses the oldest)
//! - a [`SessionStatus`] on a watch channel, for things that *are*
//!   (always the latest value, good for rendering a status line)

use serde_json::Value;
use tether_protocol::{PlayerInfo, RoomSnapshot};
use tether_reconnect::ConnectionState;
use tether_session::{
    ConnectionQuality, GameRunState, LatencySample, PauseReason,
    SessionIdentity,
};

/// Everything a session can report.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Crossed between connected and not connected.
    ConnectionChanged { connected: bool },

    /// Every connection state transition.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// Automatic recovery gave up. Only a manual `connect()` helps now.
    NetworkError { message: String },

    /// Automatic attempt `attempt` of `max` has started.
    ReconnectAttempt { attempt: u32, max: u32 },

    /// The game loop should stop advancing.
    GamePaused { reason: PauseReason },

    /// The game loop may advance again.
    GameResumed,

    /// Authoritative room data: after create/join, on membership changes,
    /// and after a successful rejoin.
    RoomUpdate(RoomSnapshot),

    /// Creating, joining, or rejoining a room failed.
    JoinError { message: String },

    GameStarted(RoomSnapshot),

    PlayerJoined(PlayerInfo),

    PlayerDisconnected(PlayerInfo),

    /// A full authoritative game state. Replace local state with it.
    StateSnapshot(Value),

    /// A relayed application message.
    ActionReceived { kind: String, payload: Value },

    /// A fresh round-trip sample.
    LatencyUpdated {
        round_trip_ms: u64,
        quality: ConnectionQuality,
    },

    /// The server removed us. The session is disconnected and will not
    /// reconnect on its own.
    Kicked { reason: String },
}

/// A point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub connection: ConnectionState,
    /// The automatic attempt in progress or scheduled next; 0 when none.
    pub attempt: u32,
    pub max_attempts: u32,
    pub run_state: GameRunState,
    pub identity: SessionIdentity,
    pub latency: Option<LatencySample>,
    pub quality: Option<ConnectionQuality>,
    /// Actions waiting for a connection.
    pub queued: usize,
}

impl SessionStatus {
    /// `"Reconnecting (2/5)"`-style progress while recovering.
    pub fn progress(&self) -> Option<(u32, u32)> {
        (self.connection.is_recovering() && self.attempt > 0)
            .then_some((self.attempt, self.max_attempts))
    }
}
