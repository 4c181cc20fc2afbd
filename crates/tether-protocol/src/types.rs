//! Core protocol types for Tether's wire format.
//!
//! This module defines every type that travels "on the wire" between a
//! client and the coordination server. Game actions themselves are opaque:
//! the protocol carries them as a `kind` tag plus a JSON payload and never
//! looks inside.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The short code that identifies a room on the coordination server
/// (e.g. `"KQZT"`).
///
/// Newtype wrapper so a room code can't be confused with a display name or
/// a session token, even though all three are strings underneath.
/// `#[serde(transparent)]` serializes it as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Creates a room code from anything string-like.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A player identifier as assigned by the coordination server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Room data
// ---------------------------------------------------------------------------

/// One member of a room as the server sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    /// `false` while the server holds the player's slot during a
    /// disconnect grace period.
    #[serde(default = "connected_by_default")]
    pub connected: bool,
}

fn connected_by_default() -> bool {
    true
}

/// The run status of the game hosted in a room.
///
/// ```text
/// Waiting → InProgress ⇄ Paused → Finished
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    /// Lobby: players are gathering, no simulation running.
    #[default]
    Waiting,
    /// The simulation is running.
    InProgress,
    /// The server paused the game (e.g. a player dropped).
    Paused,
    /// The game ended.
    Finished,
}

impl GameStatus {
    /// Returns `true` if the server reports the game as running.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Paused => write!(f, "Paused"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

/// Authoritative room membership and metadata, as delivered by the server.
///
/// The `data` field carries whatever extra room data the game attaches
/// (settings, scores, ...). It's opaque here and handed to the consumer
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    #[serde(default)]
    pub players: Vec<PlayerInfo>,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// ClientMessage: client → server
// ---------------------------------------------------------------------------

/// Messages a Tether client sends to the coordination server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
///   `{ "type": "ping", "timestamp": 1200 }`
/// and `rename_all_fields` keeps field names camelCase to match what the
/// server (a JavaScript service) expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// "Create a new room and put me in it."
    CreateRoom { display_name: String },

    /// "Put me in this existing room."
    JoinRoom {
        room_code: RoomCode,
        display_name: String,
    },

    /// "I'm leaving my room." Sent on explicit user-initiated leave.
    LeaveRoom,

    /// "I was in this room before my connection dropped; take me back."
    ///
    /// `session_token` is the token of the *previous* connection so the
    /// server can match the new socket to the held player slot.
    Rejoin {
        room_code: RoomCode,
        display_name: Option<String>,
        session_token: Option<String>,
    },

    /// "My local state can't be trusted, send me a full snapshot."
    RequestStateSync,

    /// Liveness probe. The server echoes `timestamp` back in a
    /// [`ServerMessage::Pong`].
    Ping { timestamp: u64 },

    /// An application intent (a move, an attack, a chat line...).
    Action { kind: String, payload: Value },
}

// ---------------------------------------------------------------------------
// ServerMessage: server → client
// ---------------------------------------------------------------------------

/// Every message kind the coordination server can send.
///
/// This is a closed set: anything else fails to decode at the transport
/// boundary, so the session layer can `match` exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Reply to [`ClientMessage::CreateRoom`].
    RoomCreated { room: RoomSnapshot },

    /// Reply to [`ClientMessage::JoinRoom`].
    RoomJoined { room: RoomSnapshot },

    /// Membership or metadata changed.
    RoomUpdate { room: RoomSnapshot },

    /// Creating or joining a room failed (room full, unknown code, ...).
    JoinError { message: String },

    /// The game in the room started.
    GameStart { room: RoomSnapshot },

    PlayerJoined { player: PlayerInfo },

    PlayerDisconnected { player: PlayerInfo },

    /// The server accepted a [`ClientMessage::Rejoin`].
    RejoinSuccess { room: RoomSnapshot },

    /// The server rejected a rejoin (room gone, slot expired, ...).
    RejoinError { message: String },

    /// A full authoritative game state snapshot. Never merged; the
    /// consumer replaces its local state wholesale.
    GameStateSync { state: Value },

    GamePaused { reason: String },

    GameResumed,

    /// The server removed this player. Terminal: no automatic reconnect.
    Kicked { reason: String },

    /// Echo of a [`ClientMessage::Ping`].
    Pong { timestamp: u64 },

    /// An application message relayed from the room.
    Action { kind: String, payload: Value },
}

impl ServerMessage {
    /// The wire tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomCreated { .. } => "roomCreated",
            Self::RoomJoined { .. } => "roomJoined",
            Self::RoomUpdate { .. } => "roomUpdate",
            Self::JoinError { .. } => "joinError",
            Self::GameStart { .. } => "gameStart",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::PlayerDisconnected { .. } => "playerDisconnected",
            Self::RejoinSuccess { .. } => "rejoinSuccess",
            Self::RejoinError { .. } => "rejoinError",
            Self::GameStateSync { .. } => "gameStateSync",
            Self::GamePaused { .. } => "gamePaused",
            Self::GameResumed => "gameResumed",
            Self::Kicked { .. } => "kicked",
            Self::Pong { .. } => "pong",
            Self::Action { .. } => "action",
        }
    }

    /// Checks the rules serde can't express: room codes and action kinds
    /// must be non-empty.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] naming the offending field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::RoomCreated { room }
            | Self::RoomJoined { room }
            | Self::RoomUpdate { room }
            | Self::GameStart { room }
            | Self::RejoinSuccess { room } => {
                if room.code.as_str().is_empty() {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "{}: empty room code",
                        self.kind()
                    )));
                }
            }
            Self::Action { kind, .. } if kind.is_empty() => {
                return Err(ProtocolError::InvalidMessage(
                    "action: empty kind".into(),
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
