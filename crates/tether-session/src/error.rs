//! Error types for the session layer.

/// Errors that can occur while keeping a session in its room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// An operation needs a room, but the identity doesn't have one
    /// (never joined, left, or was removed).
    #[error("not in a room")]
    NotInRoom,

    /// The server refused to put us back into our room after a reconnect.
    /// Not retried: the room is gone or no longer holds our slot.
    #[error("rejoin rejected: {0}")]
    RejoinRejected(String),

    /// The server removed us on purpose. Terminal and never retried.
    #[error("kicked by server: {0}")]
    Kicked(String),
}
