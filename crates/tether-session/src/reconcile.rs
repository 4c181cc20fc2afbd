//! Getting back into the room after a reconnect.
//!
//! The flow, once the transport reports Connected and the identity still
//! has a room code:
//!
//! ```text
//! Idle ──begin_rejoin──→ AwaitingRejoin ──rejoinSuccess──→ Idle (flush queue)
//!                                       └─rejoinError────→ Idle (identity cleared)
//! ```
//!
//! While awaiting, actions are queued instead of sent, so the one rejoin
//! request always reaches the server before any replayed action.

use tether_protocol::{ClientMessage, GameStatus, RoomCode, RoomSnapshot};

use crate::{GameLoopLiaison, OutboundQueue, SessionError, SessionIdentity};

/// Where the rejoin handshake stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RejoinPhase {
    #[default]
    Idle,
    /// A rejoin request for `room` is on the wire.
    AwaitingRejoin { room: RoomCode },
}

/// A successful rejoin, ready to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejoined {
    pub room: RoomSnapshot,
    /// The connection-loss pause was lifted.
    pub resumed: bool,
}

/// A rejected rejoin and what was discarded because of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RejoinFailure {
    pub error: SessionError,
    /// The room we were trying to get back into, if we knew it.
    pub room: Option<RoomCode>,
    /// Queued actions dropped: they targeted a room we no longer belong to.
    pub dropped: usize,
    pub resumed: bool,
}

/// Drives the rejoin handshake.
#[derive(Debug, Default)]
pub struct SessionReconciler {
    phase: RejoinPhase,
}

impl SessionReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &RejoinPhase {
        &self.phase
    }

    /// `true` while the rejoin reply is outstanding. Actions must be queued
    /// and the queue must not be flushed during this window.
    pub fn is_awaiting(&self) -> bool {
        matches!(self.phase, RejoinPhase::AwaitingRejoin { .. })
    }

    /// Builds the rejoin request for the identity's room and starts
    /// awaiting the reply.
    ///
    /// # Errors
    /// [`SessionError::NotInRoom`] when there is nothing to rejoin; the
    /// phase is unchanged.
    pub fn begin_rejoin(
        &mut self,
        identity: &SessionIdentity,
    ) -> Result<ClientMessage, SessionError> {
        let room = identity.room_code.clone().ok_or(SessionError::NotInRoom)?;
        tracing::info!(%room, "rejoining room");
        self.phase = RejoinPhase::AwaitingRejoin { room: room.clone() };
        Ok(ClientMessage::Rejoin {
            room_code: room,
            display_name: identity.display_name.clone(),
            session_token: identity.session_token.clone(),
        })
    }

    /// The server took us back. Adopts its room data as-is.
    ///
    /// The connection-loss pause is lifted only when the server reports the
    /// game as in progress. A paused room waits for the server's
    /// `gameResumed`; a waiting room for its `gameStart`.
    pub fn on_rejoin_success(
        &mut self,
        room: RoomSnapshot,
        identity: &mut SessionIdentity,
        liaison: &mut GameLoopLiaison,
    ) -> Rejoined {
        if !self.is_awaiting() {
            tracing::debug!(room = %room.code, "rejoin success without a pending rejoin");
        }
        self.phase = RejoinPhase::Idle;
        identity.enter_room(room.code.clone(), None);

        let resumed = room.status == GameStatus::InProgress
            && liaison.resume_after_reconnect();
        tracing::info!(
            room = %room.code,
            status = %room.status,
            players = room.players.len(),
            "rejoined room"
        );
        Rejoined { room, resumed }
    }

    /// The server refused to take us back. Forgets the room, drops the
    /// queued actions meant for it, and lifts a connection-loss pause
    /// since there is no game left to hold.
    pub fn on_rejoin_error(
        &mut self,
        message: String,
        identity: &mut SessionIdentity,
        queue: &mut OutboundQueue,
        liaison: &mut GameLoopLiaison,
    ) -> RejoinFailure {
        let pending = match std::mem::take(&mut self.phase) {
            RejoinPhase::AwaitingRejoin { room } => Some(room),
            RejoinPhase::Idle => None,
        };
        let room = identity.clear_room().or(pending);
        let dropped = queue.clear();
        let resumed = liaison.resume_after_reconnect();

        tracing::warn!(
            room = room.as_ref().map(|r| r.as_str()),
            %message,
            dropped,
            "rejoin rejected, leaving room"
        );
        RejoinFailure {
            error: SessionError::RejoinRejected(message),
            room,
            dropped,
            resumed,
        }
    }

    /// Abandons any pending rejoin (the link dropped again, or we left).
    pub fn reset(&mut self) {
        self.phase = RejoinPhase::Idle;
    }

    /// The request for a full authoritative snapshot. The reply replaces
    /// local state wholesale; nothing here merges it.
    pub fn state_sync_request(&self) -> ClientMessage {
        ClientMessage::RequestStateSync
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::PauseReason;

    fn identity_in(room: &str) -> SessionIdentity {
        SessionIdentity {
            session_token: Some("tok-1".into()),
            room_code: Some(RoomCode::new(room)),
            display_name: Some("ada".into()),
        }
    }

    fn snapshot(code: &str, status: GameStatus) -> RoomSnapshot {
        RoomSnapshot {
            code: RoomCode::new(code),
            players: Vec::new(),
            status,
            data: json!({}),
        }
    }

    #[test]
    fn test_begin_rejoin_carries_identity() {
        let mut reconciler = SessionReconciler::new();
        let msg = reconciler.begin_rejoin(&identity_in("KQZT")).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Rejoin {
                room_code: RoomCode::new("KQZT"),
                display_name: Some("ada".into()),
                session_token: Some("tok-1".into()),
            }
        );
        assert!(reconciler.is_awaiting());
    }

    #[test]
    fn test_begin_rejoin_without_room_fails() {
        let mut reconciler = SessionReconciler::new();
        assert_eq!(
            reconciler.begin_rejoin(&SessionIdentity::new()),
            Err(SessionError::NotInRoom)
        );
        assert_eq!(reconciler.phase(), &RejoinPhase::Idle);
    }

    #[test]
    fn test_success_in_progress_resumes_connection_pause() {
        let mut reconciler = SessionReconciler::new();
        let mut identity = identity_in("KQZT");
        let mut liaison = GameLoopLiaison::new();
        liaison.pause(PauseReason::ConnectionLost);
        reconciler.begin_rejoin(&identity).unwrap();

        let rejoined = reconciler.on_rejoin_success(
            snapshot("KQZT", GameStatus::InProgress),
            &mut identity,
            &mut liaison,
        );
        assert!(rejoined.resumed);
        assert!(!liaison.is_paused());
        assert!(!reconciler.is_awaiting());
        assert_eq!(identity.display_name.as_deref(), Some("ada"));
    }

    #[test]
    fn test_success_with_server_paused_room_keeps_pause() {
        let mut reconciler = SessionReconciler::new();
        let mut identity = identity_in("KQZT");
        let mut liaison = GameLoopLiaison::new();
        liaison.pause(PauseReason::ConnectionLost);
        reconciler.begin_rejoin(&identity).unwrap();

        let rejoined = reconciler.on_rejoin_success(
            snapshot("KQZT", GameStatus::Paused),
            &mut identity,
            &mut liaison,
        );
        assert!(!rejoined.resumed);
        assert!(liaison.is_paused());
    }

    #[test]
    fn test_success_with_idle_room_keeps_pause() {
        for status in [GameStatus::Waiting, GameStatus::Finished] {
            let mut reconciler = SessionReconciler::new();
            let mut identity = identity_in("KQZT");
            let mut liaison = GameLoopLiaison::new();
            liaison.pause(PauseReason::ConnectionLost);
            reconciler.begin_rejoin(&identity).unwrap();

            let rejoined = reconciler.on_rejoin_success(
                snapshot("KQZT", status),
                &mut identity,
                &mut liaison,
            );
            assert!(!rejoined.resumed, "{status}");
            assert!(liaison.is_paused_for_connection_loss(), "{status}");
            assert!(!reconciler.is_awaiting());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_clears_identity_queue_and_pause() {
        let mut reconciler = SessionReconciler::new();
        let mut identity = identity_in("KQZT");
        let mut liaison = GameLoopLiaison::new();
        let mut queue = OutboundQueue::new(10, Duration::from_secs(30));
        queue.enqueue("move", json!(1), Instant::now());
        liaison.pause(PauseReason::ConnectionLost);
        reconciler.begin_rejoin(&identity).unwrap();

        let failure = reconciler.on_rejoin_error(
            "room closed".into(),
            &mut identity,
            &mut queue,
            &mut liaison,
        );

        assert_eq!(failure.error, SessionError::RejoinRejected("room closed".into()));
        assert_eq!(failure.room, Some(RoomCode::new("KQZT")));
        assert_eq!(failure.dropped, 1);
        assert!(failure.resumed);
        assert!(identity.room_code.is_none());
        assert!(identity.display_name.is_none());
        assert_eq!(identity.session_token.as_deref(), Some("tok-1"));
        assert!(queue.is_empty());
        assert!(!reconciler.is_awaiting());
    }

    #[test]
    fn test_state_sync_request() {
        assert_eq!(
            SessionReconciler::new().state_sync_request(),
            ClientMessage::RequestStateSync
        );
    }
}
