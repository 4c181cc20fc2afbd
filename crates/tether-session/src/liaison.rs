//! The bridge between connectivity and the consumer's game loop.
//!
//! The liaison owns the run state the simulation reads (paused or not, and
//! why) and decides whether an action goes out now or waits in the queue.

use std::fmt;

use serde_json::Value;
use tokio::time::Instant;

use crate::{OutboundQueue, QueuedMessage};

/// Why the game loop is paused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseReason {
    /// The link dropped. Resumed automatically once we are back.
    ConnectionLost,
    /// The coordination server paused the game. Only the server resumes it.
    Server(String),
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::Server(reason) => write!(f, "paused by server: {reason}"),
        }
    }
}

/// What the consumer's simulation reads each tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRunState {
    pub is_paused: bool,
    pub pause_reason: Option<PauseReason>,
}

/// Which path [`GameLoopLiaison::send_action`] took.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRoute {
    Sent,
    /// Held for the next flush. Carries the entry evicted to make room.
    Queued { evicted: Option<QueuedMessage> },
}

/// Single writer of [`GameRunState`].
#[derive(Debug, Default)]
pub struct GameLoopLiaison {
    state: GameRunState,
}

impl GameLoopLiaison {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GameRunState {
        &self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    /// `true` if paused and the pause is ours to lift on reconnect.
    pub fn is_paused_for_connection_loss(&self) -> bool {
        matches!(self.state.pause_reason, Some(PauseReason::ConnectionLost))
    }

    /// Pauses the loop. Returns `false` (and keeps the original reason) if
    /// it was already paused.
    pub fn pause(&mut self, reason: PauseReason) -> bool {
        if self.state.is_paused {
            return false;
        }
        tracing::info!(%reason, "game loop paused");
        self.state = GameRunState {
            is_paused: true,
            pause_reason: Some(reason),
        };
        true
    }

    /// Resumes the loop. Returns `false` if it was already running.
    pub fn resume(&mut self) -> bool {
        if !self.state.is_paused {
            return false;
        }
        tracing::info!("game loop resumed");
        self.state = GameRunState::default();
        true
    }

    /// Resumes only a pause caused by connection loss.
    pub fn resume_after_reconnect(&mut self) -> bool {
        self.is_paused_for_connection_loss() && self.resume()
    }

    /// Sends `kind`/`payload` through `send` when the link is ready,
    /// otherwise queues it. A send that fails is queued too, so the caller
    /// never has to care which path was taken.
    pub fn send_action<E>(
        &self,
        link_ready: bool,
        queue: &mut OutboundQueue,
        kind: String,
        payload: Value,
        send: impl FnOnce(&str, &Value) -> Result<(), E>,
    ) -> ActionRoute {
        if link_ready && send(&kind, &payload).is_ok() {
            return ActionRoute::Sent;
        }
        tracing::debug!(%kind, queued = queue.len() + 1, "action queued");
        let evicted = queue.enqueue(kind, payload, Instant::now());
        ActionRoute::Queued { evicted }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_double_pause_is_single_pause() {
        let mut liaison = GameLoopLiaison::new();
        assert!(liaison.pause(PauseReason::ConnectionLost));
        let after_first = liaison.state().clone();

        assert!(!liaison.pause(PauseReason::Server("admin".into())));
        assert_eq!(liaison.state(), &after_first);
        assert!(liaison.is_paused_for_connection_loss());
    }

    #[test]
    fn test_resume_when_running_is_noop() {
        let mut liaison = GameLoopLiaison::new();
        assert!(!liaison.resume());
        assert_eq!(liaison.state(), &GameRunState::default());
    }

    #[test]
    fn test_reconnect_does_not_lift_server_pause() {
        let mut liaison = GameLoopLiaison::new();
        liaison.pause(PauseReason::Server("player dropped".into()));
        assert!(!liaison.resume_after_reconnect());
        assert!(liaison.is_paused());

        assert!(liaison.resume());
        liaison.pause(PauseReason::ConnectionLost);
        assert!(liaison.resume_after_reconnect());
        assert!(!liaison.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_action_routes_by_link_state() {
        let liaison = GameLoopLiaison::new();
        let mut queue = OutboundQueue::new(10, Duration::from_secs(30));

        let mut sent = Vec::new();
        let route = liaison.send_action(true, &mut queue, "move".into(), json!(1), |k, _| {
            sent.push(k.to_string());
            Ok::<(), ()>(())
        });
        assert_eq!(route, ActionRoute::Sent);
        assert_eq!(sent, vec!["move"]);

        let route = liaison.send_action(false, &mut queue, "fire".into(), json!(2), |_, _| -> Result<(), ()> {
            panic!("must not send while offline")
        });
        assert_eq!(route, ActionRoute::Queued { evicted: None });
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_falls_back_to_queue() {
        let liaison = GameLoopLiaison::new();
        let mut queue = OutboundQueue::new(10, Duration::from_secs(30));
        let route = liaison.send_action(true, &mut queue, "move".into(), json!(1), |_, _| {
            Err("not connected")
        });
        assert!(matches!(route, ActionRoute::Queued { .. }));
        assert_eq!(queue.len(), 1);
    }
}
