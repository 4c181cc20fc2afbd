//! Client-side session bookkeeping for Tether.
//!
//! This crate holds everything the session actor needs to remember about a
//! player between connections, and the rules for putting it back together
//! after a reconnect:
//!
//! 1. **Identity** ([`SessionIdentity`]): token, room code and display name
//!    that survive reconnect attempts
//! 2. **Outbound queue** ([`OutboundQueue`]): bounded, time-limited holding
//!    area for actions issued while offline
//! 3. **Latency** ([`LatencyMonitor`]): ping/pong round-trip sampling and
//!    a coarse [`ConnectionQuality`]
//! 4. **Game-loop liaison** ([`GameLoopLiaison`]): pause/resume of the
//!    consumer's simulation, and the send-or-queue decision for actions
//! 5. **Reconciliation** ([`SessionReconciler`]): the rejoin handshake after
//!    a reconnect
//!
//! # How it fits in the stack
//!
//! ```text
//! Session actor (tether)  ← owns one of each and drives them
//!     ↕
//! Session layer (this crate)  ← pure state, no I/O
//!     ↕
//! Protocol layer (below)  ← ClientMessage / ServerMessage / RoomSnapshot
//! ```
//!
//! Nothing here touches a socket. Sending is always a closure supplied by
//! the caller, which keeps every rule testable with paused time.

mod error;
mod identity;
mod latency;
mod liaison;
mod queue;
mod reconcile;

pub use error::SessionError;
pub use identity::SessionIdentity;
pub use latency::{ConnectionQuality, LatencyMonitor, LatencySample};
pub use liaison::{ActionRoute, GameLoopLiaison, GameRunState, PauseReason};
pub use queue::{FlushReport, OutboundQueue, QueuedMessage};
pub use reconcile::{RejoinFailure, RejoinPhase, Rejoined, SessionReconciler};
