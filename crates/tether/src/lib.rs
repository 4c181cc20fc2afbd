//! # Tether
//!
//! Session reconnection and state reconciliation for real-time multiplayer
//! clients.
//!
//! A [`Session`] keeps a player attached to their room on a coordination
//! server through network trouble: it reconnects with exponential backoff,
//! rejoins the room, replays actions issued while offline, pauses and
//! resumes the consumer's game loop, and reports link quality.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::prelude::*;
//!
//! # async fn run() -> Result<(), TetherError> {
//! let session = Session::start(WebSocketConnector, SessionConfig::default());
//! let mut events = session.subscribe();
//! session.connect(Some("ws://127.0.0.1:8080"))?;
//! session.create_room("ada")?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         SessionEvent::GamePaused { .. } => { /* stop ticking */ }
//!         SessionEvent::GameResumed => { /* tick again */ }
//!         SessionEvent::Kicked { .. } => break,
//!         _ => {}
//!     }
//! }
//! session.destroy().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! tether            Session handle + actor, config, events
//! tether-session    identity, outbound queue, latency, liaison, rejoin
//! tether-reconnect  connection state machine, backoff, timers
//! tether-protocol   ClientMessage / ServerMessage + JSON codec
//! tether-transport  Connector / Connection traits, WebSocket, in-memory
//! ```

mod actor;
mod config;
mod error;
mod events;
pub mod logging;
mod session;

pub use config::SessionConfig;
pub use error::TetherError;
pub use events::{SessionEvent, SessionStatus};
pub use session::Session;

pub use tether_protocol as protocol;
pub use tether_reconnect as reconnect;
pub use tether_session as state;
pub use tether_transport as transport;

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{Session, SessionConfig, SessionEvent, SessionStatus, TetherError};
    pub use tether_protocol::{GameStatus, PlayerInfo, RoomCode, RoomSnapshot};
    pub use tether_reconnect::ConnectionState;
    pub use tether_session::{ConnectionQuality, GameRunState, PauseReason};
    pub use tether_transport::Connector;
    #[cfg(feature = "websocket")]
    pub use tether_transport::WebSocketConnector;
}
