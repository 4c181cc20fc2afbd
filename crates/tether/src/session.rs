//! The `Session` handle.
//!
//! A `Session` is a thin front for the session actor: every operation is a
//! message on an unbounded channel, so none of them block and all of them
//! return as soon as the command is queued.

use std::time::Duration;

use serde_json::Value;
use tether_protocol::RoomCode;
use tether_reconnect::ConnectionState;
use tether_session::GameRunState;
use tether_transport::Connector;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::actor::SessionActor;
use crate::{SessionConfig, SessionEvent, SessionStatus, TetherError};

/// What the handle asks the actor to do.
#[derive(Debug)]
pub(crate) enum Command {
    Connect { endpoint: Option<String> },
    Disconnect,
    SendAction { kind: String, payload: Value },
    RequestStateSync,
    CreateRoom { display_name: String },
    JoinRoom { room_code: RoomCode, display_name: String },
    Shutdown,
}

/// A reconnecting connection to the coordination server.
///
/// # Example
///
/// ```rust,ignore
/// use tether::prelude::*;
///
/// let session = Session::start(WebSocketConnector, SessionConfig::default());
/// let mut events = session.subscribe();
/// session.connect(Some("ws://game.example:8080"))?;
/// session.create_room("ada")?;
///
/// while let Ok(event) = events.recv().await {
///     if let SessionEvent::GamePaused { reason } = event {
///         // stop the simulation
///     }
/// }
/// session.destroy().await;
/// ```
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
    task: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl Session {
    /// Validates `config` and spawns the session actor on the current Tokio
    /// runtime. Nothing is dialed until [`connect`](Self::connect).
    ///
    /// # Panics
    /// When called outside a Tokio runtime.
    pub fn start<C: Connector>(connector: C, config: SessionConfig) -> Self {
        let config = config.validated();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_channel_capacity);
        let (status_tx, status) = watch::channel(SessionStatus {
            max_attempts: config.max_reconnect_attempts,
            ..SessionStatus::default()
        });
        let shutdown_timeout = config.shutdown_timeout();

        let actor = SessionActor::new(
            connector,
            config,
            command_rx,
            events.clone(),
            status_tx,
        );
        let task = tokio::spawn(actor.run());

        Self {
            commands,
            events,
            status,
            task,
            shutdown_timeout,
        }
    }

    /// Starts a manual connection attempt. Resets the retry budget.
    ///
    /// `endpoint` replaces the configured endpoint for this and all later
    /// attempts; `None` keeps the current one. Ignored while already
    /// connecting or connected.
    pub fn connect(&self, endpoint: Option<&str>) -> Result<(), TetherError> {
        self.send(Command::Connect {
            endpoint: endpoint.map(str::to_owned),
        })
    }

    /// Leaves the room and closes the connection. No reconnect follows.
    pub fn disconnect(&self) -> Result<(), TetherError> {
        self.send(Command::Disconnect)
    }

    /// Sends a game action now if possible, otherwise holds it until the
    /// session is back in its room.
    pub fn send_action(
        &self,
        kind: impl Into<String>,
        payload: Value,
    ) -> Result<(), TetherError> {
        self.send(Command::SendAction {
            kind: kind.into(),
            payload,
        })
    }

    /// Asks the server for a full state snapshot, delivered as
    /// [`SessionEvent::StateSnapshot`].
    pub fn request_state_sync(&self) -> Result<(), TetherError> {
        self.send(Command::RequestStateSync)
    }

    pub fn create_room(
        &self,
        display_name: impl Into<String>,
    ) -> Result<(), TetherError> {
        self.send(Command::CreateRoom {
            display_name: display_name.into(),
        })
    }

    pub fn join_room(
        &self,
        room_code: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<(), TetherError> {
        self.send(Command::JoinRoom {
            room_code: RoomCode::new(room_code),
            display_name: display_name.into(),
        })
    }

    /// A new receiver for every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The latest status.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// A receiver that is notified whenever the status changes.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.status.borrow().connection
    }

    pub fn run_state(&self) -> GameRunState {
        self.status.borrow().run_state.clone()
    }

    /// Tears the session down: cancels timers, stops latency probing,
    /// closes the connection, and drops any held actions.
    ///
    /// Waits up to the configured shutdown timeout for the actor to finish,
    /// then aborts it.
    pub async fn destroy(self) {
        let Self {
            commands,
            mut task,
            shutdown_timeout,
            ..
        } = self;

        let _ = commands.send(Command::Shutdown);
        drop(commands);

        match tokio::time::timeout(shutdown_timeout, &mut task).await {
            Ok(Ok(())) => tracing::debug!("session task finished"),
            Ok(Err(e)) => tracing::warn!(error = %e, "session task failed"),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = shutdown_timeout.as_millis() as u64,
                    "session task did not stop in time, aborting"
                );
                task.abort();
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), TetherError> {
        self.commands
            .send(command)
            .map_err(|_| TetherError::SessionClosed)
    }
}
