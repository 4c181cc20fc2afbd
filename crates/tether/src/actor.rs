//! The session actor: one task that owns the whole reconnection layer.
//!
//! ```text
//!                 ┌────────── SessionActor ───────────┐
//! Session ──cmd──→│ controller  transport  reconciler │──events──→ subscribers
//!                 │ queue       latency    liaison    │──status──→ watchers
//!                 └───────────────────────────────────┘
//! ```
//!
//! Everything happens inside one `tokio::select!` loop: commands from the
//! handle, transport events, the retry, connect and rejoin timers, and the
//! latency probe. Nothing is shared, so there are no locks and inbound messages are
//! handled strictly in arrival order.

use serde_json::Value;
use tether_protocol::{ClientMessage, Codec, JsonCodec, ServerMessage};
use tether_reconnect::{ConnectionState, ReconnectController, Recovery, Timer};
use tether_session::{
    ActionRoute, GameLoopLiaison, LatencyMonitor, OutboundQueue, PauseReason,
    SessionError, SessionIdentity, SessionReconciler,
};
use tether_transport::{
    Connector, DisconnectReason, TransportAdapter, TransportEvent,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::session::Command;
use crate::{SessionConfig, SessionEvent, SessionStatus, TetherError};

pub(crate) struct SessionActor<C: Connector> {
    config: SessionConfig,
    endpoint: String,
    transport: TransportAdapter<C>,
    controller: ReconnectController,
    queue: OutboundQueue,
    latency: LatencyMonitor,
    liaison: GameLoopLiaison,
    reconciler: SessionReconciler,
    /// Armed while a rejoin request waits for its answer.
    rejoin_timer: Timer,
    identity: SessionIdentity,
    /// Display name sent with the last create/join, adopted on success.
    pending_display_name: Option<String>,
    /// The automatic attempt in progress or scheduled next.
    attempt: u32,
    codec: JsonCodec,
    commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

impl<C: Connector> SessionActor<C> {
    pub(crate) fn new(
        connector: C,
        config: SessionConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        events: broadcast::Sender<SessionEvent>,
        status: watch::Sender<SessionStatus>,
    ) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            transport: TransportAdapter::new(connector),
            controller: ReconnectController::new(config.reconnect_config()),
            queue: OutboundQueue::new(config.queue_capacity, config.queue_ttl()),
            latency: LatencyMonitor::new(config.ping_interval()),
            liaison: GameLoopLiaison::new(),
            reconciler: SessionReconciler::new(),
            rejoin_timer: Timer::new(),
            identity: SessionIdentity::new(),
            pending_display_name: None,
            attempt: 0,
            codec: JsonCodec,
            commands,
            events,
            status,
            config,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(endpoint = %self.endpoint, "session started");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = self.transport.next_event() => self.handle_transport(event),
                _ = self.controller.connect_timer().wait() => self.on_connect_timeout(),
                _ = self.controller.retry_timer().wait() => self.on_retry_due(),
                _ = self.rejoin_timer.wait() => self.on_rejoin_timeout(),
                _ = self.latency.timer().wait() => self.on_probe_due(),
            }
            self.publish_status();
        }

        self.teardown();
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { endpoint } => self.connect(endpoint),
            Command::Disconnect => self.leave(),
            Command::SendAction { kind, payload } => self.send_action(kind, payload),
            Command::RequestStateSync => {
                let request = self.reconciler.state_sync_request();
                if let Err(e) = self.send_message(&request) {
                    debug!(error = %e, "state sync request not sent");
                }
            }
            Command::CreateRoom { display_name } => {
                let message = ClientMessage::CreateRoom {
                    display_name: display_name.clone(),
                };
                self.send_room_request(message, display_name);
            }
            Command::JoinRoom {
                room_code,
                display_name,
            } => {
                let message = ClientMessage::JoinRoom {
                    room_code,
                    display_name: display_name.clone(),
                };
                self.send_room_request(message, display_name);
            }
            // Handled by the loop.
            Command::Shutdown => {}
        }
    }

    fn connect(&mut self, endpoint: Option<String>) {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        let from = self.controller.state();
        if let Err(e) = self.controller.begin_connect() {
            debug!(error = %e, "connect ignored");
            return;
        }
        self.attempt = 0;
        self.announce(from);
        self.dial();
    }

    fn send_action(&mut self, kind: String, payload: Value) {
        let online = self.controller.state().is_connected()
            && !self.reconciler.is_awaiting();
        let ready = online && self.queue.is_empty();

        let transport = &self.transport;
        let codec = &self.codec;
        let route = self.liaison.send_action(
            ready,
            &mut self.queue,
            kind,
            payload,
            |kind, payload| send_action_frame(transport, codec, kind, payload),
        );

        // Something is still held from a partial flush; keep the order by
        // pushing it all through the queue.
        if online && matches!(route, ActionRoute::Queued { .. }) {
            self.flush_queue();
        }
    }

    fn send_room_request(&mut self, message: ClientMessage, display_name: String) {
        match self.send_message(&message) {
            Ok(()) => self.pending_display_name = Some(display_name),
            Err(e) => self.emit(SessionEvent::JoinError {
                message: e.to_string(),
            }),
        }
    }

    /// Explicit leave: tell the server, then tear down in order.
    fn leave(&mut self) {
        if self.identity.in_room() && self.transport.is_connected() {
            if let Err(e) = self.send_message(&ClientMessage::LeaveRoom) {
                debug!(error = %e, "leave notice not sent");
            }
        }

        let from = self.controller.state();
        self.controller.leave();
        self.latency.stop();
        self.transport.close();

        self.abandon_rejoin();
        let dropped = self.queue.clear();
        if let Some(room) = self.identity.clear_room() {
            info!(%room, dropped, "left room");
        }
        self.attempt = 0;
        self.announce(from);
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { session_token } => self.on_connected(session_token),
            TransportEvent::ConnectionError(message) => self.on_attempt_failed(&message),
            TransportEvent::Disconnected(reason) => self.on_disconnected(reason),
            TransportEvent::Message(bytes) => self.on_frame(&bytes),
        }
    }

    fn on_connected(&mut self, session_token: String) {
        let from = self.controller.state();
        if let Err(e) = self.controller.on_connected() {
            warn!(error = %e, "connection opened in unexpected state, closing it");
            self.transport.close();
            return;
        }
        self.attempt = 0;
        info!(endpoint = %self.endpoint, %session_token, "connected");
        self.announce(from);
        self.latency.start();

        // The rejoin carries the previous connection's token.
        let rejoin = self.reconciler.begin_rejoin(&self.identity);
        self.identity.session_token = Some(session_token);

        match rejoin {
            Ok(request) => match self.send_message(&request) {
                Ok(()) => {
                    self.rejoin_timer.schedule(self.config.rejoin_timeout());
                }
                Err(e) => {
                    warn!(error = %e, "rejoin request not sent");
                    self.abandon_rejoin();
                }
            },
            Err(SessionError::NotInRoom) => {
                if self.liaison.resume_after_reconnect() {
                    self.emit(SessionEvent::GameResumed);
                }
                self.flush_queue();
            }
            Err(e) => warn!(error = %e, "rejoin not started"),
        }
    }

    fn on_attempt_failed(&mut self, reason: &str) {
        let from = self.controller.state();
        match self.controller.on_attempt_failed(reason) {
            Ok(recovery) => {
                self.announce(from);
                self.handle_recovery(recovery);
            }
            Err(e) => debug!(error = %e, "stale attempt failure ignored"),
        }
    }

    fn on_disconnected(&mut self, reason: DisconnectReason) {
        self.latency.stop();
        self.abandon_rejoin();

        let from = self.controller.state();
        if reason.is_intentional() {
            match self.controller.on_closed_intentionally(&reason.to_string()) {
                Ok(()) => self.announce(from),
                Err(e) => debug!(error = %e, "close ignored"),
            }
            return;
        }

        match self.controller.on_connection_lost(&reason.to_string()) {
            Ok(recovery) => {
                self.announce(from);
                if self.liaison.pause(PauseReason::ConnectionLost) {
                    self.emit(SessionEvent::GamePaused {
                        reason: PauseReason::ConnectionLost,
                    });
                }
                self.handle_recovery(recovery);
            }
            Err(e) => debug!(error = %e, "disconnect ignored"),
        }
    }

    fn handle_recovery(&mut self, recovery: Recovery) {
        match recovery {
            Recovery::RetryScheduled { attempt, .. } => self.attempt = attempt,
            Recovery::Exhausted(e) => {
                self.attempt = 0;
                self.emit(SessionEvent::NetworkError {
                    message: e.to_string(),
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    fn on_retry_due(&mut self) {
        let from = self.controller.state();
        match self.controller.on_retry_due() {
            Ok(attempt) => {
                self.attempt = attempt;
                self.announce(from);
                self.emit(SessionEvent::ReconnectAttempt {
                    attempt,
                    max: self.config.max_reconnect_attempts,
                });
                self.dial();
            }
            Err(e) => warn!(error = %e, "retry not started"),
        }
    }

    fn on_connect_timeout(&mut self) {
        // Abort the dial first so its late outcome is discarded.
        self.transport.close();
        self.on_attempt_failed("connection attempt timed out");
    }

    fn on_probe_due(&mut self) {
        let Some(timestamp) = self.latency.on_probe_due() else {
            return;
        };
        if let Err(e) = self.send_message(&ClientMessage::Ping { timestamp }) {
            debug!(error = %e, "latency probe not sent");
        }
    }

    fn on_rejoin_timeout(&mut self) {
        if !self.reconciler.is_awaiting() {
            self.rejoin_timer.cancel();
            return;
        }
        self.on_rejoin_rejected("no reply to rejoin request".to_string());
    }

    fn dial(&mut self) {
        if !self.transport.is_idle() {
            self.transport.close();
        }
        if let Err(e) = self.transport.connect(&self.endpoint) {
            warn!(error = %e, "dial not started");
        }
    }

    // -----------------------------------------------------------------------
    // Inbound messages
    // -----------------------------------------------------------------------

    fn on_frame(&mut self, bytes: &[u8]) {
        let decoded = self
            .codec
            .decode::<ServerMessage>(bytes)
            .and_then(|message| message.validate().map(|()| message));
        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, len = bytes.len(), "dropping undecodable frame");
                return;
            }
        };
        debug!(kind = message.kind(), "inbound message");

        match message {
            ServerMessage::RoomCreated { room } | ServerMessage::RoomJoined { room } => {
                self.identity
                    .enter_room(room.code.clone(), self.pending_display_name.take());
                info!(room = %room.code, "entered room");
                self.emit(SessionEvent::RoomUpdate(room));
            }
            ServerMessage::RoomUpdate { room } => self.emit(SessionEvent::RoomUpdate(room)),
            ServerMessage::JoinError { message } => {
                self.pending_display_name = None;
                self.emit(SessionEvent::JoinError { message });
            }
            ServerMessage::GameStart { room } => {
                self.emit(SessionEvent::GameStarted(room));
                // Rejoined a lobby while paused for the outage.
                if self.liaison.resume_after_reconnect() {
                    self.emit(SessionEvent::GameResumed);
                }
            }
            ServerMessage::PlayerJoined { player } => {
                self.emit(SessionEvent::PlayerJoined(player))
            }
            ServerMessage::PlayerDisconnected { player } => {
                self.emit(SessionEvent::PlayerDisconnected(player))
            }
            ServerMessage::RejoinSuccess { room } => {
                self.rejoin_timer.cancel();
                let rejoined = self.reconciler.on_rejoin_success(
                    room,
                    &mut self.identity,
                    &mut self.liaison,
                );
                self.emit(SessionEvent::RoomUpdate(rejoined.room));
                if rejoined.resumed {
                    self.emit(SessionEvent::GameResumed);
                }
                self.flush_queue();
            }
            ServerMessage::RejoinError { message } => self.on_rejoin_rejected(message),
            ServerMessage::GameStateSync { state } => {
                self.emit(SessionEvent::StateSnapshot(state))
            }
            ServerMessage::GamePaused { reason } => {
                if self.liaison.pause(PauseReason::Server(reason.clone())) {
                    self.emit(SessionEvent::GamePaused {
                        reason: PauseReason::Server(reason),
                    });
                }
            }
            ServerMessage::GameResumed => {
                if self.liaison.resume() {
                    self.emit(SessionEvent::GameResumed);
                }
            }
            ServerMessage::Kicked { reason } => self.on_kicked(reason),
            ServerMessage::Pong { timestamp } => {
                if let Some(sample) = self.latency.on_pong(timestamp) {
                    self.emit(SessionEvent::LatencyUpdated {
                        round_trip_ms: sample.round_trip_ms,
                        quality: sample.quality(),
                    });
                }
            }
            ServerMessage::Action { kind, payload } => {
                self.emit(SessionEvent::ActionReceived { kind, payload })
            }
        }
    }

    /// The server refused the rejoin, or never answered it.
    fn on_rejoin_rejected(&mut self, message: String) {
        self.rejoin_timer.cancel();
        let failure = self.reconciler.on_rejoin_error(
            message,
            &mut self.identity,
            &mut self.queue,
            &mut self.liaison,
        );
        self.emit(SessionEvent::JoinError {
            message: failure.error.to_string(),
        });
        if failure.resumed {
            self.emit(SessionEvent::GameResumed);
        }
    }

    fn abandon_rejoin(&mut self) {
        self.rejoin_timer.cancel();
        self.reconciler.reset();
    }

    /// Removed by the server: terminal, never retried.
    fn on_kicked(&mut self, reason: String) {
        warn!(error = %SessionError::Kicked(reason.clone()), "removed from session");

        let from = self.controller.state();
        if let Err(e) = self.controller.on_closed_intentionally("kicked") {
            debug!(error = %e, "kick while not connected");
        }
        self.latency.stop();
        self.transport.close();

        self.abandon_rejoin();
        self.queue.clear();
        self.identity.clear_room();
        self.attempt = 0;
        self.announce(from);
        self.emit(SessionEvent::Kicked { reason });
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    fn send_message(&self, message: &ClientMessage) -> Result<(), TetherError> {
        send_frame(&self.transport, &self.codec, message)
    }

    fn flush_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let transport = &self.transport;
        let codec = &self.codec;
        let report = self.queue.flush(Instant::now(), |kind, payload| {
            send_action_frame(transport, codec, kind, payload)
        });
        debug!(
            sent = report.sent,
            expired = report.expired,
            remaining = report.remaining,
            "outbound queue flushed"
        );
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Emits the transition events if the controller moved.
    fn announce(&self, from: ConnectionState) {
        let to = self.controller.state();
        if from == to {
            return;
        }
        debug!(%from, %to, "session state");
        self.emit(SessionEvent::StateChanged { from, to });
        if from.is_connected() != to.is_connected() {
            self.emit(SessionEvent::ConnectionChanged {
                connected: to.is_connected(),
            });
        }
    }

    fn publish_status(&self) {
        let status = SessionStatus {
            connection: self.controller.state(),
            attempt: self.attempt,
            max_attempts: self.config.max_reconnect_attempts,
            run_state: self.liaison.state().clone(),
            identity: self.identity.clone(),
            latency: self.latency.latest(),
            quality: self.latency.quality(),
            queued: self.queue.len(),
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    /// Timers first, then latency, then the transport.
    fn teardown(&mut self) {
        let from = self.controller.state();
        self.controller.leave();
        self.latency.stop();
        self.transport.close();

        self.abandon_rejoin();
        let dropped = self.queue.clear();
        self.attempt = 0;
        self.announce(from);
        self.publish_status();
        info!(dropped, "session stopped");
    }
}

fn send_frame<C: Connector>(
    transport: &TransportAdapter<C>,
    codec: &JsonCodec,
    message: &ClientMessage,
) -> Result<(), TetherError> {
    let bytes = codec.encode(message)?;
    transport.send(bytes)?;
    Ok(())
}

fn send_action_frame<C: Connector>(
    transport: &TransportAdapter<C>,
    codec: &JsonCodec,
    kind: &str,
    payload: &Value,
) -> Result<(), TetherError> {
    let message = ClientMessage::Action {
        kind: kind.to_string(),
        payload: payload.clone(),
    };
    send_frame(transport, codec, &message)
}
