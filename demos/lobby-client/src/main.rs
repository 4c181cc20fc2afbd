//! A terminal lobby client.
//!
//! ```text
//! lobby-client ws://127.0.0.1:8080 ada          # create a room
//! lobby-client ws://127.0.0.1:8080 bob KQZT     # join one
//! ```
//!
//! Anything typed is sent as a `chat` action. `/sync` requests a state
//! snapshot, `/leave` leaves the room, `/quit` exits. Kill the server to
//! watch the session pause, reconnect and rejoin.

use serde_json::json;
use tether::logging::{DEFAULT_FILTER, init_logging};
use tether::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

enum Input {
    Chat(String),
    Sync,
    Leave,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    match line.trim() {
        "" => None,
        "/sync" => Some(Input::Sync),
        "/leave" => Some(Input::Leave),
        "/quit" => Some(Input::Quit),
        text => Some(Input::Chat(text.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::ConnectionChanged { connected: true } => "online".into(),
        SessionEvent::ConnectionChanged { connected: false } => "offline".into(),
        SessionEvent::StateChanged { from, to } => format!("{from} -> {to}"),
        SessionEvent::NetworkError { message } => format!("gave up: {message}"),
        SessionEvent::ReconnectAttempt { attempt, max } => {
            format!("reconnecting ({attempt}/{max})")
        }
        SessionEvent::GamePaused { reason } => format!("paused: {reason}"),
        SessionEvent::GameResumed => "resumed".into(),
        SessionEvent::RoomUpdate(room) => format!(
            "room {} [{}] {} player(s)",
            room.code,
            room.status,
            room.players.len()
        ),
        SessionEvent::JoinError { message } => format!("join failed: {message}"),
        SessionEvent::GameStarted(room) => format!("game started in {}", room.code),
        SessionEvent::PlayerJoined(player) => format!("{} joined", player.name),
        SessionEvent::PlayerDisconnected(player) => format!("{} dropped", player.name),
        SessionEvent::StateSnapshot(state) => format!("snapshot: {state}"),
        SessionEvent::ActionReceived { kind, payload } => format!("{kind}: {payload}"),
        SessionEvent::LatencyUpdated {
            round_trip_ms,
            quality,
        } => format!("rtt {round_trip_ms} ms ({quality})"),
        SessionEvent::Kicked { reason } => format!("kicked: {reason}"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(DEFAULT_FILTER);

    let mut args = std::env::args().skip(1);
    let (Some(endpoint), Some(name)) = (args.next(), args.next()) else {
        eprintln!("usage: lobby-client <endpoint> <name> [room-code]");
        std::process::exit(2);
    };
    let room_code = args.next();

    let config = SessionConfig {
        endpoint,
        ..SessionConfig::default()
    };
    let session = Session::start(WebSocketConnector, config);
    let mut events = session.subscribe();
    session.connect(None)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut entered = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(missed = n, "event stream lagged");
                        continue;
                    }
                    Err(_) => break,
                };
                println!("* {}", describe(&event));

                match event {
                    // First connection: ask for a room. Later connections
                    // rejoin on their own.
                    SessionEvent::ConnectionChanged { connected: true } if !entered => {
                        entered = true;
                        match &room_code {
                            Some(code) => session.join_room(code.as_str(), name.as_str())?,
                            None => session.create_room(name.as_str())?,
                        }
                    }
                    SessionEvent::Kicked { .. } => break,
                    _ => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Some(Input::Chat(text)) => {
                        session.send_action("chat", json!({ "from": name, "text": text }))?
                    }
                    Some(Input::Sync) => session.request_state_sync()?,
                    Some(Input::Leave) => session.disconnect()?,
                    Some(Input::Quit) => break,
                    None => {}
                }
                let status = session.status();
                if let Some((attempt, max)) = status.progress() {
                    println!("  (held: {} queued, reconnecting {attempt}/{max})", status.queued);
                }
            }
        }
    }

    session.destroy().await;
    Ok(())
}
