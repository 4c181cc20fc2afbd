//! Who we are to the coordination server.

use tether_protocol::RoomCode;

/// The parts of a session that outlive any single connection.
///
/// - `session_token` is replaced by every successful connection (the
///   transport assigns it) and sent with the rejoin request
/// - `room_code` / `display_name` are set by `roomCreated` / `roomJoined` /
///   `rejoinSuccess` and cleared on leave, kick, or a rejected rejoin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_token: Option<String>,
    pub room_code: Option<RoomCode>,
    pub display_name: Option<String>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if a reconnect should try to get us back into a room.
    pub fn in_room(&self) -> bool {
        self.room_code.is_some()
    }

    /// Records the room we now belong to. `display_name` is only replaced
    /// when one is given.
    pub fn enter_room(&mut self, code: RoomCode, display_name: Option<String>) {
        self.room_code = Some(code);
        if display_name.is_some() {
            self.display_name = display_name;
        }
    }

    /// Forgets the room. Returns the code we were in, if any.
    ///
    /// The session token stays: it belongs to the connection, not the room.
    pub fn clear_room(&mut self) -> Option<RoomCode> {
        self.display_name = None;
        self.room_code.take()
    }
}
