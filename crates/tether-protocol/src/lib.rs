//! Wire protocol for Tether.
//!
//! This crate defines the "language" a Tether client speaks with the
//! coordination server:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`RoomSnapshot`], etc.):
//!   the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the session
//! layer (identity, reconciliation). It doesn't know about connections or
//! retries; it only knows how to serialize and deserialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (ServerMessage) → Session (reconciliation)
//! ```
//!
//! Every inbound message kind is a variant of the closed [`ServerMessage`]
//! enum, so downstream code matches exhaustively instead of dispatching on
//! event-name strings.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, GameStatus, PlayerId, PlayerInfo, RoomCode, RoomSnapshot,
    ServerMessage,
};
