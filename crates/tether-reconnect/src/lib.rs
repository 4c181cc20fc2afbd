//! Connection lifecycle management for Tether.
//!
//! This crate owns the answer to "what state is the connection in, and
//! when do we try again?":
//!
//! - [`ConnectionState`]: the five-state lifecycle and its edge table
//! - [`ReconnectController`]: the only writer of that state; applies
//!   transport outcomes and schedules retries
//! - [`BackoffPolicy`] / [`RetryBudget`]: exponential backoff with a cap and
//!   a bounded number of automatic attempts
//! - [`Timer`]: a cancellable deadline that sits in a `tokio::select!` loop
//!
//! The controller does no I/O. Its owner (the session actor) performs the
//! dials and feeds the results back in, which keeps every transition
//! testable without a network.

mod backoff;
mod controller;
mod error;
mod state;
mod timer;

pub use backoff::{BackoffPolicy, RetryBudget};
pub use controller::{
    AttemptKind, ReconnectConfig, ReconnectController, Recovery,
};
pub use error::ReconnectError;
pub use state::ConnectionState;
pub use timer::Timer;
