//! Error types for the reconnection layer.

use crate::ConnectionState;

/// Errors the reconnection controller reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconnectError {
    /// A transition outside the lifecycle edge table was requested.
    /// The state is left unchanged.
    #[error("invalid connection transition {from} -> {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// Every automatic attempt failed. Terminal until a manual `connect()`.
    #[error("gave up reconnecting after {attempts} attempts")]
    BudgetExhausted { attempts: u32 },
}
