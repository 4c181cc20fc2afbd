/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// `connect` was called while an attempt is in flight or a
    /// connection is already open.
    #[error("transport is already connecting or connected")]
    AlreadyActive,

    /// `send` was called with no open connection. Queuing is the caller's
    /// job, not the transport's.
    #[error("transport is not connected")]
    NotConnected,

    /// Dialing the endpoint failed (DNS, refused, handshake rejected...).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
