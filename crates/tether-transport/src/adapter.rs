//! The transport adapter: exclusive owner of the one live connection.
//!
//! Every dial, read and write runs in its own Tokio task and reports back
//! over a single internal channel, so [`TransportAdapter::next_event`] is the
//! only place events surface and they surface in arrival order.
//!
//! Each attempt is stamped with a generation number. Closing the adapter or
//! starting a new attempt bumps the generation, which turns anything still
//! in flight from the old attempt into noise that `next_event` drops.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    Connection, Connector, DisconnectReason, TransportError, TransportEvent,
};

/// Raw report from a background task, before generation filtering.
enum Signal<K> {
    Opened(K),
    Failed(String),
    Inbound(Vec<u8>),
    Closed(DisconnectReason),
}

struct Tagged<K> {
    generation: u64,
    signal: Signal<K>,
}

/// An established connection and the tasks pumping it.
struct Open<K> {
    conn: Arc<K>,
    session_token: String,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl<K> Open<K> {
    fn abort_tasks(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

enum Phase<K> {
    Idle,
    Connecting { task: JoinHandle<()> },
    Open(Open<K>),
}

/// Wraps a [`Connector`] and the single connection it produces.
///
/// None of the methods block: `connect` spawns the dial, `send` hands bytes
/// to a writer task, and `close` tears everything down synchronously. Frames
/// already passed to `send` are still written before the close handshake,
/// which finishes in the background.
pub struct TransportAdapter<C: Connector> {
    connector: Arc<C>,
    phase: Phase<C::Connection>,
    generation: u64,
    signal_tx: mpsc::UnboundedSender<Tagged<C::Connection>>,
    signal_rx: mpsc::UnboundedReceiver<Tagged<C::Connection>>,
}

impl<C: Connector> TransportAdapter<C> {
    /// Creates an idle adapter around `connector`.
    pub fn new(connector: C) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            connector: Arc::new(connector),
            phase: Phase::Idle,
            generation: 0,
            signal_tx,
            signal_rx,
        }
    }

    /// `true` when no attempt is in flight and no connection is open.
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// `true` while a dial is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self.phase, Phase::Connecting { .. })
    }

    /// `true` while a connection is open.
    pub fn is_connected(&self) -> bool {
        matches!(self.phase, Phase::Open(_))
    }

    /// The token of the open connection, if any.
    pub fn session_token(&self) -> Option<&str> {
        match &self.phase {
            Phase::Open(open) => Some(&open.session_token),
            _ => None,
        }
    }

    /// Starts one connection attempt to `endpoint`.
    ///
    /// The outcome arrives later from [`next_event`](Self::next_event) as
    /// either `Connected` or `ConnectionError`.
    ///
    /// # Errors
    /// [`TransportError::AlreadyActive`] if an attempt is in flight or a
    /// connection is open.
    pub fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        if !self.is_idle() {
            return Err(TransportError::AlreadyActive);
        }

        self.generation += 1;
        let generation = self.generation;
        let connector = Arc::clone(&self.connector);
        let tx = self.signal_tx.clone();
        let endpoint = endpoint.to_string();

        tracing::debug!(%endpoint, generation, "dialing");

        let task = tokio::spawn(async move {
            let signal = match connector.connect(&endpoint).await {
                Ok(conn) => Signal::Opened(conn),
                Err(e) => Signal::Failed(e.to_string()),
            };
            let _ = tx.send(Tagged { generation, signal });
        });

        self.phase = Phase::Connecting { task };
        Ok(())
    }

    /// Hands `data` to the writer task. Fire-and-forget.
    ///
    /// # Errors
    /// [`TransportError::NotConnected`] if no connection is open or the
    /// writer has already shut down.
    pub fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        match &self.phase {
            Phase::Open(open) => open
                .outbound
                .send(data)
                .map_err(|_| TransportError::NotConnected),
            _ => Err(TransportError::NotConnected),
        }
    }

    /// Cancels an in-flight attempt or closes the open connection.
    ///
    /// Idempotent. No event is emitted for a local close: the caller asked
    /// for it and already knows.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => return,
            Phase::Connecting { task } => {
                task.abort();
                tracing::debug!(generation = self.generation, "dial aborted");
            }
            Phase::Open(open) => {
                let Open {
                    conn,
                    outbound,
                    reader,
                    writer,
                    ..
                } = open;
                reader.abort();
                // Dropping the sender lets the writer drain what was already
                // handed to `send` and then exit.
                drop(outbound);
                // The close handshake is async; finish it off-thread if a
                // runtime is still around (it may not be during drop).
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            let _ = writer.await;
                            if let Err(e) = conn.close().await {
                                tracing::debug!(error = %e, "close handshake failed");
                            }
                        });
                    }
                    Err(_) => writer.abort(),
                }
                tracing::debug!(generation = self.generation, "connection closed locally");
            }
        }
        self.generation += 1;
    }

    /// Waits for the next event from the current attempt or connection.
    ///
    /// Cancel-safe: it is meant to sit in a `tokio::select!` loop. When the
    /// adapter is idle this pends until the next `connect`.
    pub async fn next_event(&mut self) -> TransportEvent {
        loop {
            let Some(tagged) = self.signal_rx.recv().await else {
                // Unreachable while `self.signal_tx` is alive.
                std::future::pending::<()>().await;
                continue;
            };

            if tagged.generation != self.generation {
                tracing::trace!(
                    stale = tagged.generation,
                    current = self.generation,
                    "discarding stale transport signal"
                );
                continue;
            }

            match tagged.signal {
                Signal::Opened(conn) => return self.install(conn),
                Signal::Failed(message) => {
                    self.phase = Phase::Idle;
                    return TransportEvent::ConnectionError(message);
                }
                Signal::Inbound(bytes) => return TransportEvent::Message(bytes),
                Signal::Closed(reason) => {
                    if let Phase::Open(open) =
                        std::mem::replace(&mut self.phase, Phase::Idle)
                    {
                        open.abort_tasks();
                    }
                    // Whichever of reader/writer noticed second is stale now.
                    self.generation += 1;
                    return TransportEvent::Disconnected(reason);
                }
            }
        }
    }

    /// Takes ownership of a freshly opened connection and starts pumping it.
    fn install(&mut self, conn: C::Connection) -> TransportEvent {
        let generation = self.generation;
        let session_token = conn.session_token().to_string();
        let conn = Arc::new(conn);

        let reader = {
            let conn = Arc::clone(&conn);
            let tx = self.signal_tx.clone();
            tokio::spawn(async move {
                loop {
                    let signal = match conn.recv().await {
                        Ok(Some(bytes)) => Signal::Inbound(bytes),
                        Ok(None) => Signal::Closed(DisconnectReason::ClosedByPeer),
                        Err(e) => Signal::Closed(DisconnectReason::Lost(e.to_string())),
                    };
                    let done = matches!(signal, Signal::Closed(_));
                    if tx.send(Tagged { generation, signal }).is_err() || done {
                        break;
                    }
                }
            })
        };

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let writer = {
            let conn = Arc::clone(&conn);
            let tx = self.signal_tx.clone();
            tokio::spawn(async move {
                while let Some(bytes) = outbound_rx.recv().await {
                    if let Err(e) = conn.send(&bytes).await {
                        let _ = tx.send(Tagged {
                            generation,
                            signal: Signal::Closed(DisconnectReason::Lost(
                                e.to_string(),
                            )),
                        });
                        break;
                    }
                }
            })
        };

        tracing::debug!(generation, %session_token, "connection open");

        self.phase = Phase::Open(Open {
            conn,
            session_token: session_token.clone(),
            outbound,
            reader,
            writer,
        });
        TransportEvent::Connected { session_token }
    }
}

impl<C: Connector> Drop for TransportAdapter<C> {
    fn drop(&mut self) {
        self.close();
    }
}
