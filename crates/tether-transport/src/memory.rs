//! An in-memory [`Connector`] for tests and offline development.
//!
//! [`pair`] returns a connector and a [`MemoryListener`]. Every dial the
//! connector makes is resolved according to the listener's script and, when
//! accepted, shows up on the listener as a [`MemoryPeer`]: the server side of
//! that connection. Through the peer a test can push frames to the client,
//! read what the client sent, and end the connection either politely
//! ([`MemoryPeer::close`]) or abruptly ([`MemoryPeer::drop_connection`]).
//!
//! ```rust,ignore
//! let (connector, mut listener) = tether_transport::memory::pair();
//! listener.script(Dial::Refuse("maintenance".into()));
//! // first dial is refused, later dials are accepted
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{Connection, Connector, TransportError};

/// How the listener answers one dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dial {
    /// Open the connection.
    Accept,
    /// Fail the dial with this message.
    Refuse(String),
    /// Never answer (exercises connect timeouts).
    Hang,
}

/// Frames travelling server → client.
enum PeerFrame {
    Data(Vec<u8>),
    Close,
    Drop,
}

#[derive(Default)]
struct Script {
    /// Consumed front to back; an empty script accepts.
    pending: VecDeque<Dial>,
    /// When each dial happened, in order.
    dials: Vec<Instant>,
    next_token: u64,
}

/// Creates a connected connector/listener pair.
pub fn pair() -> (MemoryConnector, MemoryListener) {
    let script = Arc::new(Mutex::new(Script::default()));
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    (
        MemoryConnector {
            script: Arc::clone(&script),
            accepted: accepted_tx,
        },
        MemoryListener {
            script,
            accepted: accepted_rx,
        },
    )
}

/// Client side: hand this to a [`TransportAdapter`](crate::TransportAdapter).
pub struct MemoryConnector {
    script: Arc<Mutex<Script>>,
    accepted: mpsc::UnboundedSender<MemoryPeer>,
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;
    type Error = TransportError;

    async fn connect(
        &self,
        endpoint: &str,
    ) -> Result<MemoryConnection, TransportError> {
        let (dial, token) = {
            let mut script = lock(&self.script);
            script.dials.push(Instant::now());
            script.next_token += 1;
            let dial = script.pending.pop_front().unwrap_or(Dial::Accept);
            (dial, format!("mem-{}", script.next_token))
        };

        match dial {
            Dial::Accept => {}
            Dial::Refuse(reason) => {
                return Err(TransportError::ConnectFailed(format!(
                    "{endpoint}: {reason}"
                )));
            }
            Dial::Hang => std::future::pending::<()>().await,
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            session_token: token.clone(),
            to_client,
            from_client,
        };
        self.accepted
            .send(peer)
            .map_err(|_| TransportError::ConnectFailed("listener gone".into()))?;

        Ok(MemoryConnection {
            session_token: token,
            inbound: tokio::sync::Mutex::new(from_server),
            outbound: to_server,
        })
    }
}

/// Client side of one in-memory connection.
pub struct MemoryConnection {
    session_token: String,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<PeerFrame>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer gone".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.inbound.lock().await.recv().await {
            Some(PeerFrame::Data(bytes)) => Ok(Some(bytes)),
            Some(PeerFrame::Close) => Ok(None),
            Some(PeerFrame::Drop) | None => Err(
                TransportError::ConnectionClosed("peer dropped".into()),
            ),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn session_token(&self) -> &str {
        &self.session_token
    }
}

/// Server side of the in-memory transport.
pub struct MemoryListener {
    script: Arc<Mutex<Script>>,
    accepted: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Appends an answer for a future dial. Unscripted dials are accepted.
    pub fn script(&self, dial: Dial) {
        lock(&self.script).pending.push_back(dial);
    }

    /// Waits for the next accepted connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accepted.recv().await
    }

    /// Returns an accepted connection if one is ready.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.accepted.try_recv().ok()
    }

    /// When every dial so far happened.
    pub fn dials(&self) -> Vec<Instant> {
        lock(&self.script).dials.clone()
    }

    /// How many dials were made so far.
    pub fn dial_count(&self) -> usize {
        lock(&self.script).dials.len()
    }
}

/// The server's view of one accepted connection.
pub struct MemoryPeer {
    session_token: String,
    to_client: mpsc::UnboundedSender<PeerFrame>,
    from_client: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryPeer {
    /// The token handed to the client for this connection.
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// Pushes a frame to the client.
    pub fn send(&self, data: impl Into<Vec<u8>>) {
        let _ = self.to_client.send(PeerFrame::Data(data.into()));
    }

    /// Waits for the next frame the client sent.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.from_client.recv().await
    }

    /// Returns the next frame the client sent, if one is buffered.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.from_client.try_recv().ok()
    }

    /// Closes the connection deliberately (like a close frame).
    pub fn close(&self) {
        let _ = self.to_client.send(PeerFrame::Close);
    }

    /// Kills the connection without a close frame.
    pub fn drop_connection(&self) {
        let _ = self.to_client.send(PeerFrame::Drop);
    }
}

fn lock(script: &Mutex<Script>) -> std::sync::MutexGuard<'_, Script> {
    // A panicking test thread can poison the lock; the script is still usable.
    script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
