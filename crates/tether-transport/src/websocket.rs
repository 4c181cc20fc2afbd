//! WebSocket connector implementation using `tokio-tungstenite`.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, Connector, TransportError};

/// Handshake response header a coordination server may use to assign the
/// connection's session token. When absent, a random token is generated.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials `ws://` / `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn connect(
        &self,
        endpoint: &str,
    ) -> Result<WebSocketConnection, TransportError> {
        let (ws, response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let session_token = response
            .headers()
            .get(SESSION_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .unwrap_or_else(generate_token);

        tracing::debug!(endpoint, %session_token, "WebSocket connected");

        // Split so a pending `recv` never holds the lock `send` needs.
        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            session_token,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single client-side WebSocket connection.
pub struct WebSocketConnection {
    session_token: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        // The coordination server speaks JSON, so UTF-8 goes out as text.
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(frame))) => {
                    return match frame {
                        Some(frame) if !is_deliberate_close(&frame) => {
                            Err(TransportError::ConnectionClosed(format!(
                                "server closed with {}: {}",
                                u16::from(frame.code),
                                frame.reason.as_str()
                            )))
                        }
                        _ => Ok(None),
                    };
                }
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
                // Stream ended without a close frame.
                None => {
                    return Err(TransportError::ConnectionClosed(
                        "stream ended without close frame".into(),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn session_token(&self) -> &str {
        &self.session_token
    }
}

/// Whether a close frame means the server does not want us back.
///
/// Only a normal closure or a rejection of this client's traffic counts.
/// Going away, server errors and "restart / try again" codes describe an
/// outage and surface as a lost connection so the session reconnects.
fn is_deliberate_close(frame: &CloseFrame) -> bool {
    matches!(
        frame.code,
        CloseCode::Normal
            | CloseCode::Policy
            | CloseCode::Protocol
            | CloseCode::Unsupported
            | CloseCode::Invalid
            | CloseCode::Size
            | CloseCode::Extension
    )
}

/// Generates a random 128-bit token, hex-encoded (32 chars).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
