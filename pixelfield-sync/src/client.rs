//! WebSocket feed client.
//!
//! Connects to a [`FeedServer`](crate::server::FeedServer), decodes the
//! binary feed, and surfaces it as a stream of [`FeedEvent`]s. Reconnects
//! with capped exponential backoff; every successful (re)connection emits
//! [`FeedEvent::Connected`] so the consumer knows to refetch a snapshot —
//! mutations published while disconnected were missed for good.

use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{FeedMessage, MessageType, ProtocolError, ViewerInfo};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Events emitted by the feed client.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Connection established (or re-established). The consumer must
    /// refetch a snapshot before applying subsequent pixels.
    Connected,
    /// Connection lost; the client will retry if [`FeedClient::run`] drives it.
    Disconnected,
    /// One accepted pixel mutation
    Pixel(pixelfield_core::PixelEvent),
}

/// The feed client.
///
/// Manages a WebSocket connection to the feed server and relays decoded
/// pixel mutations to the application.
pub struct FeedClient {
    /// Our viewer identity
    info: ViewerInfo,

    /// Connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Channel to send messages to the WebSocket writer task
    outgoing_tx: Option<mpsc::Sender<Vec<u8>>>,

    /// Event receiver for the application
    event_rx: Option<mpsc::Receiver<FeedEvent>>,

    /// Event sender (held by connection tasks)
    event_tx: mpsc::Sender<FeedEvent>,

    /// Server URL
    server_url: String,
}

impl FeedClient {
    /// Create a new feed client.
    pub fn new(info: ViewerInfo, server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            info,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            server_url: server_url.into(),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<FeedEvent>> {
        self.event_rx.take()
    }

    /// Connect to the server.
    ///
    /// Spawns background tasks for reading/writing WebSocket messages
    /// and returns once the handshake completes.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_result = tokio_tungstenite::connect_async(&self.server_url).await;
        let (ws_stream, _) = match ws_result {
            Ok(ok) => ok,
            Err(e) => {
                log::warn!("Feed dial to {} failed: {e}", self.server_url);
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };

        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward outgoing channel to WebSocket.
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(256);
        self.outgoing_tx = Some(out_tx);
        tokio::spawn(async move {
            while let Some(data) = out_rx.recv().await {
                if ws_writer.send(Message::Binary(data.into())).await.is_err() {
                    break;
                }
            }
        });

        // Identify ourselves before anything else.
        let hello = FeedMessage::hello(&self.info);
        let encoded = hello.encode()?;
        if let Some(ref tx) = self.outgoing_tx {
            tx.send(encoded)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed)?;
        }

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(FeedEvent::Connected).await;
        log::info!("Feed connected as viewer {}", self.info.viewer_id);

        // Reader task: decode the feed and relay pixels.
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        let outgoing = self.outgoing_tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Binary(data)) => {
                        let bytes: Vec<u8> = data.into();
                        match FeedMessage::decode(&bytes) {
                            Ok(feed_msg) => match feed_msg.msg_type {
                                MessageType::Pixel => {
                                    if let Ok(event) = feed_msg.pixel_event() {
                                        let _ = event_tx.send(FeedEvent::Pixel(event)).await;
                                    }
                                }
                                MessageType::Ping => {
                                    if let Some(ref tx) = outgoing {
                                        let pong = FeedMessage::pong(feed_msg.viewer_id);
                                        if let Ok(encoded) = pong.encode() {
                                            let _ = tx.send(encoded).await;
                                        }
                                    }
                                }
                                MessageType::Pong => {
                                    log::trace!("Feed pong");
                                }
                                MessageType::Hello => {}
                            },
                            Err(e) => log::warn!("Failed to decode feed message: {e}"),
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            // Connection lost
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(FeedEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Connect with automatic reconnection. Backoff doubles from 500ms
    /// up to 30s and resets after each successful connection.
    ///
    /// Runs forever; spawn it alongside the event consumer.
    pub async fn run(&mut self) {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match self.connect().await {
                Ok(()) => {
                    backoff = INITIAL_BACKOFF;
                    // Wait for the reader task to flip the state back.
                    while *self.state.read().await == ConnectionState::Connected {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
                Err(e) => {
                    log::warn!("Feed connection failed: {e}");
                }
            }
            *self.state.write().await = ConnectionState::Reconnecting;
            log::info!("Reconnecting to feed in {backoff:?}");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// Send a heartbeat ping.
    pub async fn send_ping(&self) -> Result<(), ProtocolError> {
        let msg = FeedMessage::ping(self.info.viewer_id);
        let encoded = msg.encode()?;
        if let Some(ref tx) = self.outgoing_tx {
            tx.send(encoded)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed)?;
        }
        Ok(())
    }

    /// Get the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Get our viewer info.
    pub fn viewer_info(&self) -> &ViewerInfo {
        &self.info
    }

    /// Get the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let info = ViewerInfo::new("spectator");
        let client = FeedClient::new(info.clone(), "ws://localhost:3001");

        assert_eq!(client.viewer_info().name, "spectator");
        assert_eq!(client.server_url(), "ws://localhost:3001");
    }

    #[tokio::test]
    async fn test_client_initial_state() {
        let client = FeedClient::new(ViewerInfo::new("spectator"), "ws://localhost:3001");
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_take_event_rx() {
        let mut client = FeedClient::new(ViewerInfo::new("spectator"), "ws://localhost:3001");
        assert!(client.take_event_rx().is_some());
        assert!(client.take_event_rx().is_none());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 9 (discard) is never listening locally.
        let mut client = FeedClient::new(ViewerInfo::new("spectator"), "ws://127.0.0.1:9");
        assert!(client.connect().await.is_err());
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    }

    #[test]
    fn test_connection_state_values() {
        assert_ne!(ConnectionState::Disconnected, ConnectionState::Connected);
        assert_ne!(ConnectionState::Connecting, ConnectionState::Reconnecting);
    }
}
