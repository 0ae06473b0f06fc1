//! WebSocket feed server.
//!
//! Each connection subscribes to the [`BroadcastHub`] and receives every
//! mutation published after it connected. The server answers Ping with
//! Pong; everything else flows one way, hub → viewer. Lagged receivers
//! are logged and keep going from the oldest buffered message — missed
//! events are gone for that connection (viewers resync via snapshot).

use std::net::SocketAddr;
use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

use crate::broadcast::BroadcastHub;
use crate::protocol::{FeedMessage, MessageType, ViewerInfo};

/// Feed server configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Broadcast channel capacity per connection
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            capacity: 256,
        }
    }
}

/// The mutation feed server.
pub struct FeedServer {
    hub: Arc<BroadcastHub>,
    listener: TcpListener,
}

impl FeedServer {
    /// Bind the listener. The bound address is available via
    /// [`local_addr`](Self::local_addr) before [`run`](Self::run) is
    /// called, which lets tests bind port 0.
    pub async fn bind(config: &FeedConfig, hub: Arc<BroadcastHub>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        log::info!("Feed server listening on {}", listener.local_addr()?);
        Ok(Self { hub, listener })
    }

    /// The actual bound address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever. Call from an async runtime.
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            log::debug!("New feed connection from {addr}");
            let hub = self.hub.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, hub).await {
                    log::error!("Feed connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single viewer connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        hub: Arc<BroadcastHub>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        // Subscribe immediately: a viewer that never sends Hello still
        // gets the feed, just without display metadata.
        let mut viewer = ViewerInfo::anonymous();
        let mut viewer_id = viewer.viewer_id;
        let mut hub_rx = hub.add_viewer(viewer.clone()).await;

        log::info!("Viewer connected from {addr}");

        loop {
            tokio::select! {
                // Incoming WebSocket message
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Binary(data))) => {
                            let bytes: Vec<u8> = data.into();
                            match FeedMessage::decode(&bytes) {
                                Ok(feed_msg) => match feed_msg.msg_type {
                                    MessageType::Hello => {
                                        if let Ok(info) = feed_msg.viewer_info() {
                                            hub.remove_viewer(&viewer_id).await;
                                            viewer_id = info.viewer_id;
                                            viewer = info.clone();
                                            // Re-registering keeps the existing
                                            // receiver; only metadata changes.
                                            let _ = hub.add_viewer(info).await;
                                            log::info!(
                                                "Viewer {} ({}) identified from {addr}",
                                                viewer.name,
                                                viewer_id
                                            );
                                        }
                                    }
                                    MessageType::Ping => {
                                        let pong = FeedMessage::pong(viewer_id);
                                        let encoded = pong.encode()?;
                                        ws_sender.send(Message::Binary(encoded.into())).await?;
                                    }
                                    _ => {
                                        log::debug!("Ignoring {:?} from viewer", feed_msg.msg_type);
                                    }
                                },
                                Err(e) => {
                                    log::warn!("Failed to decode message from {addr}: {e}");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("Viewer disconnected from {addr}");
                            break;
                        }
                        Some(Err(e)) => {
                            log::error!("WebSocket error from {addr}: {e}");
                            break;
                        }
                        _ => {}
                    }
                }

                // Outgoing hub message
                msg = hub_rx.recv() => {
                    match msg {
                        Ok(data) => {
                            ws_sender.send(Message::Binary(data.to_vec().into())).await?;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            log::warn!("Viewer {viewer_id} lagged by {n} messages");
                        }
                        Err(_) => break,
                    }
                }
            }
        }

        hub.remove_viewer(&viewer_id).await;
        Ok(())
    }
}
