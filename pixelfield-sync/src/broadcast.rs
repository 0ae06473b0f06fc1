//! Fan-out of accepted mutations to every connected viewer.
//!
//! One canvas, one hub: all viewers share a single tokio broadcast
//! channel. Each connection gets an independent receiver buffering up to
//! `capacity` messages; a receiver that falls further behind drops the
//! oldest messages (best-effort delivery, ordered per connection).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::protocol::{FeedMessage, ProtocolError, ViewerInfo};

/// Statistics for monitoring hub health.
#[derive(Debug, Clone, Default)]
pub struct HubStats {
    pub messages_sent: u64,
    pub active_viewers: usize,
}

/// The single-canvas broadcast hub.
pub struct BroadcastHub {
    /// Broadcast channel sender
    sender: broadcast::Sender<Arc<Vec<u8>>>,
    /// Connected viewers
    viewers: Arc<RwLock<HashMap<Uuid, ViewerInfo>>>,
    /// Channel capacity (messages buffered per receiver)
    capacity: usize,
    /// Lock-free publish counter
    messages_sent: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub with the given per-receiver buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            viewers: Arc::new(RwLock::new(HashMap::new())),
            capacity,
            messages_sent: AtomicU64::new(0),
        }
    }

    /// Register a viewer and return its receiver.
    pub async fn add_viewer(&self, info: ViewerInfo) -> broadcast::Receiver<Arc<Vec<u8>>> {
        let mut viewers = self.viewers.write().await;
        viewers.insert(info.viewer_id, info);
        self.sender.subscribe()
    }

    /// Remove a viewer.
    pub async fn remove_viewer(&self, viewer_id: &Uuid) -> Option<ViewerInfo> {
        let mut viewers = self.viewers.write().await;
        viewers.remove(viewer_id)
    }

    /// Publish a message to all connected viewers.
    ///
    /// Returns the number of receivers; zero is not an error (fire-and-
    /// forget — an empty audience must never fail the write that caused
    /// the publish).
    pub fn publish(&self, msg: &FeedMessage) -> Result<usize, ProtocolError> {
        let encoded = msg.encode()?;
        Ok(self.publish_raw(Arc::new(encoded)))
    }

    /// Publish pre-encoded bytes (zero-copy fast path, fully lock-free).
    pub fn publish_raw(&self, encoded: Arc<Vec<u8>>) -> usize {
        let count = self.sender.send(encoded).unwrap_or(0);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Subscribe without registering viewer metadata.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<u8>>> {
        self.sender.subscribe()
    }

    /// Current viewer count.
    pub async fn viewer_count(&self) -> usize {
        self.viewers.read().await.len()
    }

    /// Snapshot of hub statistics.
    pub async fn stats(&self) -> HubStats {
        HubStats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            active_viewers: self.viewers.read().await.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelfield_core::PixelEvent;

    fn sample_event(x: u32) -> PixelEvent {
        PixelEvent {
            x,
            y: 0,
            color: "#ffffff".to_string(),
            agent_id: "bot-a".to_string(),
            agent_hash: None,
            ts: 1,
        }
    }

    #[tokio::test]
    async fn test_add_remove_viewer() {
        let hub = BroadcastHub::new(16);
        let info = ViewerInfo::new("spectator");
        let id = info.viewer_id;

        let _rx = hub.add_viewer(info).await;
        assert_eq!(hub.viewer_count().await, 1);

        hub.remove_viewer(&id).await;
        assert_eq!(hub.viewer_count().await, 0);
    }

    #[tokio::test]
    async fn test_fan_out_to_all_receivers() {
        let hub = BroadcastHub::new(16);
        let mut rx1 = hub.add_viewer(ViewerInfo::new("a")).await;
        let mut rx2 = hub.add_viewer(ViewerInfo::new("b")).await;

        let msg = FeedMessage::pixel(&sample_event(5)).unwrap();
        let count = hub.publish(&msg).unwrap();
        assert_eq!(count, 2);

        for rx in [&mut rx1, &mut rx2] {
            let bytes = rx.recv().await.unwrap();
            let decoded = FeedMessage::decode(&bytes).unwrap();
            assert_eq!(decoded.pixel_event().unwrap().x, 5);
        }
    }

    #[tokio::test]
    async fn test_publish_without_viewers_is_not_an_error() {
        let hub = BroadcastHub::new(16);
        let msg = FeedMessage::pixel(&sample_event(0)).unwrap();
        assert_eq!(hub.publish(&msg).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_per_receiver_ordering() {
        let hub = BroadcastHub::new(64);
        let mut rx = hub.add_viewer(ViewerInfo::new("a")).await;

        for x in 0..10 {
            hub.publish(&FeedMessage::pixel(&sample_event(x)).unwrap()).unwrap();
        }
        for x in 0..10 {
            let bytes = rx.recv().await.unwrap();
            let decoded = FeedMessage::decode(&bytes).unwrap();
            assert_eq!(decoded.pixel_event().unwrap().x, x);
        }
    }

    #[tokio::test]
    async fn test_stats() {
        let hub = BroadcastHub::new(16);
        let _rx = hub.add_viewer(ViewerInfo::new("a")).await;
        hub.publish(&FeedMessage::pixel(&sample_event(0)).unwrap()).unwrap();
        hub.publish(&FeedMessage::pixel(&sample_event(1)).unwrap()).unwrap();

        let stats = hub.stats().await;
        assert_eq!(stats.messages_sent, 2);
        assert_eq!(stats.active_viewers, 1);
        assert_eq!(hub.capacity(), 16);
    }
}
