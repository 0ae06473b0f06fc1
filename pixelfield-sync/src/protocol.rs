//! Binary wire protocol for the mutation feed.
//!
//! Wire format (bincode-encoded):
//! ```text
//! ┌──────────┬───────────┬──────────┐
//! │ msg_type │ viewer_id │ payload  │
//! │ 1 byte   │ 16 bytes  │ variable │
//! └──────────┴───────────┴──────────┘
//! ```
//!
//! `Pixel` payloads carry a bincode-encoded [`PixelEvent`]; `Hello`
//! payloads a [`ViewerInfo`]. Ping/Pong have no payload.

use pixelfield_core::PixelEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message types for the feed protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Viewer handshake with display metadata
    Hello = 1,
    /// One accepted pixel mutation
    Pixel = 2,
    /// Heartbeat ping
    Ping = 3,
    /// Heartbeat pong
    Pong = 4,
}

/// Viewer identity with display metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewerInfo {
    pub viewer_id: Uuid,
    pub name: String,
}

impl ViewerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            viewer_id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Placeholder identity for connections that never send Hello.
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }
}

/// Top-level feed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMessage {
    pub msg_type: MessageType,
    pub viewer_id: Uuid,
    /// Message payload (varies by msg_type)
    pub payload: Vec<u8>,
}

impl FeedMessage {
    /// Create a viewer handshake message.
    pub fn hello(info: &ViewerInfo) -> Self {
        let payload = bincode::serde::encode_to_vec(info, bincode::config::standard())
            .unwrap_or_default();
        Self {
            msg_type: MessageType::Hello,
            viewer_id: info.viewer_id,
            payload,
        }
    }

    /// Create a pixel mutation message (server → viewers).
    pub fn pixel(event: &PixelEvent) -> Result<Self, ProtocolError> {
        let payload = bincode::serde::encode_to_vec(event, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))?;
        Ok(Self {
            msg_type: MessageType::Pixel,
            viewer_id: Uuid::nil(),
            payload,
        })
    }

    /// Create a ping message.
    pub fn ping(viewer_id: Uuid) -> Self {
        Self {
            msg_type: MessageType::Ping,
            viewer_id,
            payload: Vec::new(),
        }
    }

    /// Create a pong message.
    pub fn pong(viewer_id: Uuid) -> Self {
        Self {
            msg_type: MessageType::Pong,
            viewer_id,
            payload: Vec::new(),
        }
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(msg)
    }

    /// Parse a pixel payload.
    pub fn pixel_event(&self) -> Result<PixelEvent, ProtocolError> {
        if self.msg_type != MessageType::Pixel {
            return Err(ProtocolError::InvalidMessageType);
        }
        let (event, _) =
            bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
                .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(event)
    }

    /// Parse a hello payload.
    pub fn viewer_info(&self) -> Result<ViewerInfo, ProtocolError> {
        if self.msg_type != MessageType::Hello {
            return Err(ProtocolError::InvalidMessageType);
        }
        let (info, _) =
            bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
                .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(info)
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    InvalidMessageType,
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::InvalidMessageType => write!(f, "Invalid message type"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> PixelEvent {
        PixelEvent {
            x: 42,
            y: 17,
            color: "#22c55e".to_string(),
            agent_id: "bot-a".to_string(),
            agent_hash: Some("00000000000000ff".to_string()),
            ts: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_pixel_roundtrip() {
        let event = sample_event();
        let msg = FeedMessage::pixel(&event).unwrap();
        let encoded = msg.encode().unwrap();
        let decoded = FeedMessage::decode(&encoded).unwrap();

        assert_eq!(decoded.msg_type, MessageType::Pixel);
        assert_eq!(decoded.pixel_event().unwrap(), event);
    }

    #[test]
    fn test_hello_roundtrip() {
        let info = ViewerInfo::new("spectator");
        let msg = FeedMessage::hello(&info);
        let decoded = FeedMessage::decode(&msg.encode().unwrap()).unwrap();

        assert_eq!(decoded.msg_type, MessageType::Hello);
        assert_eq!(decoded.viewer_info().unwrap(), info);
    }

    #[test]
    fn test_ping_pong_roundtrip() {
        let id = Uuid::new_v4();
        let ping = FeedMessage::decode(&FeedMessage::ping(id).encode().unwrap()).unwrap();
        let pong = FeedMessage::decode(&FeedMessage::pong(id).encode().unwrap()).unwrap();
        assert_eq!(ping.msg_type, MessageType::Ping);
        assert_eq!(pong.msg_type, MessageType::Pong);
        assert_eq!(ping.viewer_id, id);
    }

    #[test]
    fn test_wrong_payload_accessor_errors() {
        let msg = FeedMessage::ping(Uuid::new_v4());
        assert!(msg.pixel_event().is_err());
        assert!(msg.viewer_info().is_err());
    }

    #[test]
    fn test_decode_garbage_errors() {
        assert!(FeedMessage::decode(&[0xFF, 0xFE, 0xFD]).is_err());
    }

    #[test]
    fn test_pixel_message_compact() {
        let msg = FeedMessage::pixel(&sample_event()).unwrap();
        let encoded = msg.encode().unwrap();
        // 1 type + 16 viewer + length prefixes + short strings; generous bound.
        assert!(encoded.len() < 128, "encoded size {}", encoded.len());
    }
}
