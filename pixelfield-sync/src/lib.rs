//! # pixelfield-sync — mutation fan-out to connected viewers
//!
//! Best-effort notification of accepted pixel mutations. Delivery is
//! at-most-once per connection, ordered within a connection, unordered
//! across connections.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   publish(PixelEvent)   ┌──────────────┐
//! │ WritePipeline │ ──────────────────────► │ BroadcastHub │
//! └───────────────┘                         └──────┬───────┘
//!                                                  │ tokio broadcast
//!                                   ┌──────────────┼──────────────┐
//!                                   ▼              ▼              ▼
//!                              FeedServer     FeedServer     FeedServer
//!                              conn (ws)      conn (ws)      conn (ws)
//!                                   │              │              │
//!                                   ▼              ▼              ▼
//!                              FeedClient     FeedClient     FeedClient
//!                              (viewer)       (viewer)       (viewer)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — binary wire protocol (bincode-encoded `FeedMessage`)
//! - [`broadcast`] — single-canvas fan-out with lagging-receiver drop
//! - [`server`] — WebSocket feed server
//! - [`client`] — WebSocket feed client with reconnect + snapshot resync cue

pub mod broadcast;
pub mod client;
pub mod protocol;
pub mod server;

pub use broadcast::{BroadcastHub, HubStats};
pub use client::{ConnectionState, FeedClient, FeedEvent};
pub use protocol::{FeedMessage, MessageType, ProtocolError, ViewerInfo};
pub use server::{FeedConfig, FeedServer};
