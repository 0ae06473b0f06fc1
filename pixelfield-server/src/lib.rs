//! # pixelfield-server
//!
//! The grid server: HTTP write/read API, identity resolution, rate
//! limiting, and the WebSocket mutation feed.
//!
//! ## Request path
//!
//! ```text
//!  POST /pixel
//!       │
//!       ▼
//!  IdentityResolver.resolve()      ◀─── headers / bearer / client IP
//!       │
//!       ▼
//!  WritePipeline.place()           ◀─── validate → throttle → commit
//!       │                                              │
//!       │                                              ▼
//!       │                                     PlaneStore (atomic batch)
//!       ▼
//!  BroadcastHub.publish()          ◀─── fire-and-forget, post-commit
//! ```
//!
//! ## Crate modules
//!
//! - [`config`] — typed configuration with env overrides
//! - [`identity`] — principal resolution strategies
//! - [`pipeline`] — the write pipeline and snapshot assembly
//! - [`http`] — axum routes and error mapping

pub mod config;
pub mod http;
pub mod identity;
pub mod pipeline;

pub use config::ServerConfig;
pub use http::{router, AppState};
pub use identity::{Credentials, Identity, IdentityMode, IdentityResolver};
pub use pipeline::{PlaceError, WritePipeline};
