//! # pixelfield-view
//!
//! Viewer-side mirror and render engine for the shared pixel grid.
//!
//! ## Architecture
//!
//! ```text
//!  GET /canvas (snapshot)          WebSocket feed (pixelfield-sync)
//!       │                                │
//!       ▼                                ▼
//!  CanvasMirror.from_snapshot()    CanvasMirror.apply_event()   ◀─── O(1)
//!       │                                │
//!       └────────────┬───────────────────┘
//!                    ▼
//!  compose_frame(mirror, isolation?, heatmap?)   ◀─── RGBA framebuffer
//!                    │
//!                    ▼
//!  Viewport (zoom / pan / hover transforms)
//! ```
//!
//! ## Crate modules
//!
//! - [`mirror`] — local replica of the color and attribution planes
//! - [`viewport`] — pan/zoom camera with device↔world transforms
//! - [`heatmap`] — bounded sliding-window activity aggregation
//! - [`isolation`] — single-agent attribution overlay
//! - [`compose`] — framebuffer composition (dim, overlay, screen blend)
//! - [`session`] — async owner tying snapshot fetch and feed together

pub mod compose;
pub mod heatmap;
pub mod isolation;
pub mod mirror;
pub mod session;
pub mod viewport;

// Re-exports for convenience
pub use compose::compose_frame;
pub use heatmap::ActivityHeatmap;
pub use isolation::IsolationOverlay;
pub use mirror::{CanvasMirror, CanvasSnapshot, HoverInfo, ViewError};
pub use session::{ActivityLog, SessionConfig, SessionStatus, ViewerSession};
pub use viewport::Viewport;
