//! The pixel mutation event.
//!
//! Produced once per accepted write, consumed by zero or more connected
//! viewers, never persisted.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One accepted pixel mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelEvent {
    pub x: u32,
    pub y: u32,
    /// Normalized palette hex color.
    pub color: String,
    /// Agent display name (caller-asserted or verified, per deployment).
    pub agent_id: String,
    /// Attribution fingerprint, 16 hex chars. `None` when the deployment
    /// runs without the attribution plane. Always serialized (as null in
    /// JSON) so the non-self-describing feed encoding round-trips.
    pub agent_hash: Option<String>,
    /// Commit timestamp, milliseconds since the Unix epoch.
    pub ts: u64,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
