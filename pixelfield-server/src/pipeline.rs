//! The write pipeline and snapshot assembly.
//!
//! `place()` is the single mutation path: validate, throttle, commit
//! one atomic batch, then notify viewers. Broadcast happens after the
//! commit and never fails the write — viewers that miss it resync from
//! the next snapshot.

use std::sync::Arc;
use std::time::Duration;

use pixelfield_core::codec::{
    pack_fingerprint_plane, slice_region, unpack_color_plane, unpack_fingerprint_plane,
};
use pixelfield_core::grid::{
    Region, ATTRIBUTION_PLANE_KEY, COLOR_PLANE_KEY, COOLDOWN_KEY_PREFIX, IDENTITY_MAP_KEY,
};
use pixelfield_core::{now_ms, GridDims, PaletteIndex, PixelEvent, PALETTE};
use pixelfield_store::{CommitBatch, PlaneStore, StoreError};
use pixelfield_sync::{BroadcastHub, FeedMessage};

use crate::identity::Identity;

use base64::Engine;
use serde::Serialize;
use std::collections::HashMap;

/// Write rejection taxonomy. `Throttled` is the only variant carrying
/// a built-in retry contract.
#[derive(Debug, Clone)]
pub enum PlaceError {
    Validation(String),
    Auth(String),
    Throttled { retry_after: u64 },
    Backend(String),
}

impl std::fmt::Display for PlaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Invalid request: {msg}"),
            Self::Auth(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Throttled { retry_after } => {
                write!(f, "Rate limited, retry in {retry_after}s")
            }
            Self::Backend(msg) => write!(f, "Backend failure: {msg}"),
        }
    }
}

impl std::error::Error for PlaceError {}

impl From<StoreError> for PlaceError {
    fn from(e: StoreError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// `/canvas` response payload.
#[derive(Debug, Clone, Serialize)]
pub struct CanvasSnapshot {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub palette: Vec<String>,
    /// Base64, one byte per cell
    pub colors: String,
    /// Base64, eight bytes per cell; absent when attribution is off
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<String>,
    pub agent_map: HashMap<String, String>,
}

/// The server-side write pipeline.
pub struct WritePipeline {
    store: Arc<dyn PlaneStore>,
    hub: Arc<BroadcastHub>,
    dims: GridDims,
    cooldown: Duration,
    attribution: bool,
}

impl WritePipeline {
    pub fn new(
        store: Arc<dyn PlaneStore>,
        hub: Arc<BroadcastHub>,
        dims: GridDims,
        cooldown: Duration,
        attribution: bool,
    ) -> Self {
        Self {
            store,
            hub,
            dims,
            cooldown,
            attribution,
        }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn store(&self) -> &Arc<dyn PlaneStore> {
        &self.store
    }

    /// Place one pixel for a resolved identity.
    ///
    /// Coordinates are taken as signed so negative inputs fail
    /// validation rather than wrapping.
    pub fn place(
        &self,
        x: i64,
        y: i64,
        color: &str,
        identity: &Identity,
    ) -> Result<PixelEvent, PlaceError> {
        if !self.dims.contains(x, y) {
            return Err(PlaceError::Validation(format!(
                "coordinates ({x}, {y}) out of bounds"
            )));
        }
        let palette_idx = PaletteIndex::resolve(color)
            .ok_or_else(|| PlaceError::Validation(format!("color {color} not in palette")))?;
        if palette_idx.value() as usize >= self.dims.palette_capacity() {
            return Err(PlaceError::Validation(format!(
                "color {color} not addressable at this bit depth"
            )));
        }

        // Cooldown lease: the create succeeds only for the first write
        // in the window. Same-principal races serialize here.
        if !self.cooldown.is_zero() {
            let lease_key = format!("{COOLDOWN_KEY_PREFIX}{}", identity.principal);
            let acquired = self.store.set_if_absent_with_expiry(&lease_key, self.cooldown)?;
            if !acquired {
                return Err(PlaceError::Throttled {
                    retry_after: self.cooldown.as_secs(),
                });
            }
        }

        let cell = self.dims.pixel_index(x as u32, y as u32);
        let bpp = self.dims.bits_per_pixel;

        let mut batch = CommitBatch::new();
        batch.set_bitfield(
            COLOR_PLANE_KEY,
            cell as u64 * bpp as u64,
            bpp,
            palette_idx.value() as u64,
        );

        let fingerprint = self.attribution.then_some(identity.fingerprint).flatten();
        if let Some(fp) = fingerprint {
            batch.set_bitfield(ATTRIBUTION_PLANE_KEY, cell as u64 * 64, 64, fp.0);
            batch.upsert_map_field(IDENTITY_MAP_KEY, fp.to_hex(), &identity.display_name);
        }

        self.store.commit(&batch)?;

        let event = PixelEvent {
            x: x as u32,
            y: y as u32,
            color: palette_idx.as_hex().to_string(),
            agent_id: identity.display_name.clone(),
            agent_hash: fingerprint.map(|fp| fp.to_hex()),
            ts: now_ms(),
        };

        // Post-commit notification; a failed encode or empty audience
        // never fails the accepted write.
        match FeedMessage::pixel(&event) {
            Ok(msg) => {
                if let Err(e) = self.hub.publish(&msg) {
                    log::warn!("Feed publish failed: {e}");
                }
            }
            Err(e) => log::warn!("Feed encode failed: {e}"),
        }

        Ok(event)
    }

    /// Assemble a snapshot of a region of the canvas.
    pub fn snapshot(&self, region: Region) -> Result<CanvasSnapshot, PlaceError> {
        if !self.dims.contains_region(&region) {
            return Err(PlaceError::Validation(format!(
                "region {}x{} at ({}, {}) out of bounds",
                region.width, region.height, region.x, region.y
            )));
        }

        let engine = base64::engine::general_purpose::STANDARD;
        let row_width = self.dims.width as usize;

        let packed = self
            .store
            .get_range(COLOR_PLANE_KEY, 0, self.dims.color_plane_bytes())?;
        let cells = unpack_color_plane(&packed, self.dims.cell_count(), self.dims.bits_per_pixel);
        let colors = engine.encode(slice_region(&cells, row_width, region));

        let agents = if self.attribution {
            let raw = self
                .store
                .get_range(ATTRIBUTION_PLANE_KEY, 0, self.dims.fingerprint_plane_bytes())?;
            let fps = unpack_fingerprint_plane(&raw, self.dims.cell_count());
            let sliced = slice_region(&fps, row_width, region);
            Some(engine.encode(pack_fingerprint_plane(&sliced)))
        } else {
            None
        };

        let agent_map = if self.attribution {
            self.store.get_map(IDENTITY_MAP_KEY)?
        } else {
            HashMap::new()
        };

        Ok(CanvasSnapshot {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            palette: PALETTE.iter().map(|s| s.to_string()).collect(),
            colors,
            agents,
            agent_map,
        })
    }

    /// The fingerprint → display-name map, for `/agents`.
    pub fn agent_map(&self) -> Result<HashMap<String, String>, PlaceError> {
        Ok(self.store.get_map(IDENTITY_MAP_KEY)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelfield_core::AgentFingerprint;
    use pixelfield_store::MemoryStore;

    fn identity(agent: &str) -> Identity {
        Identity {
            principal: agent.to_string(),
            display_name: agent.to_string(),
            fingerprint: Some(AgentFingerprint::digest(agent)),
        }
    }

    fn pipeline_with(store: Arc<MemoryStore>) -> WritePipeline {
        WritePipeline::new(
            store,
            Arc::new(BroadcastHub::new(64)),
            GridDims::default(),
            Duration::from_secs(5),
            true,
        )
    }

    fn test_pipeline() -> WritePipeline {
        pipeline_with(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_place_accepts_and_attributes() {
        let pipeline = test_pipeline();
        let event = pipeline.place(500, 500, "#22c55e", &identity("bot-a")).unwrap();

        assert_eq!((event.x, event.y), (500, 500));
        assert_eq!(event.color, "#22c55e");
        assert_eq!(event.agent_id, "bot-a");
        assert_eq!(
            event.agent_hash.as_deref(),
            Some(AgentFingerprint::digest("bot-a").to_hex().as_str())
        );
    }

    #[test]
    fn test_place_normalizes_color_spelling() {
        let pipeline = test_pipeline();
        let event = pipeline.place(0, 0, "22C55E", &identity("bot-a")).unwrap();
        assert_eq!(event.color, "#22c55e");
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let pipeline = test_pipeline();
        for (x, y) in [(-1, 0), (0, -1), (1000, 0), (0, 1000)] {
            assert!(matches!(
                pipeline.place(x, y, "#ffffff", &identity("bot-a")),
                Err(PlaceError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_unknown_color_rejected() {
        let pipeline = test_pipeline();
        assert!(matches!(
            pipeline.place(0, 0, "#123456", &identity("bot-a")),
            Err(PlaceError::Validation(_))
        ));
    }

    #[test]
    fn test_cooldown_throttles_then_releases() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline_with(store.clone());

        pipeline.place(0, 0, "#ffffff", &identity("bot-a")).unwrap();

        store.advance(Duration::from_secs(2));
        match pipeline.place(1, 0, "#ffffff", &identity("bot-a")) {
            Err(PlaceError::Throttled { retry_after }) => assert_eq!(retry_after, 5),
            other => panic!("Expected Throttled, got {other:?}"),
        }

        store.advance(Duration::from_secs(4));
        pipeline.place(1, 0, "#ffffff", &identity("bot-a")).unwrap();
    }

    #[test]
    fn test_cooldown_is_per_principal() {
        let pipeline = test_pipeline();
        pipeline.place(0, 0, "#ffffff", &identity("bot-a")).unwrap();
        pipeline.place(1, 0, "#ffffff", &identity("bot-b")).unwrap();
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let pipeline = test_pipeline();
        pipeline.place(500, 500, "#22c55e", &identity("bot-a")).unwrap();

        let region = Region::new(500, 500, 1, 1);
        let snapshot = pipeline.snapshot(region).unwrap();
        let engine = base64::engine::general_purpose::STANDARD;

        let cells = engine.decode(&snapshot.colors).unwrap();
        assert_eq!(cells, vec![12]); // palette index of #22c55e

        let fp_bytes = engine.decode(snapshot.agents.as_ref().unwrap()).unwrap();
        let fps = unpack_fingerprint_plane(&fp_bytes, 1);
        assert_eq!(fps[0], AgentFingerprint::digest("bot-a").0);

        let hex = AgentFingerprint::digest("bot-a").to_hex();
        assert_eq!(snapshot.agent_map.get(&hex).map(String::as_str), Some("bot-a"));
    }

    #[test]
    fn test_snapshot_rejects_bad_region() {
        let pipeline = test_pipeline();
        assert!(pipeline.snapshot(Region::new(999, 999, 2, 2)).is_err());
        assert!(pipeline.snapshot(Region::new(0, 0, 0, 1)).is_err());
    }

    #[test]
    fn test_attribution_disabled_omits_planes() {
        let pipeline = WritePipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(BroadcastHub::new(64)),
            GridDims::default(),
            Duration::from_secs(5),
            false,
        );
        let event = pipeline.place(0, 0, "#ffffff", &identity("bot-a")).unwrap();
        assert_eq!(event.agent_hash, None);

        let snapshot = pipeline.snapshot(Region::new(0, 0, 1, 1)).unwrap();
        assert!(snapshot.agents.is_none());
        assert!(snapshot.agent_map.is_empty());
    }

    #[test]
    fn test_zero_cooldown_disables_throttle() {
        let pipeline = WritePipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(BroadcastHub::new(64)),
            GridDims::default(),
            Duration::ZERO,
            true,
        );
        pipeline.place(0, 0, "#ffffff", &identity("bot-a")).unwrap();
        pipeline.place(1, 0, "#ffffff", &identity("bot-a")).unwrap();
    }

    #[tokio::test]
    async fn test_accepted_write_is_broadcast() {
        let hub = Arc::new(BroadcastHub::new(64));
        let pipeline = WritePipeline::new(
            Arc::new(MemoryStore::new()),
            hub.clone(),
            GridDims::default(),
            Duration::from_secs(5),
            true,
        );
        let mut rx = hub.subscribe();

        pipeline.place(7, 8, "#ef4444", &identity("bot-a")).unwrap();

        let bytes = rx.recv().await.unwrap();
        let msg = FeedMessage::decode(&bytes).unwrap();
        let event = msg.pixel_event().unwrap();
        assert_eq!((event.x, event.y), (7, 8));
    }
}
