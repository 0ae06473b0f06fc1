//! Local replica of the canvas planes.
//!
//! The mirror is seeded from a `/canvas` snapshot and kept current by
//! applying feed events. Per-event cost is O(1): one cell in the color
//! mirror, the attribution mirror, and the RGBA base framebuffer.

use std::collections::HashMap;

use base64::Engine;
use pixelfield_core::{
    hex_to_rgb, normalize_hex, unpack_fingerprint_plane, AgentFingerprint, PixelEvent,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Snapshot decode error: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Malformed snapshot: {0}")]
    Malformed(String),
    #[error("Snapshot fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Feed channel unavailable")]
    FeedUnavailable,
}

/// Deserialized `/canvas` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasSnapshot {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub palette: Vec<String>,
    /// Base64, one byte per cell
    pub colors: String,
    /// Base64, eight bytes per cell (attribution-enabled deployments)
    #[serde(default)]
    pub agents: Option<String>,
    #[serde(default)]
    pub agent_map: HashMap<String, String>,
}

/// Inspection result for a hovered cell.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverInfo {
    pub x: u32,
    pub y: u32,
    pub color: String,
    /// Display name of the last writer, if attributed
    pub agent: Option<String>,
}

/// Viewer-side replica of the grid.
pub struct CanvasMirror {
    width: u32,
    height: u32,
    /// One palette index per cell
    colors: Vec<u8>,
    /// One fingerprint per cell; 0 = unwritten
    attributions: Vec<u64>,
    /// fingerprint hex → display name
    identity_map: HashMap<String, String>,
    /// Palette as received in the snapshot
    palette: Vec<String>,
    palette_rgb: Vec<[u8; 3]>,
    /// normalized hex → palette index
    palette_lookup: HashMap<String, u8>,
    /// width×height RGBA framebuffer, kept in sync with `colors`
    base_rgba: Vec<u8>,
}

impl CanvasMirror {
    /// Build a mirror from a snapshot payload.
    pub fn from_snapshot(snapshot: &CanvasSnapshot) -> Result<Self, ViewError> {
        let cell_count = snapshot.width as usize * snapshot.height as usize;
        if cell_count == 0 {
            return Err(ViewError::Malformed("empty snapshot region".to_string()));
        }
        if snapshot.palette.is_empty() {
            return Err(ViewError::Malformed("empty palette".to_string()));
        }

        let engine = base64::engine::general_purpose::STANDARD;
        let mut colors = engine.decode(&snapshot.colors)?;
        colors.resize(cell_count, 0);

        let attributions = match &snapshot.agents {
            Some(encoded) => {
                let bytes = engine.decode(encoded)?;
                unpack_fingerprint_plane(&bytes, cell_count)
            }
            None => vec![0u64; cell_count],
        };

        let palette_rgb: Vec<[u8; 3]> = snapshot
            .palette
            .iter()
            .map(|hex| hex_to_rgb(hex).unwrap_or([0, 0, 0]))
            .collect();
        let palette_lookup: HashMap<String, u8> = snapshot
            .palette
            .iter()
            .enumerate()
            .map(|(i, hex)| (normalize_hex(hex), i as u8))
            .collect();

        let mut mirror = Self {
            width: snapshot.width,
            height: snapshot.height,
            colors,
            attributions,
            identity_map: snapshot.agent_map.clone(),
            palette: snapshot.palette.clone(),
            palette_rgb,
            palette_lookup,
            base_rgba: vec![0; cell_count * 4],
        };
        mirror.rebuild_rgba();
        Ok(mirror)
    }

    fn rebuild_rgba(&mut self) {
        for (i, &cell) in self.colors.iter().enumerate() {
            let rgb = self
                .palette_rgb
                .get(cell as usize)
                .copied()
                .unwrap_or(self.palette_rgb[0]);
            self.base_rgba[i * 4..i * 4 + 3].copy_from_slice(&rgb);
            self.base_rgba[i * 4 + 3] = 255;
        }
    }

    /// Apply one feed event. Events with colors outside the palette or
    /// coordinates outside the mirrored region are ignored.
    pub fn apply_event(&mut self, event: &PixelEvent) {
        let Some(&palette_idx) = self.palette_lookup.get(&normalize_hex(&event.color)) else {
            log::debug!("Ignoring event with unknown color {}", event.color);
            return;
        };
        if event.x >= self.width || event.y >= self.height {
            return;
        }
        let idx = (event.y as usize) * self.width as usize + event.x as usize;

        self.colors[idx] = palette_idx;
        let rgb = self.palette_rgb[palette_idx as usize];
        self.base_rgba[idx * 4..idx * 4 + 3].copy_from_slice(&rgb);
        self.base_rgba[idx * 4 + 3] = 255;

        if let Some(hash) = &event.agent_hash {
            if let Some(fp) = AgentFingerprint::from_hex(hash) {
                self.attributions[idx] = fp.0;
                self.identity_map
                    .entry(hash.clone())
                    .or_insert_with(|| event.agent_id.clone());
            }
        }
    }

    /// Palette color of a cell, if in bounds.
    pub fn color_at(&self, x: u32, y: u32) -> Option<&str> {
        let idx = self.cell_index(x, y)?;
        self.palette.get(self.colors[idx] as usize).map(String::as_str)
    }

    /// Last writer of a cell, if in bounds and attributed.
    pub fn attribution_at(&self, x: u32, y: u32) -> Option<AgentFingerprint> {
        let idx = self.cell_index(x, y)?;
        let fp = AgentFingerprint(self.attributions[idx]);
        (!fp.is_unwritten()).then_some(fp)
    }

    /// Display name for a fingerprint, from the identity map.
    pub fn agent_name(&self, fp: &AgentFingerprint) -> Option<&str> {
        self.identity_map.get(&fp.to_hex()).map(String::as_str)
    }

    /// Inspect a cell in world coordinates.
    pub fn hover(&self, x: u32, y: u32) -> Option<HoverInfo> {
        let color = self.color_at(x, y)?.to_string();
        let agent = self
            .attribution_at(x, y)
            .and_then(|fp| self.agent_name(&fp))
            .map(str::to_string);
        Some(HoverInfo { x, y, color, agent })
    }

    fn cell_index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| (y as usize) * self.width as usize + x as usize)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cell_count(&self) -> usize {
        self.colors.len()
    }

    /// The RGBA base framebuffer (width×height×4).
    pub fn rgba(&self) -> &[u8] {
        &self.base_rgba
    }

    pub fn palette_rgb(&self) -> &[[u8; 3]] {
        &self.palette_rgb
    }

    pub(crate) fn attribution_raw(&self, idx: usize) -> u64 {
        self.attributions[idx]
    }
}

/// Blank snapshot builder shared by tests across the crate.
#[cfg(test)]
pub(crate) fn test_snapshot(width: u32, height: u32) -> CanvasSnapshot {
    use pixelfield_core::PALETTE;
    let engine = base64::engine::general_purpose::STANDARD;
    let cell_count = (width * height) as usize;
    CanvasSnapshot {
        x: 0,
        y: 0,
        width,
        height,
        palette: PALETTE.iter().map(|s| s.to_string()).collect(),
        colors: engine.encode(vec![0u8; cell_count]),
        agents: Some(engine.encode(vec![0u8; cell_count * 8])),
        agent_map: HashMap::new(),
    }
}
