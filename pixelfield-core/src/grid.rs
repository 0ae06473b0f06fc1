//! Grid geometry and the persisted key layout.

use serde::{Deserialize, Serialize};

/// Store key holding the packed color plane.
pub const COLOR_PLANE_KEY: &str = "canvas:colors";
/// Store key holding the packed attribution plane.
pub const ATTRIBUTION_PLANE_KEY: &str = "canvas:agents";
/// Store key (map) holding fingerprint → display name entries.
pub const IDENTITY_MAP_KEY: &str = "canvas:agent_map";
/// Prefix for per-principal cooldown lease keys.
pub const COOLDOWN_KEY_PREFIX: &str = "cooldown:";

/// Fixed grid dimensions and color bit depth.
///
/// Allocated once at process start; the grid is never resized. All byte
/// and bit offsets into the persisted planes derive from these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
    /// Bits per color cell. Must be one of {1, 2, 4, 8}.
    pub bits_per_pixel: u8,
}

impl Default for GridDims {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            bits_per_pixel: 4,
        }
    }
}

impl GridDims {
    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of palette entries addressable at this bit depth.
    pub fn palette_capacity(&self) -> usize {
        1usize << self.bits_per_pixel
    }

    /// Size of the packed color plane in bytes.
    pub fn color_plane_bytes(&self) -> usize {
        (self.cell_count() * self.bits_per_pixel as usize).div_ceil(8)
    }

    /// Size of the packed attribution plane in bytes (8 bytes per cell).
    pub fn fingerprint_plane_bytes(&self) -> usize {
        self.cell_count() * 8
    }

    /// Row-major cell index for a coordinate.
    pub fn pixel_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Whether a coordinate lies inside the grid.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// The whole grid as a region.
    pub fn full_region(&self) -> Region {
        Region {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        }
    }

    /// Whether a region is non-empty and entirely inside the grid.
    pub fn contains_region(&self, region: &Region) -> bool {
        region.width > 0
            && region.height > 0
            && region.x.checked_add(region.width).is_some_and(|r| r <= self.width)
            && region.y.checked_add(region.height).is_some_and(|b| b <= self.height)
    }
}

/// Axis-aligned rectangular sub-rectangle of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of cells covered by this region.
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
