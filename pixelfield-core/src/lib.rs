//! # pixelfield-core — grid geometry, palette, and plane encoding
//!
//! Shared foundation for the pixelfield canvas: the fixed color palette,
//! the packed binary representation of the color and attribution planes,
//! and the `PixelEvent` value object that flows from the write pipeline
//! to every connected viewer.
//!
//! ## Plane layout
//!
//! ```text
//! Color plane (BPP = 4):           Attribution plane:
//! ┌────────┬────────┬─────┐        ┌──────────┬──────────┬─────┐
//! │ c0  c1 │ c2  c3 │ ... │        │ fp0      │ fp1      │ ... │
//! │ 1 byte │ 1 byte │     │        │ 8 bytes  │ 8 bytes  │     │
//! └────────┴────────┴─────┘        └──────────┴──────────┴─────┘
//!   high nibble first                big-endian u64 per cell
//! ```
//!
//! Cells are row-major; a 1000×1000 grid at 4 bits per pixel packs into
//! 500,000 bytes, the attribution plane into 8,000,000 bytes.
//!
//! ## Modules
//!
//! - [`grid`] — grid dimensions, regions, store key layout
//! - [`palette`] — fixed color table and canonical `PaletteIndex`
//! - [`codec`] — plane pack/unpack and region slicing
//! - [`fingerprint`] — compact agent attribution digests
//! - [`event`] — the pixel mutation event

pub mod codec;
pub mod event;
pub mod fingerprint;
pub mod grid;
pub mod palette;

pub use codec::{
    pack_color_plane, pack_fingerprint_plane, slice_region, unpack_color_plane,
    unpack_fingerprint_plane,
};
pub use event::{now_ms, PixelEvent};
pub use fingerprint::AgentFingerprint;
pub use grid::{GridDims, Region};
pub use palette::{hex_to_rgb, normalize_hex, PaletteIndex, PALETTE};
