//! Plane pack/unpack and region slicing.
//!
//! The color plane packs `8 / BPP` cells per byte, most-significant
//! sub-field first, in row-major order. The attribution plane is one
//! big-endian u64 per cell. Both decoders zero-extend short input so a
//! plane that has never been written reads as all zeroes.

use crate::grid::Region;

/// Pack one-cell-per-element values into the sub-byte plane encoding.
///
/// `bpp` must be one of {1, 2, 4, 8}. Values are masked to the bit depth.
pub fn pack_color_plane(values: &[u8], bpp: u8) -> Vec<u8> {
    debug_assert!(matches!(bpp, 1 | 2 | 4 | 8), "unsupported bit depth {bpp}");
    let per_byte = (8 / bpp) as usize;
    let mask = bpp_mask(bpp);
    let mut packed = vec![0u8; values.len().div_ceil(per_byte)];
    for (i, &value) in values.iter().enumerate() {
        let shift = 8 - bpp as usize * (i % per_byte + 1);
        packed[i / per_byte] |= (value & mask) << shift;
    }
    packed
}

/// Exact inverse of [`pack_color_plane`].
///
/// Always yields `cell_count` values; missing trailing bytes read as zero.
pub fn unpack_color_plane(packed: &[u8], cell_count: usize, bpp: u8) -> Vec<u8> {
    debug_assert!(matches!(bpp, 1 | 2 | 4 | 8), "unsupported bit depth {bpp}");
    let per_byte = (8 / bpp) as usize;
    let mask = bpp_mask(bpp);
    let mut values = vec![0u8; cell_count];
    for (i, value) in values.iter_mut().enumerate() {
        let byte = packed.get(i / per_byte).copied().unwrap_or(0);
        let shift = 8 - bpp as usize * (i % per_byte + 1);
        *value = (byte >> shift) & mask;
    }
    values
}

/// Pack fingerprints as big-endian u64s, one per cell.
pub fn pack_fingerprint_plane(values: &[u64]) -> Vec<u8> {
    let mut packed = Vec::with_capacity(values.len() * 8);
    for value in values {
        packed.extend_from_slice(&value.to_be_bytes());
    }
    packed
}

/// Exact inverse of [`pack_fingerprint_plane`], zero-extended on short input.
pub fn unpack_fingerprint_plane(packed: &[u8], cell_count: usize) -> Vec<u64> {
    let mut values = vec![0u64; cell_count];
    for (i, value) in values.iter_mut().enumerate() {
        let mut word = [0u8; 8];
        let start = i * 8;
        for (j, byte) in word.iter_mut().enumerate() {
            *byte = packed.get(start + j).copied().unwrap_or(0);
        }
        *value = u64::from_be_bytes(word);
    }
    values
}

/// Copy a rectangular region out of a row-major plane.
///
/// One contiguous copy per row; the caller must have validated the region
/// against the grid bounds (the HTTP layer rejects out-of-bounds regions
/// before reaching here).
pub fn slice_region<T: Copy + Default>(plane: &[T], row_width: usize, region: Region) -> Vec<T> {
    debug_assert!(region.x as usize + region.width as usize <= row_width);
    let mut out = vec![T::default(); region.cell_count()];
    let width = region.width as usize;
    for row in 0..region.height as usize {
        let src_start = (region.y as usize + row) * row_width + region.x as usize;
        out[row * width..(row + 1) * width].copy_from_slice(&plane[src_start..src_start + width]);
    }
    out
}

fn bpp_mask(bpp: u8) -> u8 {
    if bpp == 8 {
        0xff
    } else {
        (1u8 << bpp) - 1
    }
}
