//! Fixed color palette and the canonical `PaletteIndex` value type.
//!
//! Hex strings exist only at the system boundary. Everything past
//! validation works in palette indices; the encoding layer never sees a
//! hex string.

use serde::{Deserialize, Serialize};

/// The fixed 16-entry palette. A cell stores an index into this table.
pub const PALETTE: [&str; 16] = [
    "#0b0d12", "#ffffff", "#cbd5f5", "#64748b", "#22d3ee", "#0ea5e9", "#6366f1", "#a855f7",
    "#f472b6", "#ef4444", "#f97316", "#facc15", "#22c55e", "#10b981", "#14b8a6", "#111827",
];

/// Canonical internal color representation: an index into [`PALETTE`].
///
/// Constructed only through total conversion functions, so a value of this
/// type is always a legal palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaletteIndex(u8);

impl PaletteIndex {
    /// Look up a normalized hex color in the palette.
    ///
    /// Expects the output of [`normalize_hex`]; returns `None` for colors
    /// outside the palette.
    pub fn from_normalized_hex(hex: &str) -> Option<Self> {
        PALETTE
            .iter()
            .position(|&entry| entry == hex)
            .map(|idx| Self(idx as u8))
    }

    /// Normalize an arbitrary caller-supplied color and look it up.
    pub fn resolve(color: &str) -> Option<Self> {
        Self::from_normalized_hex(&normalize_hex(color))
    }

    /// Construct from a raw cell value decoded out of the color plane.
    ///
    /// Out-of-table values (possible when the configured bit depth exceeds
    /// the palette size) fall back to index 0, keeping the conversion total.
    pub fn from_cell(value: u8) -> Self {
        if (value as usize) < PALETTE.len() {
            Self(value)
        } else {
            Self(0)
        }
    }

    /// The raw cell value stored in the color plane.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// The normalized hex string for this palette entry.
    pub fn as_hex(&self) -> &'static str {
        PALETTE[self.0 as usize]
    }

    /// The RGB components of this palette entry.
    pub fn rgb(&self) -> [u8; 3] {
        // PALETTE entries are compile-time constants in `#rrggbb` form.
        hex_to_rgb(self.as_hex()).unwrap_or([0, 0, 0])
    }
}

/// Normalize a caller-supplied color string.
///
/// Trims, lowercases, and prefixes `#` to bare 6-hex-digit strings.
/// Anything else passes through (and will fail palette lookup).
pub fn normalize_hex(color: &str) -> String {
    let trimmed = color.trim().to_lowercase();
    if trimmed.starts_with('#') && trimmed.len() == 7 {
        trimmed
    } else if trimmed.len() == 6 {
        format!("#{trimmed}")
    } else {
        trimmed
    }
}

/// Parse a `#rrggbb` hex color into RGB components.
pub fn hex_to_rgb(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_variants() {
        assert_eq!(normalize_hex("#FF0000"), "#ff0000");
        assert_eq!(normalize_hex("ff0000"), "#ff0000");
        assert_eq!(normalize_hex("  #ff0000  "), "#ff0000");
        assert_eq!(normalize_hex("#ff0000"), "#ff0000");
        // Malformed input passes through unchanged (minus case/whitespace).
        assert_eq!(normalize_hex("red"), "red");
        assert_eq!(normalize_hex(""), "");
    }

    #[test]
    fn test_resolve_same_index_for_all_spellings() {
        let a = PaletteIndex::resolve("#22c55e").unwrap();
        let b = PaletteIndex::resolve("22C55E").unwrap();
        let c = PaletteIndex::resolve("#22C55E").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_hex(), "#22c55e");
    }

    #[test]
    fn test_resolve_not_in_palette() {
        assert!(PaletteIndex::resolve("#123456").is_none());
        assert!(PaletteIndex::resolve("not-a-color").is_none());
        assert!(PaletteIndex::resolve("").is_none());
    }

    #[test]
    fn test_index_values_match_table_order() {
        assert_eq!(PaletteIndex::resolve("#0b0d12").unwrap().value(), 0);
        assert_eq!(PaletteIndex::resolve("#ffffff").unwrap().value(), 1);
        assert_eq!(PaletteIndex::resolve("#22c55e").unwrap().value(), 12);
        assert_eq!(PaletteIndex::resolve("#111827").unwrap().value(), 15);
    }

    #[test]
    fn test_from_cell_out_of_table_clamps_to_zero() {
        assert_eq!(PaletteIndex::from_cell(5).value(), 5);
        assert_eq!(PaletteIndex::from_cell(200).value(), 0);
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#ff0000"), Some([255, 0, 0]));
        assert_eq!(hex_to_rgb("22c55e"), Some([0x22, 0xc5, 0x5e]));
        assert_eq!(hex_to_rgb("#nope00"), None);
        assert_eq!(hex_to_rgb("#fff"), None);
    }

    #[test]
    fn test_palette_entries_all_parse() {
        for entry in PALETTE {
            assert!(hex_to_rgb(entry).is_some(), "bad palette entry {entry}");
        }
    }
}
