//! Framebuffer composition.
//!
//! Layer order, bottom to top:
//!
//! 1. base color buffer from the mirror
//! 2. isolation: base dimmed to 25%, overlay at full opacity where set
//! 3. heatmap: `screen` lightening blend at 60% strength, nearest-
//!    neighbor upscaled from aggregation cells to canvas cells

use crate::heatmap::ActivityHeatmap;
use crate::isolation::IsolationOverlay;
use crate::mirror::CanvasMirror;

/// Base dim factor while an isolation target is active
const ISOLATION_DIM: f32 = 0.25;
/// Heatmap blend strength
const HEATMAP_ALPHA: f32 = 0.6;

/// Compose a width×height RGBA frame from the mirror and optional
/// overlays. An inactive isolation overlay (no target) is a no-op.
pub fn compose_frame(
    mirror: &CanvasMirror,
    isolation: Option<&IsolationOverlay>,
    heatmap: Option<&ActivityHeatmap>,
) -> Vec<u8> {
    let mut frame = mirror.rgba().to_vec();

    if let Some(overlay) = isolation.filter(|o| o.is_active()) {
        let overlay_rgba = overlay.rgba();
        for idx in 0..mirror.cell_count() {
            let px = idx * 4;
            if overlay_rgba[px + 3] > 0 {
                frame[px..px + 4].copy_from_slice(&overlay_rgba[px..px + 4]);
            } else {
                for c in 0..3 {
                    frame[px + c] = (frame[px + c] as f32 * ISOLATION_DIM) as u8;
                }
            }
        }
    }

    if let Some(hm) = heatmap {
        blend_heatmap(&mut frame, mirror.width(), mirror.height(), hm);
    }

    frame
}

/// Screen-blend the heatmap over the frame.
fn blend_heatmap(frame: &mut [u8], width: u32, height: u32, heatmap: &ActivityHeatmap) {
    let hm_rgba = heatmap.render_rgba();
    let cols = heatmap.cols();
    let cell_size = heatmap.cell_size();

    for y in 0..height {
        let row = (y / cell_size).min(heatmap.rows() - 1);
        for x in 0..width {
            let col = (x / cell_size).min(cols - 1);
            let hm_px = ((row * cols + col) as usize) * 4;
            let alpha = hm_rgba[hm_px + 3];
            if alpha == 0 {
                continue;
            }
            let strength = HEATMAP_ALPHA * (alpha as f32 / 255.0);
            let px = ((y * width + x) as usize) * 4;
            for c in 0..3 {
                let base = frame[px + c] as f32;
                let heat = hm_rgba[hm_px + c] as f32;
                let screened = 255.0 - (255.0 - base) * (255.0 - heat) / 255.0;
                frame[px + c] = (base + (screened - base) * strength).round() as u8;
            }
        }
    }
}
