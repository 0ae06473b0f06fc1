//! Sliding-window activity heatmap.
//!
//! The canvas is bucketed into `cell_size`×`cell_size` aggregation cells.
//! A bounded FIFO of the most recent events drives the counts: each new
//! event increments its cell, and once the window is full the oldest
//! event's cell is decremented. Old activity therefore fades out as new
//! activity arrives, without any timer.

use std::collections::VecDeque;

/// Grid cells per aggregation cell side
pub const DEFAULT_CELL_SIZE: u32 = 10;
/// Sliding window length
pub const DEFAULT_MAX_EVENTS: usize = 600;

/// Three-stop intensity ramp: cold → warm → hot.
const COLD: [u8; 3] = [34, 211, 238];
const WARM: [u8; 3] = [255, 180, 84];
const HOT: [u8; 3] = [239, 68, 68];

pub struct ActivityHeatmap {
    cols: u32,
    rows: u32,
    cell_size: u32,
    counts: Vec<u32>,
    /// FIFO of aggregation-cell indices, most recent at the back
    recent: VecDeque<usize>,
    max_events: usize,
}

impl ActivityHeatmap {
    /// Heatmap for a canvas of the given cell dimensions, with default
    /// bucket size and window length.
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self::with_params(canvas_width, canvas_height, DEFAULT_CELL_SIZE, DEFAULT_MAX_EVENTS)
    }

    pub fn with_params(
        canvas_width: u32,
        canvas_height: u32,
        cell_size: u32,
        max_events: usize,
    ) -> Self {
        let cols = canvas_width.div_ceil(cell_size).max(1);
        let rows = canvas_height.div_ceil(cell_size).max(1);
        Self {
            cols,
            rows,
            cell_size,
            counts: vec![0; (cols * rows) as usize],
            recent: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Record one event at canvas coordinates.
    pub fn record(&mut self, x: u32, y: u32) {
        let col = (x / self.cell_size).min(self.cols - 1);
        let row = (y / self.cell_size).min(self.rows - 1);
        let idx = (row * self.cols + col) as usize;

        self.counts[idx] += 1;
        self.recent.push_back(idx);
        if self.recent.len() > self.max_events {
            if let Some(old) = self.recent.pop_front() {
                self.counts[old] = self.counts[old].saturating_sub(1);
            }
        }
    }

    /// Render the cols×rows RGBA intensity map.
    ///
    /// Counts are normalized by the current maximum; zero-count cells
    /// are fully transparent, alpha elsewhere is proportional to
    /// intensity (max 200).
    pub fn render_rgba(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.counts.len() * 4];
        let max = self.counts.iter().copied().max().unwrap_or(0);
        if max == 0 {
            return out;
        }
        for (i, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let intensity = count as f32 / max as f32;
            let rgb = ramp(intensity);
            out[i * 4..i * 4 + 3].copy_from_slice(&rgb);
            out[i * 4 + 3] = (200.0 * intensity) as u8;
        }
        out
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Count for one aggregation cell (row-major).
    pub fn count_at(&self, col: u32, row: u32) -> u32 {
        self.counts[(row * self.cols + col) as usize]
    }

    /// Events currently in the window.
    pub fn window_len(&self) -> usize {
        self.recent.len()
    }
}

/// Interpolate the cold→warm→hot ramp at `t` ∈ [0, 1].
fn ramp(t: f32) -> [u8; 3] {
    let (from, to, local) = if t < 0.5 {
        (COLD, WARM, t * 2.0)
    } else {
        (WARM, HOT, (t - 0.5) * 2.0)
    };
    [
        lerp(from[0], to[0], local),
        lerp(from[1], to[1], local),
        lerp(from[2], to[2], local),
    ]
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}
