//! Single-agent attribution overlay.
//!
//! When a target fingerprint is set, the overlay is opaque exactly where
//! the attribution plane matches the target, carrying that cell's color.
//! Changing the target is a full scan; keeping it current afterwards is
//! O(1) per feed event.

use pixelfield_core::AgentFingerprint;

use crate::mirror::CanvasMirror;

pub struct IsolationOverlay {
    width: u32,
    height: u32,
    target: Option<AgentFingerprint>,
    /// width×height RGBA; alpha 0 everywhere the target didn't write
    rgba: Vec<u8>,
}

impl IsolationOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            target: None,
            rgba: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn target(&self) -> Option<AgentFingerprint> {
        self.target
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    /// Set (or clear) the isolation target and rebuild from the mirror.
    pub fn set_target(&mut self, target: Option<AgentFingerprint>, mirror: &CanvasMirror) {
        self.target = target;
        self.rgba.fill(0);
        let Some(target) = target else {
            return;
        };
        let base = mirror.rgba();
        for idx in 0..mirror.cell_count() {
            if mirror.attribution_raw(idx) == target.0 {
                self.rgba[idx * 4..idx * 4 + 4].copy_from_slice(&base[idx * 4..idx * 4 + 4]);
            }
        }
    }

    /// Incremental update for one mutated cell.
    ///
    /// Call after the mirror has applied the event so the cell's color
    /// is current.
    pub fn apply_event(&mut self, x: u32, y: u32, writer: AgentFingerprint, mirror: &CanvasMirror) {
        let Some(target) = self.target else {
            return;
        };
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize) * self.width as usize + x as usize;
        if writer == target {
            let base = mirror.rgba();
            self.rgba[idx * 4..idx * 4 + 4].copy_from_slice(&base[idx * 4..idx * 4 + 4]);
        } else {
            // Someone else overwrote a target cell.
            self.rgba[idx * 4..idx * 4 + 4].fill(0);
        }
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Alpha of one cell, for inspection.
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        let idx = (y as usize) * self.width as usize + x as usize;
        self.rgba[idx * 4 + 3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::test_snapshot;
    use pixelfield_core::{now_ms, PixelEvent};

    fn event(x: u32, y: u32, agent: &str) -> PixelEvent {
        PixelEvent {
            x,
            y,
            color: "#ef4444".to_string(),
            agent_id: agent.to_string(),
            agent_hash: Some(AgentFingerprint::digest(agent).to_hex()),
            ts: now_ms(),
        }
    }

    #[test]
    fn test_rebuild_marks_only_target_cells() {
        let mut mirror = CanvasMirror::from_snapshot(&test_snapshot(10, 10)).unwrap();
        mirror.apply_event(&event(1, 1, "bot-a"));
        mirror.apply_event(&event(2, 2, "bot-b"));

        let mut overlay = IsolationOverlay::new(10, 10);
        overlay.set_target(Some(AgentFingerprint::digest("bot-a")), &mirror);

        assert_eq!(overlay.alpha_at(1, 1), 255);
        assert_eq!(overlay.alpha_at(2, 2), 0);
        assert_eq!(overlay.alpha_at(0, 0), 0);
    }

    #[test]
    fn test_incremental_target_event_sets_opaque() {
        let mut mirror = CanvasMirror::from_snapshot(&test_snapshot(10, 10)).unwrap();
        let mut overlay = IsolationOverlay::new(10, 10);
        overlay.set_target(Some(AgentFingerprint::digest("bot-a")), &mirror);

        let ev = event(4, 4, "bot-a");
        mirror.apply_event(&ev);
        overlay.apply_event(4, 4, AgentFingerprint::digest("bot-a"), &mirror);
        assert_eq!(overlay.alpha_at(4, 4), 255);
    }

    #[test]
    fn test_incremental_foreign_event_stays_transparent() {
        let mut mirror = CanvasMirror::from_snapshot(&test_snapshot(10, 10)).unwrap();
        let mut overlay = IsolationOverlay::new(10, 10);
        overlay.set_target(Some(AgentFingerprint::digest("bot-a")), &mirror);

        let ev = event(4, 4, "bot-b");
        mirror.apply_event(&ev);
        overlay.apply_event(4, 4, AgentFingerprint::digest("bot-b"), &mirror);
        assert_eq!(overlay.alpha_at(4, 4), 0);
    }

    #[test]
    fn test_foreign_overwrite_clears_cell() {
        let mut mirror = CanvasMirror::from_snapshot(&test_snapshot(10, 10)).unwrap();
        mirror.apply_event(&event(4, 4, "bot-a"));
        let mut overlay = IsolationOverlay::new(10, 10);
        overlay.set_target(Some(AgentFingerprint::digest("bot-a")), &mirror);
        assert_eq!(overlay.alpha_at(4, 4), 255);

        mirror.apply_event(&event(4, 4, "bot-b"));
        overlay.apply_event(4, 4, AgentFingerprint::digest("bot-b"), &mirror);
        assert_eq!(overlay.alpha_at(4, 4), 0);
    }

    #[test]
    fn test_clearing_target_clears_overlay() {
        let mut mirror = CanvasMirror::from_snapshot(&test_snapshot(10, 10)).unwrap();
        mirror.apply_event(&event(1, 1, "bot-a"));
        let mut overlay = IsolationOverlay::new(10, 10);
        overlay.set_target(Some(AgentFingerprint::digest("bot-a")), &mirror);
        overlay.set_target(None, &mirror);

        assert!(!overlay.is_active());
        assert!(overlay.rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_inactive_overlay_ignores_events() {
        let mut mirror = CanvasMirror::from_snapshot(&test_snapshot(10, 10)).unwrap();
        let mut overlay = IsolationOverlay::new(10, 10);
        mirror.apply_event(&event(4, 4, "bot-a"));
        overlay.apply_event(4, 4, AgentFingerprint::digest("bot-a"), &mirror);
        assert_eq!(overlay.alpha_at(4, 4), 0);
    }
}
