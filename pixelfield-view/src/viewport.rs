//! Pan/zoom camera for the canvas view.
//!
//! Device space is pixels on the presentation surface; world space is
//! grid cells. `device = world * scale + offset`.

/// Zoom bounds
const MIN_SCALE: f32 = 0.2;
const MAX_SCALE: f32 = 40.0;

/// Scroll-step zoom factors
pub const ZOOM_IN_STEP: f32 = 1.1;
pub const ZOOM_OUT_STEP: f32 = 0.9;

/// Camera state — tracks pan and zoom for the canvas view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit a canvas of `world_w`×`world_h` cells into a viewing rect,
    /// centered, with a 10% margin.
    pub fn fit(rect_w: f32, rect_h: f32, world_w: f32, world_h: f32) -> Self {
        let scale = ((rect_w / world_w).min(rect_h / world_h) * 0.9).clamp(MIN_SCALE, MAX_SCALE);
        Self {
            scale,
            offset_x: (rect_w - world_w * scale) / 2.0,
            offset_y: (rect_h - world_h * scale) / 2.0,
        }
    }

    /// Zoom by `factor` keeping the world point under the device-space
    /// pointer fixed.
    pub fn zoom_at(&mut self, pointer_x: f32, pointer_y: f32, factor: f32) {
        // World point under the pointer before rescale.
        let world_x = (pointer_x - self.offset_x) / self.scale;
        let world_y = (pointer_y - self.offset_y) / self.scale;

        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);

        // Adjust offset so the same world point stays under the pointer.
        self.offset_x = pointer_x - world_x * self.scale;
        self.offset_y = pointer_y - world_y * self.scale;
    }

    /// Pan by a device-space delta (drag).
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Convert device coordinates to world coordinates.
    pub fn device_to_world(&self, device_x: f32, device_y: f32) -> (f32, f32) {
        (
            (device_x - self.offset_x) / self.scale,
            (device_y - self.offset_y) / self.scale,
        )
    }

    /// Convert world coordinates to device coordinates.
    pub fn world_to_device(&self, world_x: f32, world_y: f32) -> (f32, f32) {
        (
            world_x * self.scale + self.offset_x,
            world_y * self.scale + self.offset_y,
        )
    }

    /// The grid cell under a device-space point, if non-negative.
    pub fn cell_at(&self, device_x: f32, device_y: f32) -> Option<(u32, u32)> {
        let (wx, wy) = self.device_to_world(device_x, device_y);
        if wx < 0.0 || wy < 0.0 {
            return None;
        }
        Some((wx.floor() as u32, wy.floor() as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_keeps_pointer_fixed() {
        let mut vp = Viewport::new();
        vp.pan(50.0, -20.0);

        let (wx_before, wy_before) = vp.device_to_world(300.0, 200.0);
        vp.zoom_at(300.0, 200.0, ZOOM_IN_STEP);
        let (wx_after, wy_after) = vp.device_to_world(300.0, 200.0);

        assert!((wx_before - wx_after).abs() < 1e-3);
        assert!((wy_before - wy_after).abs() < 1e-3);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut vp = Viewport::new();
        for _ in 0..200 {
            vp.zoom_at(0.0, 0.0, ZOOM_IN_STEP);
        }
        assert_eq!(vp.scale, MAX_SCALE);

        for _ in 0..200 {
            vp.zoom_at(0.0, 0.0, ZOOM_OUT_STEP);
        }
        assert_eq!(vp.scale, MIN_SCALE);
    }

    #[test]
    fn test_roundtrip_transforms() {
        let mut vp = Viewport::new();
        vp.zoom_at(120.0, 80.0, 1.5);
        vp.pan(-30.0, 12.0);

        let (dx, dy) = vp.world_to_device(500.0, 250.0);
        let (wx, wy) = vp.device_to_world(dx, dy);
        assert!((wx - 500.0).abs() < 1e-3);
        assert!((wy - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_centers_canvas() {
        let vp = Viewport::fit(1000.0, 800.0, 1000.0, 1000.0);
        // Limited by height: 800/1000 * 0.9 = 0.72
        assert!((vp.scale - 0.72).abs() < 1e-4);
        // Centered horizontally: (1000 - 720) / 2 = 140
        assert!((vp.offset_x - 140.0).abs() < 1e-3);
        assert!((vp.offset_y - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_cell_at() {
        let mut vp = Viewport::new();
        vp.zoom_at(0.0, 0.0, 2.0);
        assert_eq!(vp.cell_at(5.0, 3.0), Some((2, 1)));
        assert_eq!(vp.cell_at(-1.0, 0.0), None);
    }

    #[test]
    fn test_pan() {
        let mut vp = Viewport::new();
        vp.pan(10.0, 20.0);
        assert_eq!(vp.device_to_world(10.0, 20.0), (0.0, 0.0));
    }
}
