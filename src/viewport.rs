use ultraviolet::{DVec2, Vec2};

use crate::config::DEFAULT_ZOOM_FACTOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

const PIXEL_SCALE_RANGE: (f64, f64) = (1e-12, 8.8e50);

/// Affine window-to-world mapping. Deliberately free of any
/// windowing-crate types so it stays independently unit-testable;
/// the coordinator is the only caller that touches a real window.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    window_px: Vec2,
    origin: DVec2,
    pixel_scale: f64,
}

impl Viewport {
    pub fn new(window_px: Vec2, pixel_scale: f64) -> Self {
        Self {
            window_px,
            origin: DVec2::zero(),
            pixel_scale,
        }
    }

    fn size(&self) -> DVec2 {
        DVec2::new(self.window_px.x as f64, self.window_px.y as f64) * self.pixel_scale
    }

    pub fn rect(&self) -> (DVec2, DVec2) {
        (self.origin, self.size())
    }

    pub fn window_px(&self) -> Vec2 {
        self.window_px
    }

    pub fn pixel_scale(&self) -> f64 {
        self.pixel_scale
    }

    /// Keeps `pixel_scale` and the world origin unchanged; only the
    /// derived world-space size follows the new window resolution.
    pub fn resize(&mut self, new_px: Vec2) {
        self.window_px = new_px;
    }

    pub fn pan(&mut self, delta_px: Vec2) {
        let size = self.size();
        self.origin.x += delta_px.x as f64 / self.window_px.x as f64 * size.x;
        self.origin.y += delta_px.y as f64 / self.window_px.y as f64 * size.y;
    }

    /// Zooms in or out around `cursor_px`, keeping the world point
    /// under the cursor fixed. IN and OUT update origin before/after
    /// recomputing pixel_scale respectively — this asymmetry is
    /// deliberate, not an oversight: it is what keeps the anchor
    /// point exact in both directions given the origin-before-size
    /// representation this viewport uses.
    pub fn zoom(&mut self, direction: ZoomDirection, cursor_px: Vec2) {
        self.zoom_by(direction, cursor_px, DEFAULT_ZOOM_FACTOR);
    }

    pub fn zoom_by(&mut self, direction: ZoomDirection, cursor_px: Vec2, factor: f64) {
        let ratio = DVec2::new(
            cursor_px.x as f64 / self.window_px.x as f64,
            cursor_px.y as f64 / self.window_px.y as f64,
        );
        let size = self.size();

        match direction {
            ZoomDirection::In => {
                let new_scale = self.pixel_scale * factor;
                if new_scale < PIXEL_SCALE_RANGE.0 {
                    tracing::warn!("zoom in rejected: pixel_scale would fall below minimum");
                    return;
                }
                self.origin += ratio * size * (1.0 - factor);
                self.pixel_scale = new_scale;
            }
            ZoomDirection::Out => {
                let new_scale = self.pixel_scale / factor;
                if new_scale > PIXEL_SCALE_RANGE.1 {
                    tracing::warn!("zoom out rejected: pixel_scale would exceed maximum");
                    return;
                }
                self.pixel_scale = new_scale;
                let new_size = self.size();
                self.origin -= ratio * (new_size - size);
            }
        }
    }

    /// Projects a world-space position to window pixels.
    pub fn project(&self, world_pos: DVec2) -> Vec2 {
        let size = self.size();
        let rel = DVec2::new(
            (world_pos.x - self.origin.x) / size.x,
            (world_pos.y - self.origin.y) / size.y,
        );
        Vec2::new(
            (rel.x * self.window_px.x as f64) as f32,
            (rel.y * self.window_px.y as f64) as f32,
        )
    }

    /// Inverse of `project`, used by the anchor-point test and by
    /// cursor-driven world queries.
    pub fn unproject(&self, pixel_pos: Vec2) -> DVec2 {
        let size = self.size();
        DVec2::new(
            self.origin.x + pixel_pos.x as f64 / self.window_px.x as f64 * size.x,
            self.origin.y + pixel_pos.y as f64 / self.window_px.y as f64 * size.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_and_unproject_round_trip() {
        let vp = Viewport::new(Vec2::new(800.0, 600.0), 2.0);
        let world = DVec2::new(123.0, 45.0);
        let px = vp.project(world);
        let back = vp.unproject(px);
        assert!((back.x - world.x).abs() < 1.0);
        assert!((back.y - world.y).abs() < 1.0);
    }

    #[test]
    fn resize_keeps_pixel_scale() {
        let mut vp = Viewport::new(Vec2::new(800.0, 600.0), 2.0);
        vp.resize(Vec2::new(1600.0, 1200.0));
        assert_eq!(vp.pixel_scale(), 2.0);
        assert_eq!(vp.window_px(), Vec2::new(1600.0, 1200.0));
    }

    #[test]
    fn zoom_keeps_cursor_anchored() {
        let mut vp = Viewport::new(Vec2::new(800.0, 600.0), 2.0);
        let cursor = Vec2::new(400.0, 300.0);
        let world_before = vp.unproject(cursor);
        vp.zoom_by(ZoomDirection::In, cursor, 0.9);
        let px_after = vp.project(world_before);
        assert!((px_after.x - cursor.x).abs() < 1.0);
        assert!((px_after.y - cursor.y).abs() < 1.0);
    }

    #[test]
    fn zoom_out_also_keeps_cursor_anchored() {
        let mut vp = Viewport::new(Vec2::new(800.0, 600.0), 2.0);
        let cursor = Vec2::new(200.0, 500.0);
        let world_before = vp.unproject(cursor);
        vp.zoom_by(ZoomDirection::Out, cursor, 0.9);
        let px_after = vp.project(world_before);
        assert!((px_after.x - cursor.x).abs() < 1.0);
        assert!((px_after.y - cursor.y).abs() < 1.0);
    }

    #[test]
    fn pan_translates_origin_proportionally() {
        let mut vp = Viewport::new(Vec2::new(800.0, 600.0), 2.0);
        let before = vp.rect().0;
        vp.pan(Vec2::new(80.0, 0.0));
        let after = vp.rect().0;
        assert!((after.x - before.x - 160.0).abs() < 1e-9);
    }
}
