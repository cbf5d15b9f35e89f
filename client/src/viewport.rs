use pzmap_shared::{MapInfo, MapType};

use crate::coords::PixelRect;

/// Viewport manages the pan/zoom transformation from base-map image pixels to
/// screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

const DEFAULT_MIN_SCALE: f64 = 0.01;
const DEFAULT_MAX_SCALE: f64 = 16.0;
const ZOOM_SENSITIVITY: f64 = 0.001;
/// Smallest zoom shows the image at half of its fitted size.
const MIN_ZOOM_IMAGE_RATIO: f64 = 0.5;
const TOP_MAX_PIXEL_RATIO: f64 = 16.0;
const ISO_MAX_PIXEL_RATIO: f64 = 2.0;

/// Scale limits of the viewport; search and deep-link zoom targets are
/// expressed as fractions of this range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomBounds {
    pub min: f64,
    pub max: f64,
}

impl ZoomBounds {
    pub fn lerp(&self, fraction: f64) -> f64 {
        self.min + fraction * (self.max - self.min)
    }
}

/// A requested viewport transition, centred on an image-pixel position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanRequest {
    pub center_x: f64,
    pub center_y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 0.3,
            min_scale: DEFAULT_MIN_SCALE,
            max_scale: DEFAULT_MAX_SCALE,
        }
    }
}

impl Viewport {
    /// Convert image coordinates to screen coordinates.
    pub fn world_to_screen(&self, wx: f64, wy: f64) -> (f64, f64) {
        (
            wx * self.scale + self.offset_x,
            wy * self.scale + self.offset_y,
        )
    }

    /// Convert screen coordinates to image coordinates.
    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        (
            (sx - self.offset_x) / self.scale,
            (sy - self.offset_y) / self.scale,
        )
    }

    /// Zoom toward a focus point (screen coordinates).
    pub fn zoom_at(&mut self, delta: f64, screen_x: f64, screen_y: f64) {
        let factor = (-delta * ZOOM_SENSITIVITY).exp();
        let new_scale = (self.scale * factor).clamp(self.min_scale, self.max_scale);
        let ratio = new_scale / self.scale;

        // Keep the point under the cursor fixed
        self.offset_x = screen_x - (screen_x - self.offset_x) * ratio;
        self.offset_y = screen_y - (screen_y - self.offset_y) * ratio;
        self.scale = new_scale;
    }

    /// Pan by screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Fit the viewport to show the given image bounds with padding.
    pub fn fit_bounds(
        &mut self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        canvas_w: f64,
        canvas_h: f64,
    ) {
        let world_w = max_x - min_x;
        let world_h = max_y - min_y;

        if world_w <= 0.0 || world_h <= 0.0 || canvas_w <= 0.0 || canvas_h <= 0.0 {
            return;
        }

        let padding = 0.05;
        let scale_x = canvas_w / (world_w * (1.0 + padding * 2.0));
        let scale_y = canvas_h / (world_h * (1.0 + padding * 2.0));
        self.scale = scale_x.min(scale_y).clamp(self.min_scale, self.max_scale);

        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;
        self.offset_x = canvas_w / 2.0 - center_x * self.scale;
        self.offset_y = canvas_h / 2.0 - center_y * self.scale;
    }

    /// Derive zoom limits from the base map and fit the whole image.
    pub fn fit_map(&mut self, info: &MapInfo, canvas_w: f64, canvas_h: f64) {
        let pixel_ratio = match info.map_type {
            MapType::Top => TOP_MAX_PIXEL_RATIO,
            MapType::Iso => ISO_MAX_PIXEL_RATIO,
        };
        self.max_scale = pixel_ratio * info.scale;
        self.min_scale = DEFAULT_MIN_SCALE.min(self.max_scale);
        if info.w > 0.0 && info.h > 0.0 {
            self.fit_bounds(0.0, 0.0, info.w, info.h, canvas_w, canvas_h);
            self.min_scale = (self.scale * MIN_ZOOM_IMAGE_RATIO).min(self.max_scale);
        }
    }

    pub fn zoom_bounds(&self) -> ZoomBounds {
        ZoomBounds {
            min: self.min_scale,
            max: self.max_scale,
        }
    }

    /// The image-pixel rectangle currently covered by a canvas of the given size.
    pub fn visible_rect(&self, canvas_w: f64, canvas_h: f64) -> PixelRect {
        let (min_x, min_y) = self.screen_to_world(0.0, 0.0);
        let (max_x, max_y) = self.screen_to_world(canvas_w, canvas_h);
        PixelRect {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Centre the view on the request's image point at the requested scale.
    pub fn apply_pan(&mut self, request: &PanRequest, canvas_w: f64, canvas_h: f64) {
        self.scale = request.zoom.clamp(self.min_scale, self.max_scale);
        self.offset_x = canvas_w / 2.0 - request.center_x * self.scale;
        self.offset_y = canvas_h / 2.0 - request.center_y * self.scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_world_round_trip() {
        let vp = Viewport {
            offset_x: 40.0,
            offset_y: -12.0,
            scale: 2.5,
            ..Viewport::default()
        };
        let (sx, sy) = vp.world_to_screen(100.0, 200.0);
        let (wx, wy) = vp.screen_to_world(sx, sy);
        assert!((wx - 100.0).abs() < 1e-9);
        assert!((wy - 200.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_at_keeps_focus_point_fixed() {
        let mut vp = Viewport::default();
        let before = vp.screen_to_world(300.0, 200.0);
        vp.zoom_at(-200.0, 300.0, 200.0);
        let after = vp.screen_to_world(300.0, 200.0);
        assert!((before.0 - after.0).abs() < 1e-9);
        assert!((before.1 - after.1).abs() < 1e-9);
    }

    #[test]
    fn apply_pan_centres_requested_point() {
        let mut vp = Viewport::default();
        vp.apply_pan(
            &PanRequest {
                center_x: 500.0,
                center_y: 250.0,
                zoom: 2.0,
            },
            800.0,
            600.0,
        );
        assert_eq!(vp.scale, 2.0);
        assert_eq!(vp.world_to_screen(500.0, 250.0), (400.0, 300.0));
    }

    #[test]
    fn fit_map_limits_zoom_by_projection() {
        let mut vp = Viewport::default();
        let info = MapInfo {
            map_type: MapType::Top,
            w: 10_000.0,
            h: 5_000.0,
            scale: 1.0,
            ..MapInfo::default()
        };
        vp.fit_map(&info, 1000.0, 500.0);
        assert_eq!(vp.max_scale, 16.0);
        assert!(vp.min_scale < vp.scale);
        let rect = vp.visible_rect(1000.0, 500.0);
        assert!(rect.min_x < 0.0 && rect.max_x > 10_000.0);
    }

    #[test]
    fn zoom_bounds_interpolate_linearly() {
        let bounds = ZoomBounds { min: 1.0, max: 11.0 };
        assert_eq!(bounds.lerp(0.0), 1.0);
        assert_eq!(bounds.lerp(0.5), 6.0);
        assert_eq!(bounds.lerp(1.0), 11.0);
    }
}
