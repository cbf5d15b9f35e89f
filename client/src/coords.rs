//! Projection between game squares, base-map image pixels and the screen.

use pzmap_shared::{MapInfo, MapType, Point};

use crate::config::CELL_SIZE;
use crate::search::{ResultKind, SearchTarget};
use crate::viewport::{PanRequest, Viewport, ZoomBounds};

/// Iso floors are stacked one and a half squares apart on the image.
const ISO_LAYER_HEIGHT: f64 = 1.5;

/// A rectangle in base-map image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// The visible area expressed in square space, both as an axis-aligned box
/// and as a box in rotated `(diff = x - y, sum = x + y)` space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewRange {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_sum: f64,
    pub max_sum: f64,
    pub min_diff: f64,
    pub max_diff: f64,
}

impl ViewRange {
    /// The query box matching an index built in `mode`: `(x, y)` for top,
    /// `(diff, sum)` for iso.
    pub fn bbox(&self, mode: MapType) -> (Point, Point) {
        match mode {
            MapType::Top => (
                Point::new(self.min_x, self.min_y),
                Point::new(self.max_x, self.max_y),
            ),
            MapType::Iso => (
                Point::new(self.min_diff, self.min_sum),
                Point::new(self.max_diff, self.max_sum),
            ),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Affine map from square space to screen pixels, laid out like an SVG
/// `matrix(a b c d e f)`: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Inverse of the linear part, used to keep markers and labels upright
    /// and at a constant pixel size under the group transform.
    pub fn linear_inverse(&self) -> Option<[f64; 4]> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return None;
        }
        Some([
            self.d / det,
            -self.b / det,
            -self.c / det,
            self.a / det,
        ])
    }

    pub fn same_linear_part(&self, other: &ViewTransform) -> bool {
        self.a == other.a && self.b == other.b && self.c == other.c && self.d == other.d
    }

    pub fn to_svg(&self) -> String {
        format!(
            "matrix({} {} {} {} {} {})",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub mode: MapType,
    pub x0: f64,
    pub y0: f64,
    pub sqr: f64,
    pub cell_size: f64,
}

impl Projection {
    pub fn new(info: &MapInfo) -> Self {
        Self {
            mode: info.map_type,
            x0: info.x0,
            y0: info.y0,
            sqr: info.sqr,
            cell_size: info.cell_size as f64,
        }
    }

    fn half_width(&self) -> f64 {
        self.sqr / 2.0
    }

    fn half_height(&self) -> f64 {
        self.sqr / 4.0
    }

    fn layer_height(&self) -> f64 {
        self.sqr * ISO_LAYER_HEIGHT
    }

    pub fn square_to_pixel(&self, sx: f64, sy: f64, layer: i32) -> (f64, f64) {
        match self.mode {
            MapType::Top => (self.x0 + sx * self.sqr, self.y0 + sy * self.sqr),
            MapType::Iso => (
                self.x0 + (sx - sy) * self.half_width(),
                self.y0 + (sx + sy) * self.half_height() - layer as f64 * self.layer_height(),
            ),
        }
    }

    pub fn pixel_to_square(&self, px: f64, py: f64, layer: i32) -> (f64, f64) {
        match self.mode {
            MapType::Top => ((px - self.x0) / self.sqr, (py - self.y0) / self.sqr),
            MapType::Iso => {
                let diff = (px - self.x0) / self.half_width();
                let sum =
                    (py - self.y0 + layer as f64 * self.layer_height()) / self.half_height();
                ((sum + diff) / 2.0, (sum - diff) / 2.0)
            }
        }
    }

    /// Image position of a (fractional) cell coordinate on the ground floor.
    pub fn cell_to_pixel(&self, gx: f64, gy: f64) -> (f64, f64) {
        self.square_to_pixel(gx * self.cell_size, gy * self.cell_size, 0)
    }

    /// On-screen pixels spanned by one square at the given viewport scale.
    pub fn square_screen_px(&self, viewport_scale: f64) -> f64 {
        self.sqr * viewport_scale
    }

    pub fn view_range(&self, rect: &PixelRect, layer: i32) -> ViewRange {
        match self.mode {
            MapType::Top => {
                let (min_x, min_y) = self.pixel_to_square(rect.min_x, rect.min_y, layer);
                let (max_x, max_y) = self.pixel_to_square(rect.max_x, rect.max_y, layer);
                ViewRange {
                    min_x,
                    max_x,
                    min_y,
                    max_y,
                    min_sum: min_x + min_y,
                    max_sum: max_x + max_y,
                    min_diff: min_x - max_y,
                    max_diff: max_x - min_y,
                }
            }
            MapType::Iso => {
                let lift = layer as f64 * self.layer_height();
                let min_diff = (rect.min_x - self.x0) / self.half_width();
                let max_diff = (rect.max_x - self.x0) / self.half_width();
                let min_sum = (rect.min_y - self.y0 + lift) / self.half_height();
                let max_sum = (rect.max_y - self.y0 + lift) / self.half_height();
                ViewRange {
                    min_x: (min_sum + min_diff) / 2.0,
                    max_x: (max_sum + max_diff) / 2.0,
                    min_y: (min_sum - max_diff) / 2.0,
                    max_y: (max_sum - min_diff) / 2.0,
                    min_sum,
                    max_sum,
                    min_diff,
                    max_diff,
                }
            }
        }
    }

    /// Square-to-screen transform for marks drawn on `layer`.
    pub fn square_transform(&self, layer: i32, vp: &Viewport) -> ViewTransform {
        let s = vp.scale;
        match self.mode {
            MapType::Top => ViewTransform {
                a: s * self.sqr,
                b: 0.0,
                c: 0.0,
                d: s * self.sqr,
                e: s * self.x0 + vp.offset_x,
                f: s * self.y0 + vp.offset_y,
            },
            MapType::Iso => ViewTransform {
                a: s * self.half_width(),
                b: s * self.half_height(),
                c: -s * self.half_width(),
                d: s * self.half_height(),
                e: s * self.x0 + vp.offset_x,
                f: s * (self.y0 - layer as f64 * self.layer_height()) + vp.offset_y,
            },
        }
    }
}

/// Compute the viewport transition for a search target. Targets without a
/// usable x coordinate are rejected.
pub fn pan_to_poi(
    target: &SearchTarget,
    kind: ResultKind,
    projection: &Projection,
    zoom: ZoomBounds,
) -> Option<PanRequest> {
    let (Some(x), Some(y)) = (target.x, target.y) else {
        tracing::error!(name = %target.name, "invalid coordinates for target");
        return None;
    };
    if x == 0.0 || !x.is_finite() || !y.is_finite() {
        tracing::error!(name = %target.name, x, y, "invalid coordinates for target");
        return None;
    }
    let (center_x, center_y) = projection.cell_to_pixel(x / CELL_SIZE, y / CELL_SIZE);
    tracing::debug!(name = %target.name, x, y, kind = kind.as_str(), "pan to target");
    Some(PanRequest {
        center_x,
        center_y,
        zoom: zoom.lerp(kind.zoom_fraction()),
    })
}
