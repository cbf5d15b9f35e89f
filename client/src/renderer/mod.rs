//! Render backends for mark sets. Both keep geometry in square space and only
//! re-project when the view transform changes.

pub mod canvas;
pub mod vector;

use std::str::FromStr;

use pzmap_shared::{Geometry, Mark, Point, Rect};
use thiserror::Error;

use crate::coords::ViewTransform;

pub use canvas::{CanvasOverlay, DrawCommand};
pub use vector::{DomPatch, SvgNode, SvgOverlay};

pub(crate) const DEFAULT_LABEL_FONT: &str = "12px Arial, sans-serif";

/// Handle of one on-screen primitive, unique within a backend.
pub type PrimitiveId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMethod {
    #[default]
    Canvas,
    Svg,
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown render method: {0}")]
pub struct UnknownRenderMethod(pub String);

impl FromStr for RenderMethod {
    type Err = UnknownRenderMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "canvas" | "osd" => Ok(RenderMethod::Canvas),
            "svg" => Ok(RenderMethod::Svg),
            other => Err(UnknownRenderMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    pub level: u32,
    pub transform: ViewTransform,
}

/// Emitted after a backend creates a primitive (not on in-place updates).
#[derive(Debug, Clone, PartialEq)]
pub struct MarkRendered {
    pub mark_id: String,
    pub primitive: PrimitiveId,
    /// DOM id of the element, for backends that create one.
    pub element_id: Option<String>,
    pub class_list: Vec<String>,
}

pub type RenderListener = Box<dyn FnMut(&MarkRendered)>;

#[derive(Default)]
pub(crate) struct RenderEvents {
    listeners: Vec<RenderListener>,
}

impl RenderEvents {
    pub(crate) fn subscribe(&mut self, listener: RenderListener) {
        self.listeners.push(listener);
    }

    pub(crate) fn emit(&mut self, event: &MarkRendered) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for RenderEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEvents")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Capability set shared by the vector and canvas drawers. Every `draw_*`
/// call creates a primitive when `existing` is `None` and updates it in place
/// otherwise; the returned id is the handle to keep in the render cache.
pub trait MarkRenderer {
    fn draw_point(&mut self, mark: &Mark, at: Point, existing: Option<PrimitiveId>) -> PrimitiveId;
    fn draw_area(&mut self, mark: &Mark, rects: &[Rect], existing: Option<PrimitiveId>)
    -> PrimitiveId;
    fn draw_line(&mut self, mark: &Mark, points: &[Point], existing: Option<PrimitiveId>)
    -> PrimitiveId;
    fn draw_text(&mut self, mark: &Mark, at: Point, existing: Option<PrimitiveId>) -> PrimitiveId;

    fn erase(&mut self, primitive: PrimitiveId);
    fn clear(&mut self);
    fn update_zoom(&mut self, zoom: ZoomState);
    fn update_viewport(&mut self, transform: ViewTransform);
    fn subscribe(&mut self, listener: RenderListener);
    fn primitive_count(&self) -> usize;

    fn draw(&mut self, mark: &Mark, existing: Option<PrimitiveId>) -> PrimitiveId {
        match &mark.geometry {
            Geometry::Point { x, y } => self.draw_point(mark, Point::new(*x, *y), existing),
            Geometry::Area { rects } => self.draw_area(mark, rects, existing),
            Geometry::Line { points } => self.draw_line(mark, points, existing),
            Geometry::Text { x, y } => self.draw_text(mark, Point::new(*x, *y), existing),
        }
    }
}

/// Backend chosen once when a mark manager is built.
#[derive(Debug)]
pub enum Backend {
    Canvas(CanvasOverlay),
    Svg(SvgOverlay),
}

impl Backend {
    pub fn new(method: RenderMethod, name: &str) -> Self {
        match method {
            RenderMethod::Canvas => Backend::Canvas(CanvasOverlay::new()),
            RenderMethod::Svg => Backend::Svg(SvgOverlay::new(name)),
        }
    }

    pub fn method(&self) -> RenderMethod {
        match self {
            Backend::Canvas(_) => RenderMethod::Canvas,
            Backend::Svg(_) => RenderMethod::Svg,
        }
    }

    pub fn as_svg_mut(&mut self) -> Option<&mut SvgOverlay> {
        match self {
            Backend::Svg(svg) => Some(svg),
            Backend::Canvas(_) => None,
        }
    }

    pub fn as_canvas_mut(&mut self) -> Option<&mut CanvasOverlay> {
        match self {
            Backend::Canvas(canvas) => Some(canvas),
            Backend::Svg(_) => None,
        }
    }

    fn inner(&mut self) -> &mut dyn MarkRenderer {
        match self {
            Backend::Canvas(canvas) => canvas,
            Backend::Svg(svg) => svg,
        }
    }
}

impl MarkRenderer for Backend {
    fn draw_point(&mut self, mark: &Mark, at: Point, existing: Option<PrimitiveId>) -> PrimitiveId {
        self.inner().draw_point(mark, at, existing)
    }

    fn draw_area(
        &mut self,
        mark: &Mark,
        rects: &[Rect],
        existing: Option<PrimitiveId>,
    ) -> PrimitiveId {
        self.inner().draw_area(mark, rects, existing)
    }

    fn draw_line(
        &mut self,
        mark: &Mark,
        points: &[Point],
        existing: Option<PrimitiveId>,
    ) -> PrimitiveId {
        self.inner().draw_line(mark, points, existing)
    }

    fn draw_text(&mut self, mark: &Mark, at: Point, existing: Option<PrimitiveId>) -> PrimitiveId {
        self.inner().draw_text(mark, at, existing)
    }

    fn erase(&mut self, primitive: PrimitiveId) {
        self.inner().erase(primitive);
    }

    fn clear(&mut self) {
        self.inner().clear();
    }

    fn update_zoom(&mut self, zoom: ZoomState) {
        self.inner().update_zoom(zoom);
    }

    fn update_viewport(&mut self, transform: ViewTransform) {
        self.inner().update_viewport(transform);
    }

    fn subscribe(&mut self, listener: RenderListener) {
        self.inner().subscribe(listener);
    }

    fn primitive_count(&self) -> usize {
        match self {
            Backend::Canvas(canvas) => canvas.primitive_count(),
            Backend::Svg(svg) => svg.primitive_count(),
        }
    }
}

/// Area rects of `diff-sum` marks are boxes in `(diff, sum)` space; their
/// outline in square space is a diamond.
pub(crate) fn rect_outline(rect: &Rect, diff_sum: bool) -> [Point; 4] {
    let (x0, y0, x1, y1) = (rect.x, rect.y, rect.x + rect.width, rect.y + rect.height);
    let corners = [
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ];
    if !diff_sum {
        return corners;
    }
    corners.map(|c| Point::new((c.y + c.x) / 2.0, (c.y - c.x) / 2.0))
}

/// Offset of a point label from its anchor, in screen pixels, and the SVG
/// `text-anchor` / canvas `textAlign` that goes with it.
pub(crate) fn label_offset(
    position: pzmap_shared::TextPosition,
    radius: f64,
) -> Option<(f64, f64, &'static str)> {
    use pzmap_shared::TextPosition;
    let gap = radius + 4.0;
    match position {
        TextPosition::None => None,
        TextPosition::Center => Some((0.0, 0.0, "middle")),
        TextPosition::Top => Some((0.0, -gap, "middle")),
        TextPosition::Bottom => Some((0.0, gap, "middle")),
        TextPosition::Left => Some((-gap, 0.0, "end")),
        TextPosition::Right => Some((gap, 0.0, "start")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pzmap_shared::TextPosition;

    #[test]
    fn render_method_parses_aliases() {
        assert_eq!("svg".parse(), Ok(RenderMethod::Svg));
        assert_eq!("OSD".parse(), Ok(RenderMethod::Canvas));
        assert_eq!("canvas".parse(), Ok(RenderMethod::Canvas));
        assert!("webgl".parse::<RenderMethod>().is_err());
    }

    #[test]
    fn backend_reports_selected_method() {
        let mut svg = Backend::new(RenderMethod::Svg, "debug");
        assert_eq!(svg.method(), RenderMethod::Svg);
        assert!(svg.as_svg_mut().is_some());
        assert!(svg.as_canvas_mut().is_none());
        let canvas = Backend::new(RenderMethod::Canvas, "sys");
        assert_eq!(canvas.method(), RenderMethod::Canvas);
    }

    #[test]
    fn draw_dispatches_on_geometry() {
        let mut backend = Backend::new(RenderMethod::Canvas, "test");
        let point = Mark::point("p", 1.0, 2.0);
        let area = Mark::area(
            "a",
            vec![Rect {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            }],
        );
        let first = backend.draw(&point, None);
        let second = backend.draw(&area, None);
        assert_ne!(first, second);
        assert_eq!(backend.primitive_count(), 2);
        assert_eq!(backend.draw(&point, Some(first)), first);
        assert_eq!(backend.primitive_count(), 2);
    }

    #[test]
    fn diff_sum_outline_maps_back_to_squares() {
        let rect = Rect {
            x: 0.0,
            y: 10.0,
            width: 2.0,
            height: 2.0,
        };
        let outline = rect_outline(&rect, true);
        // (diff 0, sum 10) is square (5, 5)
        assert_eq!(outline[0], Point::new(5.0, 5.0));
        assert_eq!(outline[2], Point::new(7.0, 5.0));
    }

    #[test]
    fn label_offsets_follow_text_position() {
        assert!(label_offset(TextPosition::None, 9.0).is_none());
        assert_eq!(label_offset(TextPosition::Right, 9.0), Some((13.0, 0.0, "start")));
        assert_eq!(label_offset(TextPosition::Top, 9.0), Some((0.0, -13.0, "middle")));
    }
}
