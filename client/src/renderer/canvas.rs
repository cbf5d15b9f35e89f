use std::collections::BTreeMap;

use pzmap_shared::{Mark, MarkStyle, Point, Rect};

use super::{
    DEFAULT_LABEL_FONT, MarkRendered, MarkRenderer, PrimitiveId, RenderEvents, RenderListener,
    ZoomState, label_offset, rect_outline,
};
use crate::config::{LINE_STROKE_PX, POINT_RADIUS_PX, POINT_STROKE_PX};
use crate::coords::ViewTransform;
use crate::spatial::DIFF_SUM_CLASS;

/// Screen-space slack so labels and discs near the edge are not culled early.
const CULL_MARGIN_PX: f64 = 64.0;

/// One screen-space drawing operation, in paint order.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Disc {
        x: f64,
        y: f64,
        radius: f64,
        fill: String,
        stroke: String,
        stroke_width: f64,
    },
    Polygon {
        points: Vec<(f64, f64)>,
        fill: String,
        stroke: String,
        stroke_width: f64,
    },
    Polyline {
        points: Vec<(f64, f64)>,
        stroke: String,
        stroke_width: f64,
    },
    Label {
        x: f64,
        y: f64,
        text: String,
        font: String,
        color: String,
        align: &'static str,
    },
}

#[derive(Debug, Clone)]
enum Shape {
    Point(Point),
    Area(Vec<[Point; 4]>),
    Line(Vec<Point>),
    Text(Point),
}

#[derive(Debug, Clone)]
struct Item {
    shape: Shape,
    style: MarkStyle,
    label: Option<String>,
}

/// Canvas backend: a retained display list in square space, projected and
/// culled into a frame of `DrawCommand`s only when something changed.
#[derive(Debug)]
pub struct CanvasOverlay {
    next_id: PrimitiveId,
    items: BTreeMap<PrimitiveId, Item>,
    transform: ViewTransform,
    zoom_level: u32,
    frame: Vec<DrawCommand>,
    frame_size: (f64, f64),
    dirty: bool,
    events: RenderEvents,
}

impl Default for CanvasOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasOverlay {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            items: BTreeMap::new(),
            transform: ViewTransform::IDENTITY,
            zoom_level: 0,
            frame: Vec::new(),
            frame_size: (0.0, 0.0),
            dirty: true,
            events: RenderEvents::default(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn zoom_level(&self) -> u32 {
        self.zoom_level
    }

    /// Draw list for a `width` x `height` canvas. Rebuilt only after a content
    /// or viewport change, or a resize.
    pub fn build_frame(&mut self, width: f64, height: f64) -> &[DrawCommand] {
        if self.dirty || self.frame_size != (width, height) {
            self.frame = self.project(width, height);
            self.frame_size = (width, height);
            self.dirty = false;
        }
        &self.frame
    }

    fn project(&self, width: f64, height: f64) -> Vec<DrawCommand> {
        let t = self.transform;
        let on_screen = |pts: &[(f64, f64)]| {
            let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
            let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
            for &(x, y) in pts {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
            max_x >= -CULL_MARGIN_PX
                && max_y >= -CULL_MARGIN_PX
                && min_x <= width + CULL_MARGIN_PX
                && min_y <= height + CULL_MARGIN_PX
        };

        let mut out = Vec::new();
        for item in self.items.values() {
            let style = &item.style;
            let font = style
                .font
                .clone()
                .unwrap_or_else(|| DEFAULT_LABEL_FONT.to_string());
            let label_at = |anchor: (f64, f64), radius: f64, out: &mut Vec<DrawCommand>| {
                let (Some(text), Some((dx, dy, align))) =
                    (item.label.as_ref(), label_offset(style.text_position, radius))
                else {
                    return;
                };
                out.push(DrawCommand::Label {
                    x: anchor.0 + dx,
                    y: anchor.1 + dy,
                    text: text.clone(),
                    font: font.clone(),
                    color: style.color.clone(),
                    align,
                });
            };

            match &item.shape {
                Shape::Point(p) => {
                    let c = t.apply(p.x, p.y);
                    if !on_screen(&[c]) {
                        continue;
                    }
                    out.push(DrawCommand::Disc {
                        x: c.0,
                        y: c.1,
                        radius: POINT_RADIUS_PX,
                        fill: style.background.clone(),
                        stroke: style.color.clone(),
                        stroke_width: POINT_STROKE_PX,
                    });
                    label_at(c, POINT_RADIUS_PX, &mut out);
                }
                Shape::Text(p) => {
                    let c = t.apply(p.x, p.y);
                    if !on_screen(&[c]) {
                        continue;
                    }
                    if let Some(text) = &item.label {
                        out.push(DrawCommand::Label {
                            x: c.0,
                            y: c.1,
                            text: text.clone(),
                            font: font.clone(),
                            color: style.color.clone(),
                            align: "middle",
                        });
                    }
                }
                Shape::Area(outlines) => {
                    let mut first_center = None;
                    for outline in outlines {
                        let pts: Vec<(f64, f64)> =
                            outline.iter().map(|p| t.apply(p.x, p.y)).collect();
                        if first_center.is_none() {
                            first_center = Some((
                                (pts[0].0 + pts[2].0) / 2.0,
                                (pts[0].1 + pts[2].1) / 2.0,
                            ));
                        }
                        if !on_screen(&pts) {
                            continue;
                        }
                        out.push(DrawCommand::Polygon {
                            points: pts,
                            fill: style.background.clone(),
                            stroke: style.color.clone(),
                            stroke_width: LINE_STROKE_PX,
                        });
                    }
                    if let Some(c) = first_center
                        && on_screen(&[c])
                    {
                        label_at(c, 0.0, &mut out);
                    }
                }
                Shape::Line(points) => {
                    let pts: Vec<(f64, f64)> = points.iter().map(|p| t.apply(p.x, p.y)).collect();
                    if pts.is_empty() || !on_screen(&pts) {
                        continue;
                    }
                    let mid = pts[pts.len() / 2];
                    out.push(DrawCommand::Polyline {
                        points: pts,
                        stroke: style.color.clone(),
                        stroke_width: LINE_STROKE_PX,
                    });
                    label_at(mid, 0.0, &mut out);
                }
            }
        }
        out
    }

    fn put(&mut self, mark: &Mark, shape: Shape, existing: Option<PrimitiveId>) -> PrimitiveId {
        let item = Item {
            shape,
            style: mark.style.clone(),
            label: mark.display_name().map(str::to_string),
        };
        self.dirty = true;
        if let Some(id) = existing
            && let Some(slot) = self.items.get_mut(&id)
        {
            *slot = item;
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, item);
        self.events.emit(&MarkRendered {
            mark_id: mark.id.clone(),
            primitive: id,
            element_id: None,
            class_list: mark.class_list.clone(),
        });
        id
    }
}

impl MarkRenderer for CanvasOverlay {
    fn draw_point(&mut self, mark: &Mark, at: Point, existing: Option<PrimitiveId>) -> PrimitiveId {
        self.put(mark, Shape::Point(at), existing)
    }

    fn draw_area(
        &mut self,
        mark: &Mark,
        rects: &[Rect],
        existing: Option<PrimitiveId>,
    ) -> PrimitiveId {
        let diff_sum = mark.has_class(DIFF_SUM_CLASS);
        let outlines = rects.iter().map(|r| rect_outline(r, diff_sum)).collect();
        self.put(mark, Shape::Area(outlines), existing)
    }

    fn draw_line(
        &mut self,
        mark: &Mark,
        points: &[Point],
        existing: Option<PrimitiveId>,
    ) -> PrimitiveId {
        self.put(mark, Shape::Line(points.to_vec()), existing)
    }

    fn draw_text(&mut self, mark: &Mark, at: Point, existing: Option<PrimitiveId>) -> PrimitiveId {
        self.put(mark, Shape::Text(at), existing)
    }

    fn erase(&mut self, primitive: PrimitiveId) {
        if self.items.remove(&primitive).is_some() {
            self.dirty = true;
        }
    }

    fn clear(&mut self) {
        self.items.clear();
        self.dirty = true;
    }

    fn update_zoom(&mut self, zoom: ZoomState) {
        self.zoom_level = zoom.level;
        self.update_viewport(zoom.transform);
    }

    fn update_viewport(&mut self, transform: ViewTransform) {
        if transform != self.transform {
            self.transform = transform;
            self.dirty = true;
        }
    }

    fn subscribe(&mut self, listener: RenderListener) {
        self.events.subscribe(listener);
    }

    fn primitive_count(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pzmap_shared::TextPosition;

    fn scaled(scale: f64, e: f64, f: f64) -> ViewTransform {
        ViewTransform {
            a: scale,
            d: scale,
            e,
            f,
            ..ViewTransform::IDENTITY
        }
    }

    #[test]
    fn frame_projects_points_to_screen() {
        let mut canvas = CanvasOverlay::new();
        canvas.update_viewport(scaled(2.0, 10.0, 20.0));
        canvas.draw(&Mark::point("a", 5.0, 5.0), None);
        let frame = canvas.build_frame(800.0, 600.0);
        assert!(matches!(
            frame,
            [DrawCommand::Disc { x, y, .. }] if *x == 20.0 && *y == 30.0
        ));
    }

    #[test]
    fn off_screen_marks_are_culled() {
        let mut canvas = CanvasOverlay::new();
        canvas.draw(&Mark::point("near", 10.0, 10.0), None);
        canvas.draw(&Mark::point("far", 5_000.0, 5_000.0), None);
        assert_eq!(canvas.build_frame(800.0, 600.0).len(), 1);
        assert_eq!(canvas.primitive_count(), 2);
    }

    #[test]
    fn frame_is_cached_until_something_changes() {
        let mut canvas = CanvasOverlay::new();
        let id = canvas.draw(&Mark::point("a", 1.0, 1.0), None);
        canvas.build_frame(100.0, 100.0);
        assert!(!canvas.is_dirty());
        canvas.update_viewport(ViewTransform::IDENTITY);
        assert!(!canvas.is_dirty());
        canvas.update_viewport(scaled(1.0, 5.0, 0.0));
        assert!(canvas.is_dirty());
        canvas.build_frame(100.0, 100.0);
        canvas.erase(id);
        assert!(canvas.is_dirty());
        assert!(canvas.build_frame(100.0, 100.0).is_empty());
    }

    #[test]
    fn labels_follow_text_position() {
        let mut canvas = CanvasOverlay::new();
        let mut mark = Mark::point("a", 50.0, 50.0).with_style("red", "white", TextPosition::Right);
        mark.name = Some("Gas Station".into());
        canvas.draw(&mark, None);
        let frame = canvas.build_frame(200.0, 200.0);
        assert_eq!(frame.len(), 2);
        assert!(matches!(
            &frame[1],
            DrawCommand::Label { x, align: "start", text, .. }
                if *x == 50.0 + POINT_RADIUS_PX + 4.0 && text == "Gas Station"
        ));
    }

    #[test]
    fn creation_notifies_without_element_id() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut canvas = CanvasOverlay::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        canvas.subscribe(Box::new(move |e: &MarkRendered| sink.borrow_mut().push(e.clone())));
        let id = canvas.draw(&Mark::point("a", 0.0, 0.0), None);
        canvas.draw(&Mark::point("a", 1.0, 1.0), Some(id));
        let events = seen.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].element_id, None);
    }
}
