use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

use pzmap_shared::{Mark, Point, Rect};

use super::{
    DEFAULT_LABEL_FONT, MarkRendered, MarkRenderer, PrimitiveId, RenderEvents, RenderListener,
    ZoomState, label_offset, rect_outline,
};
use crate::config::{LINE_STROKE_PX, POINT_RADIUS_PX, POINT_STROKE_PX};
use crate::coords::ViewTransform;
use crate::spatial::DIFF_SUM_CLASS;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Detached description of an SVG element subtree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SvgNode {
    pub tag: &'static str,
    pub attrs: Vec<(&'static str, String)>,
    pub text: Option<String>,
    pub children: Vec<SvgNode>,
}

impl SvgNode {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    fn child(mut self, child: SvgNode) -> Self {
        self.children.push(child);
        self
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Depth-first search by `id` attribute.
    pub fn find(&self, id: &str) -> Option<&SvgNode> {
        if self.get("id") == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// One DOM mutation for the UI shell to apply inside the overlay group.
#[derive(Debug, Clone, PartialEq)]
pub enum DomPatch {
    Create { element_id: String, node: SvgNode },
    /// Replace the element with a freshly built one (same id).
    Update { element_id: String, node: SvgNode },
    Remove { element_id: String },
    SetTransform { element_id: String, transform: String },
    /// Remove every child of the overlay group.
    Clear,
}

#[derive(Debug, Clone)]
struct Anchor {
    element_id: String,
    at: Point,
}

#[derive(Debug, Clone)]
struct Primitive {
    element_id: String,
    anchor: Option<Anchor>,
}

/// Vector backend. Shapes live in square space under one group whose transform
/// is the square-to-screen matrix; point discs and labels sit in "anchored"
/// children that undo the linear part so they keep a constant pixel size.
#[derive(Debug)]
pub struct SvgOverlay {
    group_id: String,
    next_id: PrimitiveId,
    primitives: BTreeMap<PrimitiveId, Primitive>,
    transform: ViewTransform,
    zoom_level: u32,
    patches: Vec<DomPatch>,
    events: RenderEvents,
}

impl SvgOverlay {
    pub fn new(name: &str) -> Self {
        Self {
            group_id: format!("{name}-marks"),
            next_id: 1,
            primitives: BTreeMap::new(),
            transform: ViewTransform::IDENTITY,
            zoom_level: 0,
            patches: Vec::new(),
            events: RenderEvents::default(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn zoom_level(&self) -> u32 {
        self.zoom_level
    }

    pub fn element_id(&self, primitive: PrimitiveId) -> Option<&str> {
        self.primitives
            .get(&primitive)
            .map(|p| p.element_id.as_str())
    }

    pub fn drain_patches(&mut self) -> Vec<DomPatch> {
        std::mem::take(&mut self.patches)
    }

    pub fn has_pending_patches(&self) -> bool {
        !self.patches.is_empty()
    }

    fn anchor_transform(&self, at: Point) -> String {
        let mut out = format!("translate({} {})", at.x, at.y);
        if let Some(inv) = self.transform.linear_inverse() {
            // adding zero turns -0 into 0
            let [ia, ib, ic, id] = inv.map(|v| v + 0.0);
            let _ = write!(out, " matrix({ia} {ib} {ic} {id} 0 0)");
        }
        out
    }

    fn re_anchor_all(&mut self) {
        let updates: Vec<DomPatch> = self
            .primitives
            .values()
            .filter_map(|p| p.anchor.as_ref())
            .map(|a| DomPatch::SetTransform {
                element_id: a.element_id.clone(),
                transform: self.anchor_transform(a.at),
            })
            .collect();
        self.patches.extend(updates);
    }

    fn root(&self, mark: &Mark, element_id: &str) -> SvgNode {
        let mut class = String::from("mark");
        for c in &mark.class_list {
            class.push(' ');
            class.push_str(c);
        }
        SvgNode::new("g")
            .attr("id", element_id)
            .attr("data-mark-id", mark.id.clone())
            .attr("class", class)
            .attr("pointer-events", "visiblePainted")
    }

    fn anchored(&self, element_id: &str, at: Point) -> (SvgNode, Anchor) {
        let anchor_id = format!("{element_id}-a");
        let node = SvgNode::new("g")
            .attr("id", anchor_id.clone())
            .attr("transform", self.anchor_transform(at));
        (
            node,
            Anchor {
                element_id: anchor_id,
                at,
            },
        )
    }

    fn label(mark: &Mark, dx: f64, dy: f64, align: &'static str) -> Option<SvgNode> {
        let text = mark.display_name()?;
        let font = mark.style.font.as_deref().unwrap_or(DEFAULT_LABEL_FONT);
        Some(
            SvgNode::new("text")
                .attr("x", dx.to_string())
                .attr("y", dy.to_string())
                .attr("text-anchor", align)
                .attr("dominant-baseline", "central")
                .attr("fill", mark.style.color.clone())
                .attr("style", format!("font: {font}"))
                .text(text),
        )
    }

    /// Shape plus an optional anchored label at `label_at`.
    fn with_label(
        &self,
        mut root: SvgNode,
        mark: &Mark,
        element_id: &str,
        label_at: Point,
    ) -> (SvgNode, Option<Anchor>) {
        let Some((dx, dy, align)) = label_offset(mark.style.text_position, 0.0) else {
            return (root, None);
        };
        let Some(label) = Self::label(mark, dx, dy, align) else {
            return (root, None);
        };
        let (group, anchor) = self.anchored(element_id, label_at);
        root = root.child(group.child(label));
        (root, Some(anchor))
    }

    fn put(
        &mut self,
        mark: &Mark,
        kind: &str,
        existing: Option<PrimitiveId>,
        build: impl FnOnce(&Self, &str) -> (SvgNode, Option<Anchor>),
    ) -> PrimitiveId {
        if let Some(id) = existing
            && let Some(element_id) = self.primitives.get(&id).map(|p| p.element_id.clone())
        {
            let (node, anchor) = build(self, &element_id);
            self.patches.push(DomPatch::Update {
                element_id: element_id.clone(),
                node,
            });
            self.primitives.insert(id, Primitive { element_id, anchor });
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;
        let element_id = format!("mark-{kind}-{}-{id}", mark.id);
        let (node, anchor) = build(self, &element_id);
        self.patches.push(DomPatch::Create {
            element_id: element_id.clone(),
            node,
        });
        self.primitives.insert(
            id,
            Primitive {
                element_id: element_id.clone(),
                anchor,
            },
        );
        self.events.emit(&MarkRendered {
            mark_id: mark.id.clone(),
            primitive: id,
            element_id: Some(element_id),
            class_list: mark.class_list.clone(),
        });
        id
    }
}

fn path_data(outlines: impl Iterator<Item = [Point; 4]>) -> String {
    let mut d = String::new();
    for [a, b, c, e] in outlines {
        let _ = write!(
            d,
            "M{} {}L{} {}L{} {}L{} {}Z",
            a.x, a.y, b.x, b.y, c.x, c.y, e.x, e.y
        );
    }
    d
}

fn point_list(points: &[Point]) -> String {
    let mut out = String::new();
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{},{}", p.x, p.y);
    }
    out
}

impl MarkRenderer for SvgOverlay {
    fn draw_point(&mut self, mark: &Mark, at: Point, existing: Option<PrimitiveId>) -> PrimitiveId {
        self.put(mark, "point", existing, |this, element_id| {
            let (mut group, anchor) = this.anchored(element_id, at);
            group = group.child(
                SvgNode::new("circle")
                    .attr("cx", "0")
                    .attr("cy", "0")
                    .attr("r", POINT_RADIUS_PX.to_string())
                    .attr("fill", mark.style.background.clone())
                    .attr("stroke", mark.style.color.clone())
                    .attr("stroke-width", POINT_STROKE_PX.to_string()),
            );
            if let Some((dx, dy, align)) = label_offset(mark.style.text_position, POINT_RADIUS_PX)
                && let Some(label) = SvgOverlay::label(mark, dx, dy, align)
            {
                group = group.child(label);
            }
            (this.root(mark, element_id).child(group), Some(anchor))
        })
    }

    fn draw_area(
        &mut self,
        mark: &Mark,
        rects: &[Rect],
        existing: Option<PrimitiveId>,
    ) -> PrimitiveId {
        let diff_sum = mark.has_class(DIFF_SUM_CLASS);
        self.put(mark, "area", existing, |this, element_id| {
            let d = path_data(rects.iter().map(|r| rect_outline(r, diff_sum)));
            let root = this.root(mark, element_id).child(
                SvgNode::new("path")
                    .attr("d", d)
                    .attr("fill", mark.style.background.clone())
                    .attr("stroke", mark.style.color.clone())
                    .attr("stroke-width", LINE_STROKE_PX.to_string())
                    .attr("vector-effect", "non-scaling-stroke"),
            );
            let center = rects
                .first()
                .map(|r| {
                    let [a, _, c, _] = rect_outline(r, diff_sum);
                    Point::new((a.x + c.x) / 2.0, (a.y + c.y) / 2.0)
                })
                .unwrap_or_default();
            this.with_label(root, mark, element_id, center)
        })
    }

    fn draw_line(
        &mut self,
        mark: &Mark,
        points: &[Point],
        existing: Option<PrimitiveId>,
    ) -> PrimitiveId {
        self.put(mark, "line", existing, |this, element_id| {
            let root = this.root(mark, element_id).child(
                SvgNode::new("polyline")
                    .attr("points", point_list(points))
                    .attr("fill", "none")
                    .attr("stroke", mark.style.color.clone())
                    .attr("stroke-width", LINE_STROKE_PX.to_string())
                    .attr("vector-effect", "non-scaling-stroke"),
            );
            let mid = points.get(points.len() / 2).copied().unwrap_or_default();
            this.with_label(root, mark, element_id, mid)
        })
    }

    fn draw_text(&mut self, mark: &Mark, at: Point, existing: Option<PrimitiveId>) -> PrimitiveId {
        self.put(mark, "text", existing, |this, element_id| {
            let (mut group, anchor) = this.anchored(element_id, at);
            if let Some(label) = SvgOverlay::label(mark, 0.0, 0.0, "middle") {
                group = group.child(label);
            }
            (this.root(mark, element_id).child(group), Some(anchor))
        })
    }

    fn erase(&mut self, primitive: PrimitiveId) {
        if let Some(p) = self.primitives.remove(&primitive) {
            self.patches.push(DomPatch::Remove {
                element_id: p.element_id,
            });
        }
    }

    fn clear(&mut self) {
        self.primitives.clear();
        self.patches.clear();
        self.patches.push(DomPatch::Clear);
    }

    fn update_zoom(&mut self, zoom: ZoomState) {
        self.zoom_level = zoom.level;
        self.update_viewport(zoom.transform);
    }

    fn update_viewport(&mut self, transform: ViewTransform) {
        let rescale = !transform.same_linear_part(&self.transform);
        self.transform = transform;
        self.patches.push(DomPatch::SetTransform {
            element_id: self.group_id.clone(),
            transform: transform.to_svg(),
        });
        if rescale {
            self.re_anchor_all();
        }
    }

    fn subscribe(&mut self, listener: RenderListener) {
        self.events.subscribe(listener);
    }

    fn primitive_count(&self) -> usize {
        self.primitives.len()
    }
}
