//! Browser side of the render backends: SVG patches applied to the DOM,
//! canvas draw lists and grid lines painted through the 2D context.

use std::f64::consts::TAU;

use web_sys::{CanvasRenderingContext2d, Document, Element};

use crate::coords::ViewTransform;
use crate::grid::{GridLine, GridLineKind};
use crate::renderer::vector::SVG_NS;
use crate::renderer::{DomPatch, DrawCommand, SvgNode};

fn build_element(document: &Document, node: &SvgNode) -> Option<Element> {
    let el = document.create_element_ns(Some(SVG_NS), node.tag).ok()?;
    for (name, value) in &node.attrs {
        el.set_attribute(name, value).ok()?;
    }
    if let Some(text) = &node.text {
        el.set_text_content(Some(text));
    }
    for child in &node.children {
        if let Some(child_el) = build_element(document, child) {
            el.append_child(&child_el).ok()?;
        }
    }
    Some(el)
}

/// Apply queued patches under `group`. Elements that are already gone are
/// skipped silently.
pub fn apply_patches(document: &Document, group: &Element, patches: Vec<DomPatch>) {
    for patch in patches {
        match patch {
            DomPatch::Create { node, .. } => {
                if let Some(el) = build_element(document, &node) {
                    group.append_child(&el).ok();
                }
            }
            DomPatch::Update { element_id, node } => {
                let Some(el) = build_element(document, &node) else {
                    continue;
                };
                match document.get_element_by_id(&element_id) {
                    Some(old) => {
                        old.replace_with_with_node_1(&el).ok();
                    }
                    None => {
                        group.append_child(&el).ok();
                    }
                }
            }
            DomPatch::Remove { element_id } => {
                if let Some(el) = document.get_element_by_id(&element_id) {
                    el.remove();
                }
            }
            DomPatch::SetTransform {
                element_id,
                transform,
            } => {
                if let Some(el) = document.get_element_by_id(&element_id) {
                    el.set_attribute("transform", &transform).ok();
                }
            }
            DomPatch::Clear => group.set_inner_html(""),
        }
    }
}

/// Find or create the `<g>` a manager's patches go into.
pub fn ensure_group(document: &Document, svg: &Element, group_id: &str) -> Option<Element> {
    if let Some(existing) = document.get_element_by_id(group_id) {
        return Some(existing);
    }
    let group = document.create_element_ns(Some(SVG_NS), "g").ok()?;
    group.set_attribute("id", group_id).ok()?;
    svg.append_child(&group).ok()?;
    Some(group)
}

pub fn draw_commands(ctx: &CanvasRenderingContext2d, commands: &[DrawCommand]) {
    for command in commands {
        match command {
            DrawCommand::Disc {
                x,
                y,
                radius,
                fill,
                stroke,
                stroke_width,
            } => {
                ctx.begin_path();
                ctx.arc(*x, *y, *radius, 0.0, TAU).ok();
                ctx.set_fill_style_str(fill);
                ctx.fill();
                ctx.set_stroke_style_str(stroke);
                ctx.set_line_width(*stroke_width);
                ctx.stroke();
            }
            DrawCommand::Polygon {
                points,
                fill,
                stroke,
                stroke_width,
            } => {
                trace_path(ctx, points);
                ctx.close_path();
                ctx.set_fill_style_str(fill);
                ctx.fill();
                ctx.set_stroke_style_str(stroke);
                ctx.set_line_width(*stroke_width);
                ctx.stroke();
            }
            DrawCommand::Polyline {
                points,
                stroke,
                stroke_width,
            } => {
                trace_path(ctx, points);
                ctx.set_stroke_style_str(stroke);
                ctx.set_line_width(*stroke_width);
                ctx.stroke();
            }
            DrawCommand::Label {
                x,
                y,
                text,
                font,
                color,
                align,
            } => {
                ctx.set_font(font);
                ctx.set_text_align(align);
                ctx.set_text_baseline("middle");
                ctx.set_line_width(3.0);
                ctx.set_stroke_style_str("rgba(0, 0, 0, 0.8)");
                ctx.stroke_text(text, *x, *y).ok();
                ctx.set_fill_style_str(color);
                ctx.fill_text(text, *x, *y).ok();
            }
        }
    }
}

fn trace_path(ctx: &CanvasRenderingContext2d, points: &[(f64, f64)]) {
    ctx.begin_path();
    let mut iter = points.iter();
    if let Some(&(x, y)) = iter.next() {
        ctx.move_to(x, y);
    }
    for &(x, y) in iter {
        ctx.line_to(x, y);
    }
}

fn grid_stroke(kind: GridLineKind) -> (&'static str, f64) {
    match kind {
        GridLineKind::Cell => ("rgba(255, 255, 0, 0.6)", 2.0),
        GridLineKind::Block => ("rgba(255, 255, 255, 0.35)", 1.0),
        GridLineKind::Square => ("rgba(255, 255, 255, 0.15)", 1.0),
    }
}

/// Grid lines are in square space; `transform` maps them to the screen for
/// the current floor.
pub fn draw_grid(ctx: &CanvasRenderingContext2d, lines: &[GridLine], transform: &ViewTransform) {
    for kind in [GridLineKind::Square, GridLineKind::Block, GridLineKind::Cell] {
        let (color, width) = grid_stroke(kind);
        ctx.begin_path();
        for line in lines.iter().filter(|l| l.kind == kind) {
            let ((x0, y0), (x1, y1)) = if line.vertical {
                (
                    transform.apply(line.at, line.from),
                    transform.apply(line.at, line.to),
                )
            } else {
                (
                    transform.apply(line.from, line.at),
                    transform.apply(line.to, line.at),
                )
            };
            ctx.move_to(x0, y0);
            ctx.line_to(x1, y1);
        }
        ctx.set_stroke_style_str(color);
        ctx.set_line_width(width);
        ctx.stroke();
    }
}
