use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use pzmap_shared::Mark;

use crate::markers::MarkManager;
use crate::renderer::{MarkRendered, RenderListener};

/// Marks with any of these classes show a hover tooltip.
pub const TOOLTIP_CLASSES: [&str; 4] = ["poi-marker", "url-marker", "locked-marker", "search-marker"];

const CURSOR_OFFSET_X: f64 = 15.0;
const CURSOR_OFFSET_Y: f64 = -10.0;
const FLIP_GAP: f64 = 15.0;
const EDGE_MARGIN: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub title: String,
    pub body: Option<String>,
}

impl Tooltip {
    pub fn for_mark(mark: &Mark) -> Self {
        Self {
            title: mark.display_name().unwrap_or(&mark.id).to_string(),
            body: mark.desc.clone().filter(|d| !d.is_empty()),
        }
    }
}

/// Element id to mark id, filled from `MarkRendered` notifications.
#[derive(Debug, Clone, Default)]
pub struct TooltipIndex {
    elements: Rc<RefCell<HashMap<String, String>>>,
}

impl TooltipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(&self) -> RenderListener {
        let elements = self.elements.clone();
        Box::new(move |event: &MarkRendered| {
            let wants_tooltip = event
                .class_list
                .iter()
                .any(|c| TOOLTIP_CLASSES.contains(&c.as_str()));
            if wants_tooltip && let Some(element_id) = &event.element_id {
                elements
                    .borrow_mut()
                    .insert(element_id.clone(), event.mark_id.clone());
            }
        })
    }

    pub fn attach(&self, manager: &mut MarkManager) {
        manager.subscribe(self.listener());
    }

    pub fn mark_id(&self, element_id: &str) -> Option<String> {
        self.elements.borrow().get(element_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.borrow().is_empty()
    }

    /// Tooltip for a hovered element, looked up live so a replaced mark shows
    /// its current name.
    pub fn tooltip_for(&self, element_id: &str, manager: &MarkManager) -> Option<Tooltip> {
        let mark_id = self.mark_id(element_id)?;
        manager.get(&mark_id).map(Tooltip::for_mark)
    }

    /// Forget elements whose mark left the manager.
    pub fn prune(&self, manager: &MarkManager) {
        self.elements
            .borrow_mut()
            .retain(|_, mark_id| manager.contains(mark_id));
    }
}

/// Top-left corner for a `size` tooltip next to `cursor`, flipped to the other
/// side of the cursor when it would overflow `window` and kept off the edges.
pub fn position_tooltip(cursor: (f64, f64), size: (f64, f64), window: (f64, f64)) -> (f64, f64) {
    let (cx, cy) = cursor;
    let (w, h) = size;
    let mut left = cx + CURSOR_OFFSET_X;
    let mut top = cy + CURSOR_OFFSET_Y;
    if left + w > window.0 {
        left = cx - w - FLIP_GAP;
    }
    if top + h > window.1 {
        top = cy - h - FLIP_GAP;
    }
    (left.max(EDGE_MARGIN), top.max(EDGE_MARGIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::ViewRange;
    use crate::markers::{MarkManagerOptions, ViewState};
    use crate::renderer::{DomPatch, RenderMethod};

    fn manager() -> MarkManager {
        let mut manager = MarkManager::new(
            "primary",
            MarkManagerOptions {
                render_method: RenderMethod::Svg,
                ..MarkManagerOptions::default()
            },
        );
        manager.set_view(ViewState {
            range: ViewRange {
                max_x: 100.0,
                max_y: 100.0,
                max_sum: 200.0,
                min_diff: -100.0,
                max_diff: 100.0,
                ..ViewRange::default()
            },
            ..ViewState::default()
        });
        manager
    }

    fn element_of(manager: &mut MarkManager, index: &TooltipIndex, mark_id: &str) -> Option<String> {
        let svg = manager.backend_mut().as_svg_mut()?;
        svg.drain_patches().into_iter().find_map(|p| match p {
            DomPatch::Create { element_id, .. }
                if index.mark_id(&element_id).as_deref() == Some(mark_id) =>
            {
                Some(element_id)
            }
            _ => None,
        })
    }

    #[test]
    fn only_tooltip_classes_are_tracked() {
        let mut manager = manager();
        let index = TooltipIndex::new();
        index.attach(&mut manager);
        let mut poi = Mark::point("p1", 10.0, 10.0).with_classes(&["poi-marker", "poi-point"]);
        poi.name = Some("Gas Station".into());
        poi.desc = Some("Fuel".into());
        manager.load(vec![poi, Mark::point("plain", 20.0, 20.0)]);
        manager.redraw_all();
        assert_eq!(index.len(), 1);

        let element = element_of(&mut manager, &index, "p1").expect("poi element created");
        assert_eq!(
            index.tooltip_for(&element, &manager),
            Some(Tooltip {
                title: "Gas Station".into(),
                body: Some("Fuel".into())
            })
        );
    }

    #[test]
    fn removed_marks_have_no_tooltip_and_are_pruned() {
        let mut manager = manager();
        let index = TooltipIndex::new();
        index.attach(&mut manager);
        manager.load(vec![Mark::point("s1", 5.0, 5.0).with_classes(&["search-marker"])]);
        manager.redraw_all();
        let element = element_of(&mut manager, &index, "s1").expect("search element created");
        manager.remove("s1");
        assert!(index.tooltip_for(&element, &manager).is_none());
        index.prune(&manager);
        assert!(index.is_empty());
    }

    #[test]
    fn tooltip_sits_right_of_cursor_when_it_fits() {
        assert_eq!(
            position_tooltip((100.0, 100.0), (200.0, 50.0), (1024.0, 768.0)),
            (115.0, 90.0)
        );
    }

    #[test]
    fn tooltip_flips_at_window_edges() {
        assert_eq!(
            position_tooltip((1000.0, 750.0), (200.0, 50.0), (1024.0, 768.0)),
            (785.0, 685.0)
        );
    }

    #[test]
    fn tooltip_never_leaves_the_top_left_margin() {
        assert_eq!(
            position_tooltip((2.0, 2.0), (400.0, 50.0), (300.0, 768.0)),
            (5.0, 5.0)
        );
    }
}
