use std::collections::{HashMap, HashSet};

use pzmap_shared::{MapType, Mark};

use crate::coords::{ViewRange, ViewTransform};
use crate::renderer::{Backend, MarkRenderer, PrimitiveId, RenderListener, RenderMethod, ZoomState};
use crate::spatial::{DebugNode, IndexKind, LayerFilter, MarkIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarkManagerOptions {
    pub index_kind: IndexKind,
    /// Drop the layer-0 sentinel: only marks on the current floor render.
    pub only_current_layer: bool,
    pub render_method: RenderMethod,
}

/// What a manager renders against: the visible square range, the zoom tier,
/// the floor and the square-to-screen transform for that floor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewState {
    pub range: ViewRange,
    pub zoom: u32,
    pub layer: i32,
    pub transform: ViewTransform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub replaced: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedrawStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    primitive: PrimitiveId,
    dirty: bool,
}

/// One logical mark set: its spatial index, its render backend and the cache
/// of primitives currently on screen. Every path that drops a mark from the
/// index drops its cache entry in the same call.
#[derive(Debug)]
pub struct MarkManager {
    name: String,
    options: MarkManagerOptions,
    index: MarkIndex,
    backend: Backend,
    cache: HashMap<String, CacheEntry>,
    view: Option<ViewState>,
    hidden: bool,
}

impl MarkManager {
    pub fn new(name: &str, options: MarkManagerOptions) -> Self {
        Self {
            name: name.to_string(),
            options,
            index: MarkIndex::new(options.index_kind),
            backend: Backend::new(options.render_method, name),
            cache: HashMap::new(),
            view: None,
            hidden: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> MarkManagerOptions {
        self.options
    }

    pub fn view(&self) -> Option<&ViewState> {
        self.view.as_ref()
    }

    pub fn mode(&self) -> MapType {
        self.index.mode()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Mark> {
        self.index.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Mark> {
        self.index.all()
    }

    pub fn rendered_ids(&self) -> impl Iterator<Item = &str> {
        self.cache.keys().map(String::as_str)
    }

    pub fn backend_mut(&mut self) -> &mut Backend {
        &mut self.backend
    }

    pub fn subscribe(&mut self, listener: RenderListener) {
        self.backend.subscribe(listener);
    }

    pub fn debug_nodes(&self, zoom: u32) -> Vec<DebugNode> {
        self.index.debug_nodes(zoom)
    }

    /// Upsert by id. Rejected marks are logged and counted, never indexed.
    pub fn load(&mut self, marks: impl IntoIterator<Item = Mark>) -> LoadReport {
        let mut report = LoadReport::default();
        for mark in marks {
            let id = mark.id.clone();
            match self.index.insert(mark) {
                Ok(replaced) => {
                    report.loaded += 1;
                    if replaced.is_some() {
                        report.replaced += 1;
                    }
                    if let Some(entry) = self.cache.get_mut(&id) {
                        entry.dirty = true;
                    }
                }
                Err(e) => {
                    tracing::warn!(manager = %self.name, mark_id = %id, error = %e, "rejected mark");
                    report.rejected += 1;
                }
            }
        }
        if report.rejected > 0 || report.loaded > 0 {
            tracing::debug!(
                manager = %self.name,
                loaded = report.loaded,
                replaced = report.replaced,
                rejected = report.rejected,
                "marks loaded"
            );
        }
        report
    }

    pub fn remove(&mut self, id: &str) -> Option<Mark> {
        let mark = self.index.remove(id)?;
        if let Some(entry) = self.cache.remove(id) {
            self.backend.erase(entry.primitive);
        }
        Some(mark)
    }

    pub fn remove_all(&mut self) {
        self.index.clear();
        self.clear_render_cache();
    }

    /// Drop every primitive but keep the data; the next redraw is a first paint.
    pub fn clear_render_cache(&mut self) {
        self.cache.clear();
        self.backend.clear();
    }

    /// Switching projection changes every bounding box, so nothing cached survives.
    pub fn change_mode(&mut self, mode: MapType) {
        self.index.change_mode(mode);
        self.clear_render_cache();
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        if hidden && !self.hidden {
            self.clear_render_cache();
        }
        self.hidden = hidden;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Record the view without redrawing. A zoom change goes to the backend as
    /// a rescale, anything else as a plain viewport move.
    pub fn set_view(&mut self, view: ViewState) {
        let zoom_changed = self.view.map(|v| v.zoom) != Some(view.zoom);
        self.view = Some(view);
        if zoom_changed {
            self.backend.update_zoom(ZoomState {
                level: view.zoom,
                transform: view.transform,
            });
        } else {
            self.backend.update_viewport(view.transform);
        }
    }

    pub fn update_viewport(&mut self, view: ViewState) -> RedrawStats {
        self.set_view(view);
        self.redraw_all()
    }

    /// Zoom tier crossed a threshold: a different set of index tiers is
    /// visible, so the visible set is derived again.
    pub fn update_zoom(&mut self, zoom: u32) -> RedrawStats {
        if let Some(mut view) = self.view {
            view.zoom = zoom;
            self.set_view(view);
        }
        self.redraw_all()
    }

    /// Bring the backend in line with the marks visible under the current view.
    /// Unchanged cached primitives are kept; only marks entering or leaving the
    /// visible set create or erase primitives.
    pub fn redraw_all(&mut self) -> RedrawStats {
        let mut stats = RedrawStats::default();
        let Some(view) = self.view else {
            return stats;
        };
        let filter = if self.options.only_current_layer {
            LayerFilter::CurrentOnly
        } else {
            LayerFilter::WithGlobal
        };
        let visible = if self.hidden {
            Vec::new()
        } else {
            self.index
                .query(&view.range, view.zoom, view.layer, filter)
        };
        let visible_ids: HashSet<&str> = visible.iter().map(|m| m.id.as_str()).collect();

        let stale: Vec<String> = self
            .cache
            .keys()
            .filter(|id| !visible_ids.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if let Some(entry) = self.cache.remove(&id) {
                self.backend.erase(entry.primitive);
                stats.removed += 1;
            }
        }

        for mark in visible {
            match self.cache.get_mut(&mark.id) {
                Some(entry) if !entry.dirty => stats.kept += 1,
                Some(entry) => {
                    entry.primitive = self.backend.draw(mark, Some(entry.primitive));
                    entry.dirty = false;
                    stats.updated += 1;
                }
                None => {
                    let primitive = self.backend.draw(mark, None);
                    self.cache.insert(
                        mark.id.clone(),
                        CacheEntry {
                            primitive,
                            dirty: false,
                        },
                    );
                    stats.created += 1;
                }
            }
        }

        if stats.created + stats.updated + stats.removed > 0 {
            tracing::debug!(
                manager = %self.name,
                created = stats.created,
                updated = stats.updated,
                removed = stats.removed,
                kept = stats.kept,
                "redraw"
            );
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::renderer::DomPatch;

    fn view(min: f64, max: f64, zoom: u32, layer: i32) -> ViewState {
        ViewState {
            range: ViewRange {
                min_x: min,
                max_x: max,
                min_y: min,
                max_y: max,
                min_sum: 2.0 * min,
                max_sum: 2.0 * max,
                min_diff: min - max,
                max_diff: max - min,
            },
            zoom,
            layer,
            transform: ViewTransform::IDENTITY,
        }
    }

    fn svg_manager() -> MarkManager {
        MarkManager::new(
            "primary",
            MarkManagerOptions {
                render_method: RenderMethod::Svg,
                ..MarkManagerOptions::default()
            },
        )
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn rendered(manager: &MarkManager) -> BTreeSet<String> {
        manager.rendered_ids().map(str::to_string).collect()
    }

    fn expected_visible(manager: &MarkManager) -> BTreeSet<String> {
        let v = manager.view().copied().unwrap_or_default();
        manager
            .all()
            .filter(|m| {
                let Some((min, max)) = m.geometry.bounds() else {
                    return false;
                };
                m.visible_zoom_level <= v.zoom
                    && (m.layer == v.layer || m.layer == 0)
                    && max.x >= v.range.min_x
                    && min.x <= v.range.max_x
                    && max.y >= v.range.min_y
                    && min.y <= v.range.max_y
            })
            .map(|m| m.id.clone())
            .collect()
    }

    #[test]
    fn load_then_redraw_sees_new_marks_in_same_turn() {
        let mut manager = svg_manager();
        manager.set_view(view(0.0, 100.0, 0, 0));
        let report = manager.load(vec![
            Mark::point("a", 10.0, 10.0),
            Mark::point("b", 20.0, 20.0),
            Mark::point("", 0.0, 0.0),
        ]);
        assert_eq!(
            report,
            LoadReport {
                loaded: 2,
                replaced: 0,
                rejected: 1
            }
        );
        let stats = manager.redraw_all();
        assert_eq!(stats.created, 2);
        assert_eq!(rendered(&manager), ids(&["a", "b"]));
    }

    #[test]
    fn pan_only_touches_entering_and_leaving_marks() {
        let mut manager = svg_manager();
        manager.load((0..10).map(|i| Mark::point(format!("m{i}"), i as f64 * 10.0, i as f64 * 10.0)));
        manager.update_viewport(view(0.0, 45.0, 0, 0));
        assert_eq!(manager.rendered_ids().count(), 5);

        let stats = manager.update_viewport(view(25.0, 65.0, 0, 0));
        assert_eq!(
            stats,
            RedrawStats {
                created: 2,
                updated: 0,
                removed: 3,
                kept: 2
            }
        );
    }

    #[test]
    fn reload_redraws_in_place() {
        let mut manager = svg_manager();
        manager.update_viewport(view(0.0, 100.0, 0, 0));
        manager.load(vec![Mark::point("a", 10.0, 10.0)]);
        manager.redraw_all();
        let report = manager.load(vec![Mark::point("a", 12.0, 12.0)]);
        assert_eq!(report.replaced, 1);
        assert_eq!(manager.len(), 1);
        let stats = manager.redraw_all();
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.created, 0);
    }

    #[test]
    fn reloaded_mark_leaving_view_is_erased() {
        let mut manager = svg_manager();
        manager.update_viewport(view(0.0, 100.0, 0, 0));
        manager.load(vec![Mark::point("a", 10.0, 10.0)]);
        manager.redraw_all();
        manager.load(vec![Mark::point("a", 500.0, 500.0)]);
        let stats = manager.redraw_all();
        assert_eq!(stats.removed, 1);
        assert!(rendered(&manager).is_empty());
    }

    #[test]
    fn zoom_tier_change_rederives_visible_set() {
        let mut manager = svg_manager();
        let mut detail = Mark::point("detail", 5.0, 5.0);
        detail.visible_zoom_level = 2;
        manager.load(vec![Mark::point("always", 5.0, 5.0), detail]);
        manager.update_viewport(view(0.0, 10.0, 0, 0));
        assert_eq!(rendered(&manager), ids(&["always"]));
        manager.update_zoom(2);
        assert_eq!(
            rendered(&manager),
            ids(&["always", "detail"])
        );
        manager.update_zoom(1);
        assert_eq!(rendered(&manager), ids(&["always"]));
    }

    #[test]
    fn only_current_layer_drops_global_marks() {
        let mut manager = MarkManager::new(
            "sys",
            MarkManagerOptions {
                index_kind: IndexKind::Linear,
                only_current_layer: true,
                render_method: RenderMethod::Canvas,
            },
        );
        manager.load(vec![
            Mark::point("ground", 1.0, 1.0),
            Mark::point("first", 1.0, 1.0).on_layer(1),
        ]);
        manager.update_viewport(view(0.0, 10.0, 0, 1));
        assert_eq!(rendered(&manager), ids(&["first"]));
    }

    #[test]
    fn remove_and_remove_all_erase_primitives() {
        let mut manager = svg_manager();
        manager.update_viewport(view(0.0, 100.0, 0, 0));
        manager.load(vec![Mark::point("a", 1.0, 1.0), Mark::point("b", 2.0, 2.0)]);
        manager.redraw_all();
        manager.remove("a");
        assert!(manager.remove("a").is_none());
        assert_eq!(rendered(&manager), ids(&["b"]));
        assert_eq!(manager.backend_mut().primitive_count(), 1);
        manager.remove_all();
        assert!(manager.is_empty());
        assert_eq!(manager.rendered_ids().count(), 0);
        assert_eq!(manager.backend_mut().primitive_count(), 0);
    }

    #[test]
    fn clear_render_cache_keeps_data_and_repaints() {
        let mut manager = svg_manager();
        manager.update_viewport(view(0.0, 100.0, 0, 0));
        manager.load(vec![Mark::point("a", 1.0, 1.0)]);
        manager.redraw_all();
        manager.clear_render_cache();
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.redraw_all().created, 1);
    }

    #[test]
    fn change_mode_invalidates_everything() {
        let mut manager = svg_manager();
        manager.update_viewport(view(0.0, 100.0, 0, 0));
        manager.load(vec![Mark::point("a", 10.0, 5.0)]);
        manager.redraw_all();
        if let Some(svg) = manager.backend_mut().as_svg_mut() {
            svg.drain_patches();
        }
        manager.change_mode(MapType::Iso);
        assert_eq!(manager.mode(), MapType::Iso);
        let patches = manager
            .backend_mut()
            .as_svg_mut()
            .map(|svg| svg.drain_patches())
            .unwrap_or_default();
        assert_eq!(patches, vec![DomPatch::Clear]);
        assert_eq!(manager.redraw_all().created, 1);
    }

    #[test]
    fn hidden_manager_renders_nothing() {
        let mut manager = svg_manager();
        manager.update_viewport(view(0.0, 100.0, 0, 0));
        manager.load(vec![Mark::point("a", 1.0, 1.0)]);
        manager.redraw_all();
        manager.set_hidden(true);
        manager.redraw_all();
        assert_eq!(manager.rendered_ids().count(), 0);
        manager.set_hidden(false);
        assert_eq!(manager.redraw_all().created, 1);
    }

    #[test]
    fn cache_matches_visible_set_after_mixed_operations() {
        let mut manager = svg_manager();
        manager.set_view(view(0.0, 50.0, 0, 0));
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = |bound: u64| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed % bound
        };
        for step in 0..300 {
            match next(5) {
                0 | 1 => {
                    let mut mark = Mark::point(
                        format!("m{}", next(40)),
                        next(200) as f64,
                        next(200) as f64,
                    )
                    .on_layer(next(3) as i32);
                    mark.visible_zoom_level = next(3) as u32;
                    manager.load(vec![mark]);
                }
                2 => {
                    manager.remove(&format!("m{}", next(40)));
                }
                3 => {
                    let lo = next(150) as f64;
                    manager.set_view(view(lo, lo + 50.0, next(4) as u32, next(3) as i32));
                }
                _ => {
                    manager.redraw_all();
                    assert_eq!(
                        rendered(&manager),
                        expected_visible(&manager),
                        "after step {step}"
                    );
                }
            }
        }
        manager.redraw_all();
        assert_eq!(rendered(&manager), expected_visible(&manager));
        assert!(manager.rendered_ids().all(|id| manager.contains(id)));
    }
}
