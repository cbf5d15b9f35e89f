//! Application state shared by the UI shell: map descriptor, the mark
//! managers, overlay toggles, grid, search highlights and deep-link state.

use std::collections::BTreeMap;

use pzmap_shared::{ContainerSet, MapInfo, MapType, Mark, Rect, TextPosition};

use crate::config::overlay_marks_path;
use crate::containers::{container_marks, find_containers_in_rooms, find_matching_rooms};
use crate::coords::{Projection, pan_to_poi};
use crate::deeplink::{self, ContainerQuery, DeepLink, LOCKED_MARKER_ID, URL_MARKER_ID};
use crate::grid::Grid;
use crate::markers::{LoadReport, MarkManager, MarkManagerOptions, RedrawStats, ViewState};
use crate::renderer::RenderMethod;
use crate::search::{SearchResult, SearchSources};
use crate::search_marks::{SearchMarkers, ShowAll};
use crate::spatial::{DIFF_SUM_CLASS, IndexKind};
use crate::tooltip::TooltipIndex;
use crate::viewport::{PanRequest, Viewport, ZoomBounds};

const DEBUG_RANGE_ID: &str = "debug-range";
const DEBUG_NODE_PREFIX: &str = "debug-node-";
const DEBUG_DEPTH_COLORS: [&str; 6] = ["red", "orange", "yellow", "lime", "cyan", "magenta"];

/// Base-map mark categories that can be switched on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Overlay {
    Rooms,
    Objects,
    Streets,
}

impl Overlay {
    pub const ALL: [Overlay; 3] = [Overlay::Rooms, Overlay::Objects, Overlay::Streets];

    pub fn as_str(self) -> &'static str {
        match self {
            Overlay::Rooms => "rooms",
            Overlay::Objects => "objects",
            Overlay::Streets => "streets",
        }
    }

    pub fn data_path(self) -> String {
        overlay_marks_path(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlayToggles {
    pub rooms: bool,
    pub objects: bool,
    pub streets: bool,
}

impl OverlayToggles {
    pub fn get(&self, overlay: Overlay) -> bool {
        match overlay {
            Overlay::Rooms => self.rooms,
            Overlay::Objects => self.objects,
            Overlay::Streets => self.streets,
        }
    }

    fn set(&mut self, overlay: Overlay, on: bool) {
        match overlay {
            Overlay::Rooms => self.rooms = on,
            Overlay::Objects => self.objects = on,
            Overlay::Streets => self.streets = on,
        }
    }
}

/// What a viewport change did, for the shell's repaint decisions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportUpdate {
    pub zoom_changed: bool,
    pub grid_redrawn: bool,
    pub redraw: RedrawStats,
}

#[derive(Debug)]
pub struct AppContext {
    info: MapInfo,
    projection: Projection,
    layer: i32,
    viewport: Option<(Viewport, f64, f64)>,
    view: Option<ViewState>,

    /// POIs, links and search highlights. SVG so tooltips hit-test on elements.
    pub marker: MarkManager,
    /// Per-floor system marks, always top-down.
    pub sys_marker: MarkManager,
    pub debug_marker: MarkManager,
    overlays: BTreeMap<Overlay, MarkManager>,
    toggles: OverlayToggles,
    grid: Grid,
    tooltips: TooltipIndex,

    pois_visible: bool,
    poi_marks: Vec<Mark>,
    url_marks: Vec<Mark>,
    locked_marks: Vec<Mark>,
    search_markers: SearchMarkers,

    pending_item_search: Option<ContainerQuery>,
    map_loaded: bool,
    load_error: bool,
    debug_index_view: bool,
    debug_range_view: bool,
}

impl AppContext {
    pub fn new(info: MapInfo) -> Self {
        let mut marker = MarkManager::new(
            "marker",
            MarkManagerOptions {
                render_method: RenderMethod::Svg,
                ..MarkManagerOptions::default()
            },
        );
        let sys_marker = MarkManager::new(
            "sys",
            MarkManagerOptions {
                index_kind: IndexKind::Linear,
                only_current_layer: true,
                render_method: RenderMethod::Canvas,
            },
        );
        let debug_marker = MarkManager::new(
            "debug",
            MarkManagerOptions {
                render_method: RenderMethod::Svg,
                ..MarkManagerOptions::default()
            },
        );
        let overlays = Overlay::ALL
            .into_iter()
            .map(|o| {
                let mut manager = MarkManager::new(o.as_str(), MarkManagerOptions::default());
                manager.set_hidden(true);
                (o, manager)
            })
            .collect();
        let tooltips = TooltipIndex::new();
        tooltips.attach(&mut marker);

        let mut ctx = Self {
            grid: Grid::new(info.cell_size),
            projection: Projection::new(&info),
            layer: info.clamp_layer(0),
            info,
            viewport: None,
            view: None,
            marker,
            sys_marker,
            debug_marker,
            overlays,
            toggles: OverlayToggles::default(),
            tooltips,
            pois_visible: true,
            poi_marks: Vec::new(),
            url_marks: Vec::new(),
            locked_marks: Vec::new(),
            search_markers: SearchMarkers::new(),
            pending_item_search: None,
            map_loaded: false,
            load_error: false,
            debug_index_view: false,
            debug_range_view: false,
        };
        ctx.apply_mode();
        ctx
    }

    /// New base map (e.g. top/iso switch). Marks are kept; everything drawn
    /// is dropped and indexes follow the new projection.
    pub fn reset(&mut self, info: MapInfo) {
        tracing::info!(map_type = info.map_type.as_str(), "resetting view");
        self.projection = Projection::new(&info);
        self.layer = info.clamp_layer(self.layer);
        let grid_on = self.grid.is_enabled();
        self.grid = Grid::new(info.cell_size);
        self.grid.set_enabled(grid_on);
        self.info = info;
        self.view = None;
        self.viewport = None;
        for manager in self.managers_mut() {
            manager.clear_render_cache();
        }
        self.apply_mode();
    }

    fn apply_mode(&mut self) {
        let mode = self.info.map_type;
        self.marker.change_mode(mode);
        self.debug_marker.change_mode(mode);
        for manager in self.overlays.values_mut() {
            manager.change_mode(mode);
        }
        // sys marks stay top-down
    }

    pub fn info(&self) -> &MapInfo {
        &self.info
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn view(&self) -> Option<&ViewState> {
        self.view.as_ref()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn toggles(&self) -> OverlayToggles {
        self.toggles
    }

    pub fn tooltips(&self) -> &TooltipIndex {
        &self.tooltips
    }

    pub fn pois_visible(&self) -> bool {
        self.pois_visible
    }

    pub fn overlay(&self, overlay: Overlay) -> Option<&MarkManager> {
        self.overlays.get(&overlay)
    }

    pub fn search_markers(&self) -> &SearchMarkers {
        &self.search_markers
    }

    pub fn set_load_error(&mut self) {
        self.load_error = true;
    }

    pub fn load_error(&self) -> bool {
        self.load_error
    }

    pub fn mark_map_loaded(&mut self) {
        self.map_loaded = true;
    }

    /// Every manager in paint order: overlays below, debug and system marks
    /// above, the primary marker on top.
    pub fn managers_mut(&mut self) -> impl Iterator<Item = &mut MarkManager> {
        self.overlays
            .values_mut()
            .chain([&mut self.debug_marker, &mut self.sys_marker, &mut self.marker])
    }

    /// Square under a screen position on the current floor.
    pub fn square_at(&self, screen_x: f64, screen_y: f64) -> Option<(i64, i64)> {
        let (viewport, _, _) = self.viewport.as_ref()?;
        let (px, py) = viewport.screen_to_world(screen_x, screen_y);
        let (sx, sy) = self.projection.pixel_to_square(px, py, self.layer);
        Some((sx.floor() as i64, sy.floor() as i64))
    }

    /// Derive the view for the current floor and bring every manager and the
    /// grid in line with it.
    pub fn on_viewport_change(&mut self, viewport: &Viewport, width: f64, height: f64) -> ViewportUpdate {
        self.viewport = Some((viewport.clone(), width, height));
        let range = self
            .projection
            .view_range(&viewport.visible_rect(width, height), self.layer);
        let zoom_changed = self
            .grid
            .update(self.projection.square_screen_px(viewport.scale));
        let view = ViewState {
            range,
            zoom: self.grid.tier(),
            layer: self.layer,
            transform: self.projection.square_transform(self.layer, viewport),
        };
        self.view = Some(view);

        if zoom_changed && self.debug_index_view {
            self.refresh_debug_index();
        }
        if self.debug_range_view {
            self.refresh_debug_range();
        }

        let mut update = ViewportUpdate {
            zoom_changed,
            grid_redrawn: self.grid.draw(&range, self.layer),
            redraw: RedrawStats::default(),
        };
        for manager in self.managers_mut() {
            let stats = manager.update_viewport(view);
            update.redraw.created += stats.created;
            update.redraw.updated += stats.updated;
            update.redraw.removed += stats.removed;
            update.redraw.kept += stats.kept;
        }
        update
    }

    fn refresh_view(&mut self) {
        if let Some((viewport, w, h)) = self.viewport.clone() {
            self.on_viewport_change(&viewport, w, h);
        }
    }

    fn redraw_all(&mut self) {
        for manager in self.managers_mut() {
            manager.redraw_all();
        }
    }

    /// Switch floor, clamped to the map's layer range. Returns the floor used.
    pub fn set_layer(&mut self, layer: i32) -> i32 {
        let layer = self.info.clamp_layer(layer);
        if layer != self.layer {
            tracing::debug!(layer, "floor changed");
            self.layer = layer;
            self.refresh_view();
        }
        self.layer
    }

    pub fn load_pois(&mut self, marks: Vec<Mark>) -> LoadReport {
        self.poi_marks = marks;
        let report = if self.pois_visible {
            self.marker.load(self.poi_marks.clone())
        } else {
            LoadReport::default()
        };
        self.marker.redraw_all();
        report
    }

    pub fn load_overlay(&mut self, overlay: Overlay, marks: Vec<Mark>) -> LoadReport {
        let Some(manager) = self.overlays.get_mut(&overlay) else {
            return LoadReport::default();
        };
        let report = manager.load(marks);
        tracing::info!(overlay = overlay.as_str(), loaded = report.loaded, "overlay marks loaded");
        manager.redraw_all();
        report
    }

    /// Hiding POIs also hides link/lock markers and drops search highlights.
    pub fn toggle_pois(&mut self) -> bool {
        self.pois_visible = !self.pois_visible;
        if self.pois_visible {
            let marks: Vec<Mark> = self
                .poi_marks
                .iter()
                .chain(&self.url_marks)
                .chain(&self.locked_marks)
                .cloned()
                .collect();
            self.marker.load(marks);
        } else {
            let ids: Vec<String> = self
                .poi_marks
                .iter()
                .chain(&self.url_marks)
                .chain(&self.locked_marks)
                .map(|m| m.id.clone())
                .collect();
            for id in ids {
                self.marker.remove(&id);
            }
            self.search_markers.clear(&mut self.marker);
            self.tooltips.prune(&self.marker);
        }
        self.marker.redraw_all();
        self.pois_visible
    }

    pub fn set_overlay(&mut self, overlay: Overlay, on: bool) {
        self.toggles.set(overlay, on);
        if let Some(manager) = self.overlays.get_mut(&overlay) {
            manager.set_hidden(!on);
            manager.redraw_all();
        }
    }

    pub fn toggle_overlay(&mut self, overlay: Overlay) -> bool {
        let on = !self.toggles.get(overlay);
        self.set_overlay(overlay, on);
        on
    }

    pub fn toggle_grid(&mut self) -> bool {
        let on = self.grid.toggle();
        if on && let Some(view) = self.view {
            self.grid.draw(&view.range, self.layer);
        }
        on
    }

    /// Coordinate links pan immediately; container searches wait until the map
    /// has loaded and POIs are visible.
    pub fn apply_deep_link(&mut self, link: DeepLink, zoom: ZoomBounds) -> Option<PanRequest> {
        match link {
            DeepLink::Coordinates(coords) => {
                let pan = deeplink::resolve(&coords, &self.projection, zoom, self.info.layers());
                let mark = deeplink::url_marker(&coords);
                self.url_marks = vec![mark.clone()];
                if self.pois_visible {
                    self.marker.load([mark]);
                    self.marker.redraw_all();
                }
                tracing::info!(x = coords.x, y = coords.y, zoom = coords.zoom, "panning to linked coordinates");
                Some(pan)
            }
            DeepLink::ContainerSearch(query) => {
                self.pending_item_search = Some(query);
                None
            }
        }
    }

    pub fn has_pending_item_search(&self) -> bool {
        self.pending_item_search.is_some()
    }

    /// Hands out the deferred container search once it can run.
    pub fn take_pending_item_search(&mut self) -> Option<ContainerQuery> {
        if !self.map_loaded || !self.pois_visible {
            return None;
        }
        self.pending_item_search.take()
    }

    /// Highlight containers of the queried type inside rooms matching its
    /// room name. Rooms come from the rooms overlay data.
    pub fn show_containers(&mut self, query: &ContainerQuery, containers: Option<&ContainerSet>) -> usize {
        let Some(containers) = containers else {
            tracing::warn!(container_type = %query.container_type, "container type not found");
            return 0;
        };
        let Some(rooms) = self.overlays.get(&Overlay::Rooms) else {
            return 0;
        };
        let matching = find_matching_rooms(rooms.all(), &query.room);
        if matching.is_empty() {
            tracing::warn!(room = %query.room, "no rooms found matching");
            return 0;
        }
        let hits = find_containers_in_rooms(containers, &matching);
        if hits.is_empty() {
            tracing::warn!(
                container_type = %query.container_type,
                room = %query.room,
                "no containers found in matching rooms"
            );
            return 0;
        }
        tracing::info!(
            count = hits.len(),
            rooms = matching.len(),
            container_type = %query.container_type,
            "containers found"
        );
        let marks = container_marks(&hits, &query.container_type, &query.room);
        let added = self.search_markers.add_marks(&mut self.marker, marks);
        self.marker.redraw_all();
        added
    }

    /// Pin the square under the cursor. Returns the shareable query string.
    pub fn lock_coordinates(&mut self, sx: i64, sy: i64) -> String {
        let mark = deeplink::locked_marker(sx, sy);
        self.locked_marks = vec![mark.clone()];
        if self.pois_visible {
            self.marker.load([mark]);
            self.marker.redraw_all();
        }
        tracing::info!(sx, sy, "coordinates locked");
        deeplink::coordinate_query(sx, sy)
    }

    pub fn unlock_coordinates(&mut self) {
        self.locked_marks.clear();
        self.marker.remove(LOCKED_MARKER_ID);
        self.marker.redraw_all();
    }

    pub fn is_locked(&self) -> bool {
        !self.locked_marks.is_empty()
    }

    /// Index and range debug views, in that order.
    pub fn debug_views(&self) -> (bool, bool) {
        (self.debug_index_view, self.debug_range_view)
    }

    pub fn has_url_marker(&self) -> bool {
        self.marker.contains(URL_MARKER_ID)
    }

    /// Show the primary index's R-tree node boxes, coloured by depth.
    pub fn debug_toggle_index_view(&mut self) -> bool {
        self.debug_index_view = !self.debug_index_view;
        self.refresh_debug_index();
        self.debug_index_view
    }

    /// Show the square range the managers currently query.
    pub fn debug_toggle_range_view(&mut self) -> bool {
        self.debug_range_view = !self.debug_range_view;
        self.refresh_debug_range();
        self.debug_range_view
    }

    fn refresh_debug_index(&mut self) {
        let stale: Vec<String> = self
            .debug_marker
            .all()
            .filter(|m| m.id.starts_with(DEBUG_NODE_PREFIX))
            .map(|m| m.id.clone())
            .collect();
        for id in stale {
            self.debug_marker.remove(&id);
        }
        if self.debug_index_view {
            let zoom = self.view.map_or(0, |v| v.zoom);
            let diff_sum = self.marker.mode() == MapType::Iso;
            let marks: Vec<Mark> = self
                .marker
                .debug_nodes(zoom)
                .into_iter()
                .enumerate()
                .map(|(i, node)| {
                    let rect = Rect {
                        x: node.min.x,
                        y: node.min.y,
                        width: node.max.x - node.min.x,
                        height: node.max.y - node.min.y,
                    };
                    let color = DEBUG_DEPTH_COLORS[node.depth % DEBUG_DEPTH_COLORS.len()];
                    debug_area(format!("{DEBUG_NODE_PREFIX}{i}"), rect, color, diff_sum)
                })
                .collect();
            tracing::debug!(nodes = marks.len(), "index debug view");
            self.debug_marker.load(marks);
        }
        self.debug_marker.redraw_all();
    }

    fn refresh_debug_range(&mut self) {
        self.debug_marker.remove(DEBUG_RANGE_ID);
        if self.debug_range_view
            && let Some(view) = self.view
        {
            let mode = self.debug_marker.mode();
            let (min, max) = view.range.bbox(mode);
            let rect = Rect {
                x: min.x,
                y: min.y,
                width: max.x - min.x,
                height: max.y - min.y,
            };
            let diff_sum = mode == MapType::Iso;
            self.debug_marker
                .load([debug_area(DEBUG_RANGE_ID.into(), rect, "white", diff_sum)]);
        }
        self.debug_marker.redraw_all();
    }

    /// Borrow everything searchable.
    pub fn search_sources(&self) -> SearchSources<'_> {
        SearchSources {
            pois: &self.poi_marks,
            streets: self.overlay_marks(Overlay::Streets),
            objects: self.overlay_marks(Overlay::Objects),
            rooms: self.overlay_marks(Overlay::Rooms),
        }
    }

    fn overlay_marks(&self, overlay: Overlay) -> Vec<&Mark> {
        self.overlays
            .get(&overlay)
            .map(|m| m.all().collect())
            .unwrap_or_default()
    }

    /// Tile results highlight every location of the sprite; anything else is
    /// marked, has its overlay switched on and yields a pan target.
    pub fn select_result(&mut self, result: &SearchResult, zoom: ZoomBounds) -> Option<PanRequest> {
        self.search_markers.clear(&mut self.marker);
        let pan = match &result.target.tile {
            Some(tile) => {
                self.search_markers.add_tile_markers(&mut self.marker, tile);
                None
            }
            None => {
                let pan = pan_to_poi(&result.target, result.kind, &self.projection, zoom);
                self.search_markers.add_purple_marker(&mut self.marker, result);
                if let Some(overlay) = result.kind.overlay() {
                    self.set_overlay(overlay, true);
                }
                pan
            }
        };
        self.marker.redraw_all();
        pan
    }

    pub fn show_all_results(&mut self, results: &[SearchResult]) -> ShowAll {
        let outcome = self.search_markers.show_all(&mut self.marker, results);
        for overlay in &outcome.overlays {
            self.set_overlay(*overlay, true);
        }
        self.redraw_all();
        outcome
    }

    pub fn clear_search(&mut self) -> usize {
        let removed = self.search_markers.clear(&mut self.marker);
        self.tooltips.prune(&self.marker);
        self.marker.redraw_all();
        removed
    }

    /// Zoom bounds of the last viewport seen, for callers without one at hand.
    pub fn current_zoom_bounds(&self) -> Option<ZoomBounds> {
        self.viewport.as_ref().map(|(v, _, _)| v.zoom_bounds())
    }
}

fn debug_area(id: String, rect: Rect, color: &str, diff_sum: bool) -> Mark {
    let classes: &[&str] = if diff_sum {
        &["debug-marker", DIFF_SUM_CLASS]
    } else {
        &["debug-marker"]
    };
    Mark::area(id, vec![rect])
        .with_style(color, "transparent", TextPosition::None)
        .with_classes(classes)
}
