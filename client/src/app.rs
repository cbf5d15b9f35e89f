use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use pzmap_shared::MapInfo;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, PointerEvent, WheelEvent};

use crate::config::{MAP_INFO_PATH, QueryFlags, location_query};
use crate::context::{AppContext, Overlay};
use crate::data::{self, Fetch, HttpFetch, SpriteCache};
use crate::deeplink::{self, ContainerQuery, DeepLink};
use crate::paint;
use crate::render_loop::RenderScheduler;
use crate::search::{SearchEngine, SearchSession, SearchView};
use crate::tooltip::{Tooltip, position_tooltip};
use crate::viewport::Viewport;

const SVG_HOST_ID: &str = "pzmap-marks";

/// Toolbar state mirrored out of the `AppContext` after every action.
#[derive(Debug, Clone, Default, PartialEq)]
struct UiState {
    pois: bool,
    grid: bool,
    rooms: bool,
    objects: bool,
    streets: bool,
    layer: i32,
    locked: bool,
    debug_index: bool,
    debug_range: bool,
}

impl UiState {
    fn from_context(ctx: &AppContext) -> Self {
        let toggles = ctx.toggles();
        let (debug_index, debug_range) = ctx.debug_views();
        Self {
            pois: ctx.pois_visible(),
            grid: ctx.grid().is_enabled(),
            rooms: toggles.get(Overlay::Rooms),
            objects: toggles.get(Overlay::Objects),
            streets: toggles.get(Overlay::Streets),
            layer: ctx.layer(),
            locked: ctx.is_locked(),
            debug_index,
            debug_range,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct TooltipState {
    tooltip: Tooltip,
    left: f64,
    top: f64,
}

/// Everything the viewer's handlers share. Signals drive the view; the rest
/// stays on this thread behind `Rc`.
#[derive(Clone)]
struct Shell {
    ctx: Rc<RefCell<AppContext>>,
    fetch: Rc<dyn Fetch>,
    engine: Rc<SearchEngine>,
    session: Rc<RefCell<SearchSession>>,
    size: Rc<Cell<(f64, f64)>>,
    viewport: RwSignal<Viewport>,
    repaint: RwSignal<u64>,
    ui: RwSignal<UiState>,
    search_view: RwSignal<SearchView>,
    search_open: RwSignal<bool>,
    link: RwSignal<Option<String>>,
}

impl Shell {
    fn repaint(&self) {
        self.repaint.update(|n| *n += 1);
    }

    fn sync_ui(&self) {
        let state = UiState::from_context(&self.ctx.borrow());
        self.ui.set(state);
        self.repaint();
    }

    fn toggle_pois(&self) {
        let on = self.ctx.borrow_mut().toggle_pois();
        if !on {
            self.session.borrow_mut().hide();
            self.search_open.set(false);
        }
        self.sync_ui();
    }

    fn toggle_overlay(&self, overlay: Overlay) {
        self.ctx.borrow_mut().toggle_overlay(overlay);
        self.sync_ui();
    }

    fn toggle_grid(&self) {
        self.ctx.borrow_mut().toggle_grid();
        self.sync_ui();
    }

    fn step_layer(&self, step: i32) {
        {
            let mut ctx = self.ctx.borrow_mut();
            let layer = ctx.layer();
            ctx.set_layer(layer + step);
        }
        self.sync_ui();
    }

    fn toggle_lock(&self, cursor: Option<(i64, i64)>) {
        {
            let mut ctx = self.ctx.borrow_mut();
            if ctx.is_locked() {
                ctx.unlock_coordinates();
                self.link.set(None);
            } else if let Some((sx, sy)) = cursor {
                let query = ctx.lock_coordinates(sx, sy);
                self.link.set(Some(query));
            }
        }
        self.sync_ui();
    }

    fn toggle_debug(&self, index_view: bool) {
        {
            let mut ctx = self.ctx.borrow_mut();
            if index_view {
                ctx.debug_toggle_index_view();
            } else {
                ctx.debug_toggle_range_view();
            }
        }
        self.sync_ui();
    }

    fn run_search(&self, text: String) {
        if text.trim().is_empty() {
            self.session.borrow_mut().clear();
            self.search_view.set(SearchView::default());
            self.search_open.set(false);
            return;
        }
        let ticket = self.session.borrow_mut().begin();
        let shell = self.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let results = shell.engine.search(&text, &shell.ctx).await;
            let mut session = shell.session.borrow_mut();
            if session.apply(ticket, results) {
                shell.search_view.set(session.view());
                shell.search_open.set(true);
            }
        });
    }

    fn select_result(&self, index: usize) {
        let Some(result) = self.session.borrow().results().get(index).cloned() else {
            return;
        };
        let zoom = self.viewport.get_untracked().zoom_bounds();
        let pan = self.ctx.borrow_mut().select_result(&result, zoom);
        if let Some(pan) = pan {
            let (w, h) = self.size.get();
            self.viewport.update(|vp| vp.apply_pan(&pan, w, h));
        }
        self.session.borrow_mut().hide();
        self.search_open.set(false);
        self.sync_ui();
    }

    fn show_all(&self) {
        let session = self.session.borrow();
        let outcome = self.ctx.borrow_mut().show_all_results(session.results());
        tracing::debug!(overlays = outcome.overlays.len(), "overlays enabled for results");
        self.search_open.set(false);
        drop(session);
        self.session.borrow_mut().hide();
        self.sync_ui();
    }

    fn clear_search(&self) {
        self.session.borrow_mut().clear();
        self.ctx.borrow_mut().clear_search();
        self.search_view.set(SearchView::default());
        self.search_open.set(false);
        self.sync_ui();
    }
}

fn spawn_container_search(shell: Shell, query: ContainerQuery) {
    wasm_bindgen_futures::spawn_local(async move {
        let containers = data::load_containers(shell.fetch.as_ref(), &query.container_type).await;
        let added = shell
            .ctx
            .borrow_mut()
            .show_containers(&query, containers.as_ref());
        tracing::info!(added, container_type = %query.container_type, "container search done");
        shell.repaint();
    });
}

/// Marks, overlays and POIs load in the background; the viewer is usable
/// before they arrive.
fn spawn_initial_loads(shell: Shell) {
    wasm_bindgen_futures::spawn_local(async move {
        let fetch = shell.fetch.clone();
        let pois = data::load_poi_marks(fetch.as_ref()).await;
        shell.ctx.borrow_mut().load_pois(pois);
        for overlay in Overlay::ALL {
            let marks = data::load_marks(fetch.as_ref(), &overlay.data_path()).await;
            let report = shell.ctx.borrow_mut().load_overlay(overlay, marks);
            tracing::debug!(overlay = overlay.as_str(), loaded = report.loaded, "overlay loaded");
        }
        shell.ctx.borrow_mut().mark_map_loaded();
        shell.sync_ui();
    });
}

fn canvas_2d(canvas: &web_sys::HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .ok()
        .flatten()
        .and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
}

/// One frame: size the surfaces, push the viewport into every manager, then
/// flush SVG patches and repaint the canvas. Returns `true` to ask for
/// another frame.
fn paint_frame(
    shell: &Shell,
    info: &MapInfo,
    canvas_ref: NodeRef<leptos::html::Canvas>,
    fitted: &Cell<bool>,
) -> bool {
    let Some(canvas) = canvas_ref.get_untracked() else {
        return false;
    };
    let Some(parent) = canvas.parent_element() else {
        return false;
    };
    let (w, h) = (parent.client_width() as f64, parent.client_height() as f64);
    if w <= 0.0 || h <= 0.0 {
        return false;
    }
    if canvas.width() != w as u32 || canvas.height() != h as u32 {
        canvas.set_width(w as u32);
        canvas.set_height(h as u32);
    }
    shell.size.set((w, h));

    if !fitted.replace(true) {
        let mut vp = shell.viewport.get_untracked();
        vp.fit_map(info, w, h);
        match deeplink::parse(&location_query()) {
            Ok(Some(link @ DeepLink::Coordinates(_))) => {
                if let Some(pan) = shell.ctx.borrow_mut().apply_deep_link(link, vp.zoom_bounds()) {
                    vp.apply_pan(&pan, w, h);
                }
            }
            Ok(Some(link)) => {
                shell.ctx.borrow_mut().apply_deep_link(link, vp.zoom_bounds());
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "ignoring malformed link"),
        }
        // The viewport effect schedules the real frame.
        shell.viewport.set(vp);
        return false;
    }

    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return false;
    };
    let vp = shell.viewport.get_untracked();
    let Ok(mut ctx) = shell.ctx.try_borrow_mut() else {
        return true;
    };
    ctx.on_viewport_change(&vp, w, h);

    let mut more = false;
    if let Some(host) = document.get_element_by_id(SVG_HOST_ID) {
        let app = &mut *ctx;
        for manager in [&mut app.debug_marker, &mut app.marker] {
            if let Some(overlay) = manager.backend_mut().as_svg_mut()
                && let Some(group) = paint::ensure_group(&document, &host, overlay.group_id())
            {
                paint::apply_patches(&document, &group, overlay.drain_patches());
                more |= overlay.has_pending_patches();
            }
        }
    }

    if let Some(c2d) = canvas_2d(&canvas) {
        c2d.clear_rect(0.0, 0.0, w, h);
        if ctx.grid().is_enabled()
            && let Some(view) = ctx.view().copied()
        {
            paint::draw_grid(&c2d, ctx.grid().lines(), &view.transform);
        }
        for manager in ctx.managers_mut() {
            if let Some(overlay) = manager.backend_mut().as_canvas_mut() {
                paint::draw_commands(&c2d, overlay.build_frame(w, h));
            }
        }
    }

    let pending = ctx.take_pending_item_search();
    drop(ctx);
    if let Some(query) = pending {
        spawn_container_search(shell.clone(), query);
    }
    more
}

#[component]
pub fn App() -> impl IntoView {
    let info: RwSignal<Option<MapInfo>> = RwSignal::new(None);
    let failed = RwSignal::new(false);

    wasm_bindgen_futures::spawn_local(async move {
        match data::fetch_json::<MapInfo>(&HttpFetch, MAP_INFO_PATH).await {
            Ok(map_info) => {
                tracing::info!(w = map_info.w, h = map_info.h, "map info loaded");
                info.set(Some(map_info));
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load map info");
                failed.set(true);
            }
        }
    });

    view! {
        <div style="position: fixed; inset: 0; background: #111; color: #eee; font-family: sans-serif;">
            {move || match (info.get(), failed.get()) {
                (Some(info), _) => view! { <Viewer info=info /> }.into_any(),
                (None, true) => {
                    view! { <div class="load-error">"Failed to load map data."</div> }.into_any()
                }
                (None, false) => view! { <div class="loading">"Loading map..."</div> }.into_any(),
            }}
        </div>
    }
}

#[component]
fn Viewer(info: MapInfo) -> impl IntoView {
    let debug = QueryFlags::from_location().debug;
    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let fetch: Rc<dyn Fetch> = Rc::new(HttpFetch);

    let shell = Shell {
        ctx: Rc::new(RefCell::new(AppContext::new(info.clone()))),
        engine: Rc::new(SearchEngine::new(SpriteCache::new(fetch.clone()))),
        fetch,
        session: Rc::new(RefCell::new(SearchSession::default())),
        size: Rc::new(Cell::new((0.0, 0.0))),
        viewport: RwSignal::new(Viewport::default()),
        repaint: RwSignal::new(0),
        ui: RwSignal::new(UiState::default()),
        search_view: RwSignal::new(SearchView::default()),
        search_open: RwSignal::new(false),
        link: RwSignal::new(None),
    };
    shell.ui.set(UiState::from_context(&shell.ctx.borrow()));

    let scheduler = {
        let shell = shell.clone();
        let fitted = Cell::new(false);
        RenderScheduler::new(move || paint_frame(&shell, &info, canvas_ref, &fitted))
    };

    let viewport = shell.viewport;
    let repaint = shell.repaint;
    Effect::new(move || {
        viewport.track();
        repaint.track();
        scheduler.mark_dirty();
    });

    spawn_initial_loads(shell.clone());

    let tooltip: RwSignal<Option<TooltipState>> = RwSignal::new(None);
    let cursor_square: RwSignal<Option<(i64, i64)>> = RwSignal::new(None);
    let is_dragging = Rc::new(Cell::new(false));
    let last_pos = Rc::new(Cell::new((0.0, 0.0)));

    let local_point = move |client_x: f64, client_y: f64| {
        canvas_ref
            .get_untracked()
            .map(|el| {
                let rect = el.get_bounding_client_rect();
                (client_x - rect.left(), client_y - rect.top())
            })
            .unwrap_or((client_x, client_y))
    };

    let on_wheel = move |e: WheelEvent| {
        e.prevent_default();
        let (x, y) = local_point(e.client_x() as f64, e.client_y() as f64);
        viewport.update(|vp| vp.zoom_at(e.delta_y(), x, y));
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let last_pos = last_pos.clone();
        move |e: PointerEvent| {
            is_dragging.set(true);
            tooltip.set(None);
            last_pos.set((e.client_x() as f64, e.client_y() as f64));
            if let Some(target) = e.current_target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let is_dragging = is_dragging.clone();
        let last_pos = last_pos.clone();
        let shell = shell.clone();
        move |e: PointerEvent| {
            let (cx, cy) = (e.client_x() as f64, e.client_y() as f64);
            if is_dragging.get() {
                let (lx, ly) = last_pos.get();
                last_pos.set((cx, cy));
                viewport.update(|vp| vp.pan(cx - lx, cy - ly));
                return;
            }
            let (x, y) = local_point(cx, cy);
            let ctx = shell.ctx.borrow();
            cursor_square.set(ctx.square_at(x, y));

            let hovered = e
                .target()
                .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
                .and_then(|el| el.closest("[data-mark-id]").ok().flatten())
                .and_then(|el| ctx.tooltips().tooltip_for(&el.id(), &ctx.marker));
            let next = hovered.map(|tooltip| {
                let window = web_sys::window()
                    .map(|w| {
                        (
                            w.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0),
                            w.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0),
                        )
                    })
                    .unwrap_or_default();
                let (left, top) = position_tooltip((cx, cy), estimate_size(&tooltip), window);
                TooltipState { tooltip, left, top }
            });
            if next != tooltip.get_untracked() {
                tooltip.set(next);
            }
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |e: PointerEvent| {
            is_dragging.set(false);
            if let Some(target) = e.current_target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.release_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_pointer_leave = move |_e: PointerEvent| {
        is_dragging.set(false);
        tooltip.set(None);
        cursor_square.set(None);
    };

    view! {
        <div
            style="position: absolute; inset: 0; overflow: hidden; touch-action: none; cursor: grab;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:pointerleave=on_pointer_leave
        >
            <canvas node_ref=canvas_ref style="position: absolute; inset: 0; width: 100%; height: 100%;" />
            <svg
                id=SVG_HOST_ID
                style="position: absolute; inset: 0; width: 100%; height: 100%; pointer-events: none;"
            />
        </div>
        <Toolbar shell=shell.clone() cursor_square=cursor_square debug=debug />
        <SearchPanel shell=shell />
        <TooltipBox tooltip=tooltip />
        <CoordinateReadout cursor_square=cursor_square />
    }
}

fn estimate_size(tooltip: &Tooltip) -> (f64, f64) {
    let longest = tooltip
        .body
        .as_deref()
        .map_or(0, str::len)
        .max(tooltip.title.len());
    let width = (longest as f64 * 7.0 + 20.0).min(300.0);
    let height = if tooltip.body.is_some() { 56.0 } else { 32.0 };
    (width, height)
}

#[component]
fn Toolbar(shell: Shell, cursor_square: RwSignal<Option<(i64, i64)>>, debug: bool) -> impl IntoView {
    let ui = shell.ui;
    let link = shell.link;
    let pressed = |on: bool| {
        if on {
            "background: #3a6; color: #fff;"
        } else {
            "background: #333; color: #ccc;"
        }
    };

    let s = shell.clone();
    let on_pois = move |_| s.toggle_pois();
    let s = shell.clone();
    let on_rooms = move |_| s.toggle_overlay(Overlay::Rooms);
    let s = shell.clone();
    let on_objects = move |_| s.toggle_overlay(Overlay::Objects);
    let s = shell.clone();
    let on_streets = move |_| s.toggle_overlay(Overlay::Streets);
    let s = shell.clone();
    let on_grid = move |_| s.toggle_grid();
    let s = shell.clone();
    let on_down = move |_| s.step_layer(-1);
    let s = shell.clone();
    let on_up = move |_| s.step_layer(1);
    let s = shell.clone();
    let on_lock = move |_| s.toggle_lock(cursor_square.get_untracked());
    let s = shell.clone();
    let on_debug_index = move |_| s.toggle_debug(true);
    let s = shell;
    let on_debug_range = move |_| s.toggle_debug(false);

    view! {
        <div style="position: absolute; top: 8px; left: 8px; display: flex; gap: 4px; flex-wrap: wrap;">
            <button style=move || pressed(ui.get().pois) on:click=on_pois>"POIs"</button>
            <button style=move || pressed(ui.get().rooms) on:click=on_rooms>"Rooms"</button>
            <button style=move || pressed(ui.get().objects) on:click=on_objects>"Objects"</button>
            <button style=move || pressed(ui.get().streets) on:click=on_streets>"Streets"</button>
            <button style=move || pressed(ui.get().grid) on:click=on_grid>"Grid"</button>
            <button on:click=on_down>"-"</button>
            <span>{move || format!("Floor {}", ui.get().layer)}</span>
            <button on:click=on_up>"+"</button>
            <button style=move || pressed(ui.get().locked) on:click=on_lock>
                {move || if ui.get().locked { "Unlock" } else { "Lock coordinates" }}
            </button>
            <span class="coordinate-link">{move || link.get().unwrap_or_default()}</span>
            <button
                style=move || {
                    format!("{} display: {};", pressed(ui.get().debug_index), if debug { "inline" } else { "none" })
                }
                on:click=on_debug_index
            >
                "Index"
            </button>
            <button
                style=move || {
                    format!("{} display: {};", pressed(ui.get().debug_range), if debug { "inline" } else { "none" })
                }
                on:click=on_debug_range
            >
                "Range"
            </button>
        </div>
    }
}

#[component]
fn SearchPanel(shell: Shell) -> impl IntoView {
    let search_view = shell.search_view;
    let search_open = shell.search_open;

    let s = shell.clone();
    let on_input = move |e: web_sys::Event| {
        let value = e
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
            .map(|input| input.value())
            .unwrap_or_default();
        s.run_search(value);
    };

    let s = shell.clone();
    let on_result_click = move |e: web_sys::MouseEvent| {
        let index = e
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
            .and_then(|el| el.closest("[data-index]").ok().flatten())
            .and_then(|el| el.get_attribute("data-index"))
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(index) = index {
            s.select_result(index);
        }
    };

    let s = shell.clone();
    let on_show_all = move |_| s.show_all();
    let s = shell;
    let on_clear = move |_| s.clear_search();

    view! {
        <div style="position: absolute; top: 8px; right: 8px; width: 320px;">
            <div style="display: flex; gap: 4px;">
                <input
                    type="text"
                    placeholder="Search places, rooms, tiles..."
                    data-search-input=""
                    style="flex: 1;"
                    on:input=on_input
                />
                <button on:click=on_clear>"Clear"</button>
            </div>
            <div
                style=move || {
                    format!(
                        "background: rgba(0, 0, 0, 0.85); max-height: 60vh; overflow-y: auto; display: {};",
                        if search_open.get() { "block" } else { "none" },
                    )
                }
            >
                <ul style="list-style: none; margin: 0; padding: 0;" on:click=on_result_click>
                    {move || {
                        let view = search_view.get();
                        if view.is_empty() {
                            return view! { <li class="no-results">"No results found"</li> }.into_any();
                        }
                        view.rows
                            .into_iter()
                            .map(|row| {
                                view! {
                                    <li data-index=row.index.to_string() style="padding: 4px; cursor: pointer;">
                                        <div>
                                            <strong>{row.title}</strong>
                                            " "
                                            <span class="result-type">{row.type_label}</span>
                                        </div>
                                        <div class="result-coords">{row.coordinates}</div>
                                        {row.description.map(|d| view! { <div class="result-desc">{d}</div> })}
                                        {row.location.map(|l| view! { <div class="result-location">{l}</div> })}
                                    </li>
                                }
                            })
                            .collect_view()
                            .into_any()
                    }}
                </ul>
                <button
                    style=move || {
                        format!(
                            "width: 100%; display: {};",
                            if search_view.get().show_all_count.is_some() { "block" } else { "none" },
                        )
                    }
                    on:click=on_show_all
                >
                    {move || {
                        search_view
                            .get()
                            .show_all_count
                            .map(|n| format!("Show all {n} results"))
                            .unwrap_or_default()
                    }}
                </button>
            </div>
        </div>
    }
}

#[component]
fn TooltipBox(tooltip: RwSignal<Option<TooltipState>>) -> impl IntoView {
    move || {
        tooltip.get().map(|state| {
            let style = format!(
                "position: fixed; left: {}px; top: {}px; max-width: 300px; padding: 4px 8px; \
                 background: rgba(0, 0, 0, 0.85); border-radius: 4px; pointer-events: none;",
                state.left, state.top
            );
            view! {
                <div class="tooltip" style=style>
                    <strong>{state.tooltip.title}</strong>
                    {state.tooltip.body.map(|b| view! { <div>{b}</div> })}
                </div>
            }
        })
    }
}

#[component]
fn CoordinateReadout(cursor_square: RwSignal<Option<(i64, i64)>>) -> impl IntoView {
    view! {
        <div style="position: absolute; bottom: 8px; left: 8px; background: rgba(0, 0, 0, 0.6); padding: 2px 6px;">
            {move || match cursor_square.get() {
                Some((x, y)) => format!("X: {x}, Y: {y}"),
                None => String::new(),
            }}
        </div>
    }
}
