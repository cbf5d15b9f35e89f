pub const MAP_INFO_PATH: &str = "./map_info.json";
pub const POI_PATH: &str = "./poi.json";
pub const SPRITE_LOOKUP_PATH: &str = "./sprite_lookup.json";

pub fn container_path(container_type: &str) -> String {
    format!("./processed_containers/{container_type}_processed_containers.json")
}

pub fn overlay_marks_path(overlay: &str) -> String {
    format!("./marks/{overlay}.json")
}

/// Squares per map cell. Deep links and search targets are divided by this
/// before going through the base map projection.
pub const CELL_SIZE: f64 = 256.0;
pub const DEFAULT_DEEPLINK_ZOOM: f64 = 7.0;
/// Match radius around rooms stored as a single point.
pub const POINT_ROOM_RADIUS: f64 = 50.0;
pub const SEARCH_DISPLAY_LIMIT: usize = 10;
pub const HIGH_CONFIDENCE_SCORE: u32 = 10;

// Fraction of the zoom range used when jumping to a search result.
pub const STREET_ZOOM_FRACTION: f64 = 0.2;
pub const OBJECT_ZOOM_FRACTION: f64 = 0.4;
pub const POI_ZOOM_FRACTION: f64 = 0.6;
pub const ROOM_ZOOM_FRACTION: f64 = 0.7;

/// On-screen pixels per square at which the zoom tier steps up (tiers 0..=3).
pub const ZOOM_TIER_THRESHOLDS: [f64; 3] = [2.0, 8.0, 24.0];
/// Squares between block lines of the grid overlay.
pub const GRID_BLOCK_SIZE: u32 = 8;

/// Marker disc radius and stroke, in screen pixels.
pub const POINT_RADIUS_PX: f64 = 9.0;
pub const POINT_STROKE_PX: f64 = 2.0;
pub const LINE_STROKE_PX: f64 = 2.0;

/// Flags read from the page query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFlags {
    pub debug: bool,
}

impl QueryFlags {
    /// `search` is the raw query string without the leading `?`.
    pub fn parse(search: &str) -> Self {
        let debug = search
            .split('&')
            .filter_map(|pair| pair.split('=').next())
            .any(|key| key == "debug");
        Self { debug }
    }

    pub fn from_location() -> Self {
        Self::parse(&location_query())
    }
}

/// Query string of the current page, without the leading `?`.
pub fn location_query() -> String {
    web_sys::window()
        .and_then(|w| w.location().search().ok())
        .map(|s| s.trim_start_matches('?').to_string())
        .unwrap_or_default()
}
