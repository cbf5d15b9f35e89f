//! Page query links: `?XxY`, `?XxYxZ` jump to a square, `?item=type~room`
//! highlights containers of a type inside matching rooms.

use pzmap_shared::{Mark, TextPosition};
use thiserror::Error;

use crate::config::{CELL_SIZE, DEFAULT_DEEPLINK_ZOOM};
use crate::coords::Projection;
use crate::viewport::{PanRequest, ZoomBounds};

pub const URL_MARKER_ID: &str = "url-coordinate-marker";
pub const LOCKED_MARKER_ID: &str = "locked-coordinate-marker";

#[derive(Debug, Error, PartialEq)]
pub enum DeepLinkError {
    #[error("expected XxY, XxYxZ or item={{type}}~{{room}}, got {0:?}")]
    Malformed(String),
    #[error("expected item={{type}}~{{room}}, got {0:?}")]
    MalformedItem(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkCoordinates {
    pub x: f64,
    pub y: f64,
    /// Floor-relative zoom, scaled by the number of layers when resolved.
    pub zoom: f64,
}

impl LinkCoordinates {
    pub fn grid_position(&self) -> (f64, f64) {
        (self.x / CELL_SIZE, self.y / CELL_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerQuery {
    pub container_type: String,
    pub room: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeepLink {
    Coordinates(LinkCoordinates),
    ContainerSearch(ContainerQuery),
}

/// Parse the query string (without `?`). Flags after the first `&` are not
/// part of the link. An empty query is not an error, just no link.
pub fn parse(query: &str) -> Result<Option<DeepLink>, DeepLinkError> {
    let link = query.split('&').next().unwrap_or_default().trim();
    if link.is_empty() || link == "debug" || link.starts_with("debug=") {
        return Ok(None);
    }
    if let Some(item) = link.strip_prefix("item=") {
        let parts: Vec<&str> = item.split('~').collect();
        let [container_type, room] = parts.as_slice() else {
            return Err(DeepLinkError::MalformedItem(link.to_string()));
        };
        if container_type.is_empty() || room.is_empty() {
            return Err(DeepLinkError::MalformedItem(link.to_string()));
        }
        return Ok(Some(DeepLink::ContainerSearch(ContainerQuery {
            container_type: container_type.to_lowercase(),
            room: room.to_lowercase(),
        })));
    }

    let parts: Vec<Option<f64>> = link
        .split('x')
        .map(|p| p.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    match parts.as_slice() {
        [Some(x), Some(y), rest @ ..] => Ok(Some(DeepLink::Coordinates(LinkCoordinates {
            x: *x,
            y: *y,
            zoom: rest.first().copied().flatten().unwrap_or(DEFAULT_DEEPLINK_ZOOM),
        }))),
        _ => Err(DeepLinkError::Malformed(link.to_string())),
    }
}

/// Viewport target for a coordinate link.
pub fn resolve(
    coords: &LinkCoordinates,
    projection: &Projection,
    zoom: ZoomBounds,
    layers: i32,
) -> PanRequest {
    let (gx, gy) = coords.grid_position();
    let (center_x, center_y) = projection.cell_to_pixel(gx, gy);
    PanRequest {
        center_x,
        center_y,
        zoom: zoom.lerp(coords.zoom / layers.max(1) as f64),
    }
}

pub fn url_marker(coords: &LinkCoordinates) -> Mark {
    let mut mark = Mark::point(URL_MARKER_ID, coords.x, coords.y)
        .with_style("red", "rgba(255, 0, 0, 0.3)", TextPosition::None)
        .with_classes(&["url-marker"]);
    mark.name = Some("Linked Coordinates".into());
    mark.desc = Some("Coordinate marker based on your link.".into());
    mark
}

pub fn locked_marker(sx: i64, sy: i64) -> Mark {
    let mut mark = Mark::point(LOCKED_MARKER_ID, sx as f64, sy as f64)
        .with_style("lime", "rgba(0, 255, 0, 0.4)", TextPosition::None)
        .with_classes(&["locked-marker"]);
    mark.name = Some("Locked Coordinates".into());
    mark.desc = Some(format!("Locked at (X: {sx}, Y: {sy})"));
    mark
}

/// Query string that links back to a square.
pub fn coordinate_query(sx: i64, sy: i64) -> String {
    format!("?{sx}x{sy}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pzmap_shared::MapType;

    fn coords(x: f64, y: f64, zoom: f64) -> DeepLink {
        DeepLink::Coordinates(LinkCoordinates { x, y, zoom })
    }

    #[test]
    fn parses_coordinates_with_and_without_zoom() {
        assert_eq!(parse("12800x9600x5"), Ok(Some(coords(12800.0, 9600.0, 5.0))));
        assert_eq!(parse("12800x9600"), Ok(Some(coords(12800.0, 9600.0, 7.0))));
        assert_eq!(parse("12800x9600xzz"), Ok(Some(coords(12800.0, 9600.0, 7.0))));
        assert_eq!(parse("12800x9600&debug"), Ok(Some(coords(12800.0, 9600.0, 7.0))));
    }

    #[test]
    fn parses_item_search_lowercased() {
        assert_eq!(
            parse("item=Fridge~Kitchen"),
            Ok(Some(DeepLink::ContainerSearch(ContainerQuery {
                container_type: "fridge".into(),
                room: "kitchen".into(),
            })))
        );
        assert!(matches!(parse("item=fridge"), Err(DeepLinkError::MalformedItem(_))));
    }

    #[test]
    fn rejects_garbage_and_ignores_empty() {
        assert!(matches!(parse("hello"), Err(DeepLinkError::Malformed(_))));
        assert!(matches!(parse("12800"), Err(DeepLinkError::Malformed(_))));
        assert_eq!(parse(""), Ok(None));
        assert_eq!(parse("debug"), Ok(None));
    }

    #[test]
    fn resolves_through_cell_projection() {
        let Ok(Some(DeepLink::Coordinates(c))) = parse("12800x9600x5") else {
            panic!("link should parse");
        };
        assert_eq!(c.grid_position(), (50.0, 37.5));
        let projection = Projection {
            mode: MapType::Top,
            x0: 0.0,
            y0: 0.0,
            sqr: 2.0,
            cell_size: 256.0,
        };
        let pan = resolve(&c, &projection, ZoomBounds { min: 1.0, max: 11.0 }, 10);
        assert_eq!((pan.center_x, pan.center_y), (25600.0, 19200.0));
        assert_eq!(pan.zoom, 6.0);
    }

    #[test]
    fn marker_styles() {
        let url = url_marker(&LinkCoordinates {
            x: 1.0,
            y: 2.0,
            zoom: 7.0,
        });
        assert_eq!(url.id, URL_MARKER_ID);
        assert_eq!(url.style.color, "red");
        assert!(url.has_class("url-marker"));
        let locked = locked_marker(10, 20);
        assert_eq!(locked.desc.as_deref(), Some("Locked at (X: 10, Y: 20)"));
        assert_eq!(coordinate_query(10, 20), "?10x20");
    }
}
