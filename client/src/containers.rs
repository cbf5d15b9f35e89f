//! "Which fridges are in a kitchen" search: container coordinates from the
//! processed container files matched against room geometry.

use pzmap_shared::{ContainerSet, Geometry, LayeredPoint, Mark, TextPosition};

use crate::config::POINT_ROOM_RADIUS;

/// A container that fell inside one of the searched rooms.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHit {
    pub at: LayeredPoint,
    pub room_id: String,
    pub room_name: Option<String>,
}

/// Inclusive containment against any rect of the room. Rooms stored as a
/// single position match within a fixed radius instead.
pub fn is_container_in_room(container: &LayeredPoint, room: &Mark) -> bool {
    match &room.geometry {
        Geometry::Area { rects } if !rects.is_empty() => {
            rects.iter().any(|r| r.contains(container.x, container.y))
        }
        Geometry::Point { x, y } | Geometry::Text { x, y } => {
            (container.x - x).hypot(container.y - y) <= POINT_ROOM_RADIUS
        }
        _ => false,
    }
}

/// Rooms whose name contains `name`, case-insensitively.
pub fn find_matching_rooms<'a>(rooms: impl IntoIterator<Item = &'a Mark>, name: &str) -> Vec<&'a Mark> {
    let needle = name.to_lowercase();
    rooms
        .into_iter()
        .filter(|room| {
            room.name
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(&needle)
        })
        .collect()
}

/// Each container at most once, attributed to the first room containing it.
pub fn find_containers_in_rooms(containers: &ContainerSet, rooms: &[&Mark]) -> Vec<ContainerHit> {
    containers
        .coordinates
        .iter()
        .filter_map(|c| {
            let room = rooms.iter().find(|room| is_container_in_room(c, room))?;
            Some(ContainerHit {
                at: *c,
                room_id: room.id.clone(),
                room_name: room.name.clone(),
            })
        })
        .collect()
}

/// Cyan search markers for the hits, styled like tile search results.
pub fn container_marks(hits: &[ContainerHit], container_type: &str, room_name: &str) -> Vec<Mark> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut mark = Mark::point(format!("container-{container_type}-{i}"), hit.at.x, hit.at.y)
                .with_style("cyan", "rgba(0, 255, 255, 0.4)", TextPosition::None)
                .with_classes(&["search-marker", "search-tile"])
                .on_layer(hit.at.layer);
            let room = hit.room_name.as_deref().filter(|n| !n.is_empty()).unwrap_or(room_name);
            mark.name = Some(format!("{container_type} in {room}"));
            mark.desc = Some(format!("{container_type} container at layer {}", hit.at.layer));
            mark
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pzmap_shared::Rect;

    fn kitchen() -> Mark {
        let mut room = Mark::area(
            "room-k",
            vec![Rect {
                x: 100.0,
                y: 100.0,
                width: 100.0,
                height: 100.0,
            }],
        );
        room.name = Some("Kitchen".into());
        room
    }

    fn at(x: f64, y: f64) -> LayeredPoint {
        LayeredPoint { x, y, layer: 0 }
    }

    #[test]
    fn rect_rooms_contain_inclusively() {
        let room = kitchen();
        assert!(is_container_in_room(&at(150.0, 150.0), &room));
        assert!(is_container_in_room(&at(200.0, 100.0), &room));
        assert!(!is_container_in_room(&at(500.0, 500.0), &room));
    }

    #[test]
    fn point_rooms_match_within_radius() {
        let room = Mark::point("p", 0.0, 0.0);
        assert!(is_container_in_room(&at(30.0, 40.0), &room));
        assert!(!is_container_in_room(&at(40.0, 40.0), &room));
    }

    #[test]
    fn containers_are_counted_once_in_first_room() {
        let first = kitchen();
        let mut second = kitchen();
        second.id = "room-k2".into();
        second.name = Some("Big Kitchen".into());
        let others = vec![Mark::area("bath", Vec::new())];
        let all: Vec<&Mark> = [&first, &second].into_iter().chain(others.iter()).collect();
        let rooms = find_matching_rooms(all, "KITCHEN");
        assert_eq!(rooms.len(), 2);

        let set = ContainerSet {
            coordinates: vec![at(150.0, 150.0), at(500.0, 500.0)],
        };
        let hits = find_containers_in_rooms(&set, &rooms);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].room_id, "room-k");
    }

    #[test]
    fn container_marks_look_like_tile_markers() {
        let hits = vec![ContainerHit {
            at: LayeredPoint {
                x: 150.0,
                y: 150.0,
                layer: 1,
            },
            room_id: "room-k".into(),
            room_name: None,
        }];
        let marks = container_marks(&hits, "fridge", "kitchen");
        assert_eq!(marks[0].id, "container-fridge-0");
        assert_eq!(marks[0].name.as_deref(), Some("fridge in kitchen"));
        assert_eq!(marks[0].layer, 1);
        assert!(marks[0].has_class("search-tile"));
        assert_eq!(marks[0].style.color, "cyan");
    }
}
