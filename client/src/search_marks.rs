//! Highlight markers placed by search: purple-family dots for single
//! results, cyan dots for every location of a tile or container.

use std::collections::{BTreeSet, HashSet};

use pzmap_shared::{Mark, TextPosition};

use crate::context::Overlay;
use crate::markers::MarkManager;
use crate::search::{ResultKind, SearchResult, TileTarget, high_confidence, sprite_slug};

const TILE_COLOR: &str = "cyan";
const TILE_BACKGROUND: &str = "rgba(0, 255, 255, 0.4)";

fn result_style(kind: ResultKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        ResultKind::Street => ("orange", "rgba(255, 165, 0, 0.5)", "search-street"),
        ResultKind::Object => ("green", "rgba(0, 255, 0, 0.5)", "search-object"),
        ResultKind::Room => ("blue", "rgba(0, 128, 255, 0.5)", "search-room"),
        ResultKind::Tile | ResultKind::Poi => ("purple", "rgba(128, 0, 128, 0.5)", "search-point"),
    }
}

/// Marker for a single located result, or `None` when it has no position.
pub fn purple_mark(result: &SearchResult) -> Option<Mark> {
    let t = &result.target;
    let (Some(x), Some(y)) = (t.x, t.y) else {
        return None;
    };
    let (color, background, class) = result_style(result.kind);
    let mut mark = Mark::point(format!("search-{}", t.id), x, y)
        .with_style(color, background, TextPosition::None)
        .with_classes(&["search-marker", class]);
    mark.name = Some(t.name.clone());
    mark.desc = t.desc.clone();
    mark.location = t.location.clone();
    mark.tags = t.tags.clone();
    Some(mark)
}

/// One marker per location of the sprite, each on its own floor.
pub fn tile_marks(tile: &TileTarget) -> Vec<Mark> {
    let slug = sprite_slug(&tile.sprite_name);
    tile.entry
        .coordinates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let mut mark = Mark::point(format!("tile-{slug}-{i}"), c.x, c.y)
                .with_style(TILE_COLOR, TILE_BACKGROUND, TextPosition::None)
                .with_classes(&["search-marker", "search-tile"])
                .on_layer(c.layer);
            mark.visible_zoom_level = tile.entry.visible_zoom_level.unwrap_or(0);
            mark.name = Some(tile.sprite_name.clone());
            mark.desc = Some(format!("{} at layer {}", tile.sprite_name, c.layer));
            mark
        })
        .collect()
}

/// Result of "show all on map".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShowAll {
    pub added: usize,
    /// Overlays that must be switched on for the highlighted results.
    pub overlays: BTreeSet<Overlay>,
}

/// Ids of every marker search placed in the primary manager, so they can be
/// taken out again without touching POIs or other marks.
#[derive(Debug, Clone, Default)]
pub struct SearchMarkers {
    ids: HashSet<String>,
}

impl SearchMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn track(&mut self, manager: &mut MarkManager, marks: Vec<Mark>) -> usize {
        let ids: Vec<String> = marks.iter().map(|m| m.id.clone()).collect();
        let report = manager.load(marks);
        self.ids.extend(ids);
        report.loaded
    }

    pub fn add_purple_marker(&mut self, manager: &mut MarkManager, result: &SearchResult) -> bool {
        let Some(mark) = purple_mark(result) else {
            tracing::warn!(id = %result.target.id, "search result has no position to mark");
            return false;
        };
        self.track(manager, vec![mark]) == 1
    }

    pub fn add_tile_markers(&mut self, manager: &mut MarkManager, tile: &TileTarget) -> usize {
        let added = self.track(manager, tile_marks(tile));
        tracing::info!(sprite = %tile.sprite_name, added, "tile markers added");
        added
    }

    /// Container hits are tracked with the other search markers.
    pub fn add_marks(&mut self, manager: &mut MarkManager, marks: Vec<Mark>) -> usize {
        self.track(manager, marks)
    }

    pub fn clear(&mut self, manager: &mut MarkManager) -> usize {
        let mut removed = 0;
        for id in self.ids.drain() {
            if manager.remove(&id).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Replace current highlights with every high-confidence result.
    pub fn show_all(&mut self, manager: &mut MarkManager, results: &[SearchResult]) -> ShowAll {
        self.clear(manager);
        let mut outcome = ShowAll::default();
        for result in high_confidence(results) {
            if let Some(overlay) = result.kind.overlay() {
                outcome.overlays.insert(overlay);
            }
            outcome.added += match &result.target.tile {
                Some(tile) => self.add_tile_markers(manager, tile),
                None => usize::from(self.add_purple_marker(manager, result)),
            };
        }
        tracing::info!(added = outcome.added, "showing all search results");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::MarkManagerOptions;
    use crate::search::SearchTarget;
    use pzmap_shared::{LayeredPoint, SpriteEntry};

    fn located(id: &str, kind: ResultKind, score: u32) -> SearchResult {
        let mut target = SearchTarget::named(id, id.to_uppercase());
        target.x = Some(10.0);
        target.y = Some(20.0);
        SearchResult { target, score, kind }
    }

    fn tile() -> TileTarget {
        TileTarget {
            sprite_name: "Fridge 01".into(),
            entry: SpriteEntry {
                coordinates: vec![
                    LayeredPoint { x: 1.0, y: 2.0, layer: 0 },
                    LayeredPoint { x: 3.0, y: 4.0, layer: 2 },
                ],
                ..SpriteEntry::default()
            },
        }
    }

    #[test]
    fn purple_marker_style_follows_result_kind() {
        let street = purple_mark(&located("s1", ResultKind::Street, 15)).expect("located");
        assert_eq!(street.id, "search-s1");
        assert_eq!(street.style.color, "orange");
        assert_eq!(street.class_list, vec!["search-marker", "search-street"]);
        assert_eq!(street.layer, 0);
        let poi = purple_mark(&located("p1", ResultKind::Poi, 15)).expect("located");
        assert_eq!(poi.style.color, "purple");
        assert!(poi.has_class("search-point"));
    }

    #[test]
    fn unlocated_results_get_no_marker() {
        let result = SearchResult {
            target: SearchTarget::named("x", "X"),
            score: 10,
            kind: ResultKind::Room,
        };
        assert!(purple_mark(&result).is_none());
    }

    #[test]
    fn tile_markers_sit_on_their_own_floors() {
        let marks = tile_marks(&tile());
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[1].id, "tile-fridge-01-1");
        assert_eq!(marks[1].layer, 2);
        assert_eq!(marks[1].desc.as_deref(), Some("Fridge 01 at layer 2"));
    }

    #[test]
    fn clear_removes_only_search_markers() {
        let mut manager = MarkManager::new("primary", MarkManagerOptions::default());
        manager.load(vec![Mark::point("poi", 0.0, 0.0)]);
        let mut markers = SearchMarkers::new();
        assert_eq!(markers.add_tile_markers(&mut manager, &tile()), 2);
        assert!(markers.add_purple_marker(&mut manager, &located("r", ResultKind::Room, 20)));
        assert_eq!(manager.len(), 4);
        assert_eq!(markers.clear(&mut manager), 3);
        assert_eq!(manager.len(), 1);
        assert!(manager.contains("poi"));
        assert!(markers.is_empty());
    }

    #[test]
    fn show_all_marks_confident_results_and_lists_overlays() {
        let mut manager = MarkManager::new("primary", MarkManagerOptions::default());
        let mut markers = SearchMarkers::new();
        let mut tile_result = located("t", ResultKind::Tile, 50);
        tile_result.target.tile = Some(tile());
        let results = vec![
            tile_result,
            located("s", ResultKind::Street, 25),
            located("r", ResultKind::Room, 12),
            located("weak", ResultKind::Object, 3),
        ];
        let outcome = markers.show_all(&mut manager, &results);
        assert_eq!(outcome.added, 4);
        assert_eq!(
            outcome.overlays,
            BTreeSet::from([Overlay::Streets, Overlay::Rooms])
        );
        assert!(!manager.contains("search-weak"));
    }
}
