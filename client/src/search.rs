//! Ranked search across sprites, POIs and the street/object/room overlays.
//! Results are grouped by source first and ordered by score within a group.

use std::cell::RefCell;

use pzmap_shared::{Geometry, Mark, Point, SpriteEntry, SpriteLookup};

use crate::config::{
    HIGH_CONFIDENCE_SCORE, OBJECT_ZOOM_FRACTION, POI_ZOOM_FRACTION, ROOM_ZOOM_FRACTION,
    SEARCH_DISPLAY_LIMIT, STREET_ZOOM_FRACTION,
};
use crate::context::{AppContext, Overlay};
use crate::data::SpriteCache;

/// Source of a result. The derived order is the display priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResultKind {
    Tile,
    Poi,
    Street,
    Object,
    Room,
}

impl ResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultKind::Tile => "tile",
            ResultKind::Poi => "poi",
            ResultKind::Street => "street",
            ResultKind::Object => "object",
            ResultKind::Room => "room",
        }
    }

    /// Share of the zoom range used when jumping to a result of this kind.
    pub fn zoom_fraction(self) -> f64 {
        match self {
            ResultKind::Street => STREET_ZOOM_FRACTION,
            ResultKind::Object => OBJECT_ZOOM_FRACTION,
            ResultKind::Room => ROOM_ZOOM_FRACTION,
            ResultKind::Tile | ResultKind::Poi => POI_ZOOM_FRACTION,
        }
    }

    /// Overlay that has to be on for the result's geometry to be visible.
    pub fn overlay(self) -> Option<Overlay> {
        match self {
            ResultKind::Street => Some(Overlay::Streets),
            ResultKind::Object => Some(Overlay::Objects),
            ResultKind::Room => Some(Overlay::Rooms),
            ResultKind::Tile | ResultKind::Poi => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectCategory {
    CarSpawn,
    Zombie,
    ZoneStory,
    Other,
}

impl ObjectCategory {
    pub fn from_color(color: &str) -> Self {
        match color.to_ascii_lowercase().as_str() {
            "blue" => ObjectCategory::CarSpawn,
            "red" => ObjectCategory::Zombie,
            "yellow" => ObjectCategory::ZoneStory,
            _ => ObjectCategory::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ObjectCategory::CarSpawn => "Car Spawn",
            ObjectCategory::Zombie => "Zombie",
            ObjectCategory::ZoneStory => "Zone Story",
            ObjectCategory::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileTarget {
    pub sprite_name: String,
    pub entry: SpriteEntry,
}

/// What a result points at. Tiles carry every location of the sprite instead
/// of a single coordinate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchTarget {
    pub id: String,
    pub name: String,
    pub desc: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    pub tile: Option<TileTarget>,
    pub category: Option<ObjectCategory>,
}

impl SearchTarget {
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    fn at(mut self, point: Option<Point>) -> Self {
        self.x = point.map(|p| p.x);
        self.y = point.map(|p| p.y);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub target: SearchTarget,
    pub score: u32,
    pub kind: ResultKind,
}

/// Everything searchable besides the sprite lookup, borrowed from the
/// application context for the duration of one search.
#[derive(Debug, Clone, Default)]
pub struct SearchSources<'a> {
    pub pois: &'a [Mark],
    pub streets: Vec<&'a Mark>,
    pub objects: Vec<&'a Mark>,
    pub rooms: Vec<&'a Mark>,
}

pub fn normalize_query(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// `sprite-fridge-01` style id for a sprite name.
pub fn sprite_slug(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Sum of per-term scores, or `None` unless every term matched.
fn score_all_terms(terms: &[String], mut score_term: impl FnMut(&str) -> Option<u32>) -> Option<u32> {
    let mut total = 0;
    for term in terms {
        total += score_term(term)?;
    }
    (total > 0).then_some(total)
}

fn is_boundary_match(text: &str, term: &str) -> bool {
    text == term || text.starts_with(&format!("{term} ")) || text.ends_with(&format!(" {term}"))
}

fn search_tiles(terms: &[String], sprites: &SpriteLookup) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = sprites
        .iter()
        .filter_map(|(name, entry)| {
            let text = name.to_lowercase();
            let score = score_all_terms(terms, |term| {
                if !text.contains(term) {
                    return None;
                }
                Some(if text == term {
                    50
                } else if text.starts_with(&format!("{term} "))
                    || text.ends_with(&format!(" {term}"))
                    || text.contains(&format!(" {term} "))
                {
                    30
                } else if text.starts_with(term) {
                    20
                } else {
                    10
                })
            })?;
            let mut target = SearchTarget::named(format!("sprite-{}", sprite_slug(name)), name);
            target.desc = Some(format!("Tile ({} locations)", entry.coordinates.len()));
            target.tile = Some(TileTarget {
                sprite_name: name.clone(),
                entry: entry.clone(),
            });
            Some(SearchResult {
                target,
                score,
                kind: ResultKind::Tile,
            })
        })
        .collect();
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results
}

fn search_pois(terms: &[String], pois: &[Mark]) -> Vec<SearchResult> {
    pois.iter()
        .filter_map(|poi| {
            let name = poi.name.as_deref().unwrap_or_default().to_lowercase();
            let desc = poi.desc.as_deref().unwrap_or_default().to_lowercase();
            let location = poi.location.as_deref().unwrap_or_default().to_lowercase();
            let tags: Vec<String> = poi.tags.iter().map(|t| t.to_lowercase()).collect();
            let mut haystack = vec![name.clone(), desc.clone(), location.clone()];
            haystack.extend(tags.iter().cloned());
            let haystack = haystack.join(" ");

            let score = score_all_terms(terms, |term| {
                if !haystack.contains(term) {
                    return None;
                }
                let mut s = 1;
                if name.contains(term) {
                    s += 10;
                }
                if location.contains(term) {
                    s += 5;
                }
                if tags.iter().any(|t| t.contains(term)) {
                    s += 5;
                }
                if desc.contains(term) {
                    s += 2;
                }
                Some(s)
            })?;
            let mut target = SearchTarget::named(poi.id.clone(), poi.name.clone().unwrap_or_default())
                .at(direct_point(&poi.geometry));
            target.desc = poi.desc.clone();
            target.location = poi.location.clone();
            target.tags = poi.tags.clone();
            Some(SearchResult {
                target,
                score,
                kind: ResultKind::Poi,
            })
        })
        .collect()
}

/// Overlay marks score by name only: a flat amount per matching term plus a
/// bonus for whole-word matches at either end.
fn search_overlay(
    terms: &[String],
    marks: &[&Mark],
    kind: ResultKind,
    per_term: u32,
    boundary_bonus: u32,
) -> Vec<SearchResult> {
    marks
        .iter()
        .filter_map(|mark| {
            let name = match kind {
                ResultKind::Street => mark.display_name(),
                _ => mark.name.as_deref().filter(|n| !n.is_empty()),
            }?;
            let text = name.to_lowercase();
            let score = score_all_terms(terms, |term| {
                if !text.contains(term) {
                    return None;
                }
                Some(per_term + if is_boundary_match(&text, term) { boundary_bonus } else { 0 })
            })?;

            let point = match kind {
                ResultKind::Street => street_point(&mark.geometry),
                _ => area_point(&mark.geometry),
            };
            let mut target = SearchTarget::named(mark.id.clone(), name).at(point);
            match kind {
                ResultKind::Street => {
                    target.desc = Some("Street".into());
                    target.location = Some("Street".into());
                    target.tags = vec!["street".into()];
                }
                ResultKind::Object => {
                    let category = ObjectCategory::from_color(&mark.style.color);
                    target.desc = Some(category.label().into());
                    target.location = Some("Object".into());
                    target.tags = vec!["object".into(), category.label().to_lowercase()];
                    target.category = Some(category);
                }
                _ => {
                    target.desc = Some("Room".into());
                    target.location = Some("Room".into());
                    target.tags = vec!["room".into()];
                }
            }
            Some(SearchResult {
                target,
                score,
                kind,
            })
        })
        .collect()
}

fn direct_point(geometry: &Geometry) -> Option<Point> {
    match geometry {
        Geometry::Point { x, y } | Geometry::Text { x, y } => Some(Point::new(*x, *y)),
        _ => None,
    }
}

/// Middle vertex of a polyline, else the mark's own position, else the centre
/// of its first rect.
fn street_point(geometry: &Geometry) -> Option<Point> {
    match geometry {
        Geometry::Line { points } => points.get(points.len() / 2).copied(),
        Geometry::Area { rects } => rects.first().map(|r| r.center()),
        other => direct_point(other),
    }
}

fn area_point(geometry: &Geometry) -> Option<Point> {
    match geometry {
        Geometry::Area { rects } => rects.first().map(|r| r.center()),
        other => direct_point(other),
    }
}

/// Full ranked result list for `query`. Every call recomputes from the given
/// sources; nothing is carried over from earlier searches.
pub fn search_sources(
    query: &str,
    sources: &SearchSources<'_>,
    sprites: &SpriteLookup,
) -> Vec<SearchResult> {
    let terms = normalize_query(query);
    if terms.is_empty() {
        return Vec::new();
    }
    let mut results = search_tiles(&terms, sprites);
    results.extend(search_pois(&terms, sources.pois));
    results.extend(search_overlay(&terms, &sources.streets, ResultKind::Street, 15, 10));
    results.extend(search_overlay(&terms, &sources.objects, ResultKind::Object, 12, 8));
    results.extend(search_overlay(&terms, &sources.rooms, ResultKind::Room, 12, 8));
    results.sort_by(|a, b| a.kind.cmp(&b.kind).then(b.score.cmp(&a.score)));
    results
}

/// Async entry point. The sprite lookup is awaited first so the context is
/// only borrowed once the data is in hand.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    sprites: SpriteCache,
}

impl SearchEngine {
    pub fn new(sprites: SpriteCache) -> Self {
        Self { sprites }
    }

    pub async fn search(&self, query: &str, ctx: &RefCell<AppContext>) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let sprites = self.sprites.get().await;
        let ctx = ctx.borrow();
        let results = search_sources(query, &ctx.search_sources(), &sprites);
        tracing::debug!(query, count = results.len(), "search");
        results
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

/// Displayed results. Only the newest ticket may replace them, so a slow
/// response to an older query is dropped instead of overwriting a newer one.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    latest: u64,
    displayed: Vec<SearchResult>,
    visible: bool,
}

impl SearchSession {
    pub fn begin(&mut self) -> SearchTicket {
        self.latest += 1;
        SearchTicket(self.latest)
    }

    pub fn apply(&mut self, ticket: SearchTicket, results: Vec<SearchResult>) -> bool {
        if ticket.0 != self.latest {
            tracing::debug!(ticket = ticket.0, latest = self.latest, "stale search results dropped");
            return false;
        }
        self.displayed = results;
        self.visible = true;
        true
    }

    /// A failed search shows nothing rather than the previous list.
    pub fn fail(&mut self, ticket: SearchTicket) {
        if ticket.0 == self.latest {
            self.displayed.clear();
            self.visible = false;
        }
    }

    /// Clear and invalidate anything still in flight.
    pub fn clear(&mut self) {
        self.latest += 1;
        self.displayed.clear();
        self.visible = false;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.displayed
    }

    pub fn view(&self) -> SearchView {
        SearchView::new(&self.displayed)
    }
}

/// Descriptions that only repeat the type label are not shown.
const REDUNDANT_DESCRIPTIONS: [&str; 7] = [
    "Street",
    "Object",
    "Room",
    "Zombie",
    "Car Spawn",
    "Zone Story",
    "Other",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResultRow {
    pub index: usize,
    pub title: String,
    pub type_label: String,
    pub coordinates: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl SearchResultRow {
    fn new(index: usize, result: &SearchResult) -> Self {
        let t = &result.target;
        let title = if t.name.is_empty() {
            "Unnamed POI".to_string()
        } else {
            t.name.clone()
        };
        let coordinates = match (t.x, t.y) {
            (Some(x), Some(y)) if x != 0.0 && y != 0.0 => format!("({x}, {y})"),
            _ => "No coordinates".to_string(),
        };
        let type_label = match result.kind {
            ResultKind::Tile => "Tile",
            ResultKind::Poi => "POI",
            ResultKind::Street => "Street",
            ResultKind::Room => "Room",
            ResultKind::Object => t.category.map_or("Building", ObjectCategory::label),
        }
        .to_string();
        let description = t
            .desc
            .clone()
            .filter(|d| !d.is_empty() && !REDUNDANT_DESCRIPTIONS.contains(&d.as_str()));
        let location = match result.kind {
            ResultKind::Poi => t.location.clone().filter(|l| !l.trim().is_empty()),
            _ => None,
        };
        Self {
            index,
            title,
            type_label,
            coordinates,
            description,
            location,
        }
    }
}

/// What the results dropdown shows: the top rows and, when more than one
/// result is high-confidence, a "show all on map" action.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchView {
    pub rows: Vec<SearchResultRow>,
    pub show_all_count: Option<usize>,
}

impl SearchView {
    pub fn new(results: &[SearchResult]) -> Self {
        let rows = results
            .iter()
            .take(SEARCH_DISPLAY_LIMIT)
            .enumerate()
            .map(|(i, r)| SearchResultRow::new(i, r))
            .collect();
        let confident = high_confidence(results).count();
        Self {
            rows,
            show_all_count: (confident > 1).then_some(confident),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn high_confidence(results: &[SearchResult]) -> impl Iterator<Item = &SearchResult> {
    results.iter().filter(|r| r.score >= HIGH_CONFIDENCE_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pzmap_shared::{LayeredPoint, Rect};

    fn named(mut mark: Mark, name: &str) -> Mark {
        mark.name = Some(name.into());
        mark
    }

    fn room(id: &str, name: &str, x: f64, y: f64) -> Mark {
        named(
            Mark::area(
                id,
                vec![Rect {
                    x,
                    y,
                    width: 10.0,
                    height: 20.0,
                }],
            ),
            name,
        )
    }

    fn sprites(names: &[(&str, usize)]) -> SpriteLookup {
        names
            .iter()
            .map(|(name, n)| {
                (
                    name.to_string(),
                    SpriteEntry {
                        coordinates: (0..*n)
                            .map(|i| LayeredPoint {
                                x: i as f64,
                                y: 0.0,
                                layer: 0,
                            })
                            .collect(),
                        ..SpriteEntry::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn every_term_must_match() {
        let mut car = named(Mark::point("o1", 1.0, 1.0), "Red Car Spawn");
        car.style.color = "blue".into();
        let only_car = named(Mark::point("o2", 1.0, 1.0), "Car Wreck");
        let sources = SearchSources {
            objects: vec![&car, &only_car],
            ..SearchSources::default()
        };
        let results = search_sources("red car", &sources, &SpriteLookup::new());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target.id, "o1");
        assert_eq!(results[0].target.category, Some(ObjectCategory::CarSpawn));
        // "red" is a boundary match at the start, "car" is not
        assert_eq!(results[0].score, 12 + 8 + 12);
    }

    #[test]
    fn type_priority_dominates_score() {
        let poi = named(Mark::point("p1", 5.0, 5.0), "Kitchen Kitchen");
        let mut poi = poi;
        poi.desc = Some("kitchen".into());
        poi.tags = vec!["kitchen".into()];
        poi.location = Some("kitchen".into());
        let pois = vec![poi];
        let sources = SearchSources {
            pois: &pois,
            ..SearchSources::default()
        };
        let lookup = sprites(&[("fancy kitchenware", 3)]);
        let results = search_sources("kitchen", &sources, &lookup);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].kind, ResultKind::Tile);
        assert_eq!(results[0].score, 10);
        assert_eq!(results[1].kind, ResultKind::Poi);
        assert!(results[1].score > results[0].score);
    }

    #[test]
    fn tile_scores_by_match_quality() {
        let lookup = sprites(&[
            ("fridge", 1),
            ("fridge 01", 2),
            ("fridgeish", 1),
            ("old fridge door", 1),
            ("minifridge", 1),
        ]);
        let results = search_sources("fridge", &SearchSources::default(), &lookup);
        let scores: Vec<(&str, u32)> = results
            .iter()
            .map(|r| (r.target.name.as_str(), r.score))
            .collect();
        assert_eq!(
            scores,
            vec![
                ("fridge", 50),
                ("fridge 01", 30),
                ("old fridge door", 30),
                ("fridgeish", 20),
                ("minifridge", 10),
            ]
        );
        let fridge01 = &results[1].target;
        assert_eq!(fridge01.id, "sprite-fridge-01");
        assert_eq!(fridge01.desc.as_deref(), Some("Tile (2 locations)"));
        assert!(fridge01.tile.is_some());
    }

    #[test]
    fn poi_fields_add_up() {
        let mut poi = named(Mark::point("p", 1.0, 2.0), "Gas Station");
        poi.location = Some("Muldraugh".into());
        poi.tags = vec!["fuel".into()];
        poi.desc = Some("Gas and snacks".into());
        let pois = vec![poi];
        let sources = SearchSources {
            pois: &pois,
            ..SearchSources::default()
        };
        // name +10, desc +2, base +1
        assert_eq!(search_sources("gas", &sources, &SpriteLookup::new())[0].score, 13);
        // location +5, base +1
        assert_eq!(search_sources("muldraugh", &sources, &SpriteLookup::new())[0].score, 6);
        // tag +5, base +1
        assert_eq!(search_sources("fuel", &sources, &SpriteLookup::new())[0].score, 6);
    }

    #[test]
    fn streets_use_text_label_and_midpoint() {
        let mut street = Mark::new(
            "s1",
            Geometry::Line {
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(20.0, 5.0)],
            },
        );
        street.text = Some("Main Street".into());
        let unnamed = Mark::new(
            "s2",
            Geometry::Line {
                points: vec![Point::new(0.0, 0.0)],
            },
        );
        let sources = SearchSources {
            streets: vec![&street, &unnamed],
            ..SearchSources::default()
        };
        let results = search_sources("main", &sources, &SpriteLookup::new());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 25);
        assert_eq!((results[0].target.x, results[0].target.y), (Some(10.0), Some(0.0)));
        assert_eq!(results[0].target.desc.as_deref(), Some("Street"));
    }

    #[test]
    fn rooms_rank_by_score_and_point_at_rect_center() {
        let a = room("r1", "Kitchen", 100.0, 100.0);
        let b = room("r2", "Big Kitchen Storage", 0.0, 0.0);
        let sources = SearchSources {
            rooms: vec![&b, &a],
            ..SearchSources::default()
        };
        let results = search_sources("  KITCHEN ", &sources, &SpriteLookup::new());
        assert_eq!(results[0].target.id, "r1");
        assert_eq!(results[0].score, 20);
        assert_eq!(results[1].score, 12);
        assert_eq!((results[0].target.x, results[0].target.y), (Some(105.0), Some(110.0)));
    }

    #[test]
    fn blank_query_returns_nothing() {
        let lookup = sprites(&[("fridge", 1)]);
        assert!(search_sources("   ", &SearchSources::default(), &lookup).is_empty());
    }

    #[test]
    fn stale_tickets_do_not_replace_results() {
        let mut session = SearchSession::default();
        let old = session.begin();
        let new = session.begin();
        let result = SearchResult {
            target: SearchTarget::named("a", "A"),
            score: 10,
            kind: ResultKind::Poi,
        };
        assert!(session.apply(new, vec![result.clone()]));
        assert!(!session.apply(old, Vec::new()));
        assert_eq!(session.results(), &[result]);
        session.clear();
        assert!(session.results().is_empty());
        assert!(!session.apply(new, Vec::new()));
    }

    #[test]
    fn failed_search_clears_display() {
        let mut session = SearchSession::default();
        let first = session.begin();
        session.apply(
            first,
            vec![SearchResult {
                target: SearchTarget::named("a", "A"),
                score: 10,
                kind: ResultKind::Poi,
            }],
        );
        let second = session.begin();
        session.fail(second);
        assert!(session.results().is_empty());
        assert!(!session.is_visible());
    }

    #[test]
    fn rows_hide_redundant_descriptions_and_limit_count() {
        let mut results = Vec::new();
        for i in 0..12 {
            let mut target = SearchTarget::named(format!("r{i}"), format!("Room {i}"));
            target.desc = Some("Room".into());
            target.x = Some(150.0);
            target.y = Some(42.5);
            results.push(SearchResult {
                target,
                score: if i < 2 { 20 } else { 5 },
                kind: ResultKind::Room,
            });
        }
        let mut poi = SearchTarget::named("p", "");
        poi.desc = Some("Abandoned".into());
        poi.location = Some("West Point".into());
        results.insert(
            0,
            SearchResult {
                target: poi,
                score: 3,
                kind: ResultKind::Poi,
            },
        );

        let view = SearchView::new(&results);
        assert_eq!(view.rows.len(), SEARCH_DISPLAY_LIMIT);
        assert_eq!(view.show_all_count, Some(2));
        let poi_row = &view.rows[0];
        assert_eq!(poi_row.title, "Unnamed POI");
        assert_eq!(poi_row.coordinates, "No coordinates");
        assert_eq!(poi_row.description.as_deref(), Some("Abandoned"));
        assert_eq!(poi_row.location.as_deref(), Some("West Point"));
        let room_row = &view.rows[1];
        assert_eq!(room_row.type_label, "Room");
        assert_eq!(room_row.coordinates, "(150, 42.5)");
        assert_eq!(room_row.description, None);
        assert_eq!(room_row.location, None);
    }

    #[test]
    fn single_confident_result_offers_no_show_all() {
        let results = vec![SearchResult {
            target: SearchTarget::named("a", "A"),
            score: 50,
            kind: ResultKind::Tile,
        }];
        assert_eq!(SearchView::new(&results).show_all_count, None);
    }
}
