use std::collections::BTreeMap;

use pzmap_shared::{GLOBAL_LAYER, Geometry, MapType, Mark, Point};
use rstar::{AABB, Envelope, ParentNode, RTree, RTreeNode, RTreeObject};
use thiserror::Error;

use crate::coords::ViewRange;

/// Marks with this class store their rects in `(diff, sum)` space.
pub const DIFF_SUM_CLASS: &str = "diff-sum";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexKind {
    #[default]
    RTree,
    /// Plain scan in top-down space. Used for small sets such as the system markers.
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerFilter {
    /// Marks on the queried floor plus marks on the global layer 0.
    #[default]
    WithGlobal,
    /// Only marks whose layer equals the queried floor.
    CurrentOnly,
}

impl LayerFilter {
    pub fn accepts(self, mark_layer: i32, floor: i32) -> bool {
        match self {
            LayerFilter::WithGlobal => mark_layer == floor || mark_layer == GLOBAL_LAYER,
            LayerFilter::CurrentOnly => mark_layer == floor,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("mark has no id")]
    MissingId,
    #[error("mark {id} has no geometry")]
    EmptyGeometry { id: String },
    #[error("mark {id} has malformed geometry: {reason}")]
    MalformedGeometry { id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
struct IndexEntry {
    id: String,
    layer: i32,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// One R-tree node box, for the debug overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugNode {
    pub depth: usize,
    pub min: Point,
    pub max: Point,
}

#[derive(Debug, Clone)]
struct Stored {
    mark: Mark,
    entry: IndexEntry,
}

/// Spatial store for one mark set, partitioned into one R-tree per
/// `visible_zoom_level` so a query only walks the tiers visible at its zoom.
#[derive(Debug)]
pub struct MarkIndex {
    kind: IndexKind,
    mode: MapType,
    marks: BTreeMap<String, Stored>,
    tiers: BTreeMap<u32, RTree<IndexEntry>>,
}

impl MarkIndex {
    pub fn new(kind: IndexKind) -> Self {
        Self {
            kind,
            mode: MapType::Top,
            marks: BTreeMap::new(),
            tiers: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn mode(&self) -> MapType {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.marks.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Mark> {
        self.marks.get(id).map(|s| &s.mark)
    }

    pub fn all(&self) -> impl Iterator<Item = &Mark> {
        self.marks.values().map(|s| &s.mark)
    }

    /// Insert or replace by id. Returns the replaced mark, if any.
    pub fn insert(&mut self, mark: Mark) -> Result<Option<Mark>, IndexError> {
        validate(&mark)?;
        let (min, max) = index_bounds(&mark, self.mode).ok_or_else(|| {
            IndexError::EmptyGeometry {
                id: mark.id.clone(),
            }
        })?;
        let entry = IndexEntry {
            id: mark.id.clone(),
            layer: mark.layer,
            min: [min.x, min.y],
            max: [max.x, max.y],
        };
        let replaced = self.remove(&mark.id);
        if self.kind == IndexKind::RTree {
            self.tiers
                .entry(mark.visible_zoom_level)
                .or_default()
                .insert(entry.clone());
        }
        self.marks.insert(mark.id.clone(), Stored { mark, entry });
        Ok(replaced)
    }

    /// Exact removal. Absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<Mark> {
        let stored = self.marks.remove(id)?;
        let tier = stored.mark.visible_zoom_level;
        if let Some(tree) = self.tiers.get_mut(&tier) {
            tree.remove(&stored.entry);
            if tree.size() == 0 {
                self.tiers.remove(&tier);
            }
        }
        Some(stored.mark)
    }

    pub fn clear(&mut self) {
        self.marks.clear();
        self.tiers.clear();
    }

    /// Marks whose box intersects the view, visible at `zoom`, and on `floor`
    /// according to `filter`. Order is unspecified.
    pub fn query(
        &self,
        range: &ViewRange,
        zoom: u32,
        floor: i32,
        filter: LayerFilter,
    ) -> Vec<&Mark> {
        let (min, max) = range.bbox(self.mode);
        let query = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        match self.kind {
            IndexKind::Linear => self
                .marks
                .values()
                .filter(|s| {
                    s.mark.visible_zoom_level <= zoom
                        && filter.accepts(s.entry.layer, floor)
                        && s.entry.envelope().intersects(&query)
                })
                .map(|s| &s.mark)
                .collect(),
            IndexKind::RTree => {
                let mut hits = Vec::new();
                for tree in self.tiers.range(..=zoom).map(|(_, tree)| tree) {
                    if tree.size() == 0 {
                        continue;
                    }
                    collect_intersecting(tree.root(), &query, &mut |entry| {
                        if filter.accepts(entry.layer, floor)
                            && let Some(stored) = self.marks.get(&entry.id)
                        {
                            hits.push(&stored.mark);
                        }
                    });
                }
                hits
            }
        }
    }

    /// Switch projection mode. Every box is recomputed, so the trees are
    /// bulk-loaded again. Linear indexes always stay in top mode.
    pub fn change_mode(&mut self, mode: MapType) {
        if self.kind == IndexKind::Linear || mode == self.mode {
            return;
        }
        self.mode = mode;
        let mut by_tier: BTreeMap<u32, Vec<IndexEntry>> = BTreeMap::new();
        for stored in self.marks.values_mut() {
            // Validated on insert, so bounds exist.
            if let Some((min, max)) = index_bounds(&stored.mark, mode) {
                stored.entry.min = [min.x, min.y];
                stored.entry.max = [max.x, max.y];
            }
            by_tier
                .entry(stored.mark.visible_zoom_level)
                .or_default()
                .push(stored.entry.clone());
        }
        self.tiers = by_tier
            .into_iter()
            .map(|(tier, entries)| (tier, RTree::bulk_load(entries)))
            .collect();
    }

    /// Boxes of every internal tree node visible at `zoom`, root first.
    pub fn debug_nodes(&self, zoom: u32) -> Vec<DebugNode> {
        let mut nodes = Vec::new();
        for tree in self.tiers.range(..=zoom).map(|(_, tree)| tree) {
            if tree.size() == 0 {
                continue;
            }
            let mut stack = vec![(tree.root(), 0usize)];
            while let Some((node, depth)) = stack.pop() {
                let envelope = node.envelope();
                let lower = envelope.lower();
                let upper = envelope.upper();
                nodes.push(DebugNode {
                    depth,
                    min: Point::new(lower[0], lower[1]),
                    max: Point::new(upper[0], upper[1]),
                });
                for child in node.children() {
                    if let RTreeNode::Parent(parent) = child {
                        stack.push((parent, depth + 1));
                    }
                }
            }
        }
        nodes
    }
}

fn collect_intersecting<'a>(
    node: &'a ParentNode<IndexEntry>,
    query: &AABB<[f64; 2]>,
    visit: &mut impl FnMut(&'a IndexEntry),
) {
    for child in node.children() {
        match child {
            RTreeNode::Leaf(entry) => {
                if entry.envelope().intersects(query) {
                    visit(entry);
                }
            }
            RTreeNode::Parent(parent) => {
                if parent.envelope().intersects(query) {
                    collect_intersecting(parent, query, visit);
                }
            }
        }
    }
}

fn validate(mark: &Mark) -> Result<(), IndexError> {
    if mark.id.is_empty() {
        return Err(IndexError::MissingId);
    }
    let malformed = |reason: &str| IndexError::MalformedGeometry {
        id: mark.id.clone(),
        reason: reason.to_string(),
    };
    match &mark.geometry {
        Geometry::Point { x, y } | Geometry::Text { x, y } => {
            if !x.is_finite() || !y.is_finite() {
                return Err(malformed("non-finite coordinate"));
            }
        }
        Geometry::Area { rects } => {
            if rects.is_empty() {
                return Err(IndexError::EmptyGeometry {
                    id: mark.id.clone(),
                });
            }
            for r in rects {
                if ![r.x, r.y, r.width, r.height].iter().all(|v| v.is_finite()) {
                    return Err(malformed("non-finite rect"));
                }
                if r.width < 0.0 || r.height < 0.0 {
                    return Err(malformed("negative rect size"));
                }
            }
        }
        Geometry::Line { points } => {
            if points.is_empty() {
                return Err(IndexError::EmptyGeometry {
                    id: mark.id.clone(),
                });
            }
            if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                return Err(malformed("non-finite point"));
            }
        }
    }
    Ok(())
}

/// Box of a mark in the coordinate space of `mode`.
fn index_bounds(mark: &Mark, mode: MapType) -> Option<(Point, Point)> {
    let (min, max) = mark.geometry.bounds()?;
    let diff_sum = mark.has_class(DIFF_SUM_CLASS);
    Some(match (mode, diff_sum) {
        (MapType::Top, false) | (MapType::Iso, true) => (min, max),
        (MapType::Iso, false) => (
            Point::new(min.x - max.y, min.x + min.y),
            Point::new(max.x - min.y, max.x + max.y),
        ),
        // x = (sum + diff) / 2, y = (sum - diff) / 2 with diff on x and sum on y
        (MapType::Top, true) => (
            Point::new((min.y + min.x) / 2.0, (min.y - max.x) / 2.0),
            Point::new((max.y + max.x) / 2.0, (max.y - min.x) / 2.0),
        ),
    })
}
