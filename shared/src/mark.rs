use serde::{Deserialize, Serialize};

/// Marks on layer 0 are drawn on every floor.
pub const GLOBAL_LAYER: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// A coordinate tagged with the floor it lives on (sprite and container lists).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayeredPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub layer: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Point { x: f64, y: f64 },
    Area { rects: Vec<Rect> },
    Line { points: Vec<Point> },
    Text { x: f64, y: f64 },
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "point",
            Geometry::Area { .. } => "area",
            Geometry::Line { .. } => "line",
            Geometry::Text { .. } => "text",
        }
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty rect/point list.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        match self {
            Geometry::Point { x, y } | Geometry::Text { x, y } => {
                Some((Point::new(*x, *y), Point::new(*x, *y)))
            }
            Geometry::Area { rects } => {
                let first = rects.first()?;
                let mut min = Point::new(first.x, first.y);
                let mut max = Point::new(first.x + first.width, first.y + first.height);
                for r in &rects[1..] {
                    min.x = min.x.min(r.x);
                    min.y = min.y.min(r.y);
                    max.x = max.x.max(r.x + r.width);
                    max.y = max.y.max(r.y + r.height);
                }
                Some((min, max))
            }
            Geometry::Line { points } => {
                let first = points.first()?;
                let mut min = *first;
                let mut max = *first;
                for p in &points[1..] {
                    min.x = min.x.min(p.x);
                    min.y = min.y.min(p.y);
                    max.x = max.x.max(p.x);
                    max.y = max.y.max(p.y);
                }
                Some((min, max))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    #[default]
    Center,
    None,
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkStyle {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub text_position: TextPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
}

/// One renderable annotation. Geometry and style are flattened so the JSON
/// shape is a single object with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(default)]
    pub layer: i32,
    #[serde(default)]
    pub visible_zoom_level: u32,
    #[serde(flatten)]
    pub style: MarkStyle,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub class_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub tags: Vec<String>,
}

fn nullable_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Mark {
    pub fn new(id: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            layer: GLOBAL_LAYER,
            visible_zoom_level: 0,
            style: MarkStyle::default(),
            class_list: Vec::new(),
            name: None,
            text: None,
            desc: None,
            location: None,
            tags: Vec::new(),
        }
    }

    pub fn point(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(id, Geometry::Point { x, y })
    }

    pub fn area(id: impl Into<String>, rects: Vec<Rect>) -> Self {
        Self::new(id, Geometry::Area { rects })
    }

    pub fn with_style(mut self, color: &str, background: &str, text_position: TextPosition) -> Self {
        self.style.color = color.to_string();
        self.style.background = background.to_string();
        self.style.text_position = text_position;
        self
    }

    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.class_list = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn on_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list.iter().any(|c| c == class)
    }

    /// Street marks carry their label in `text` rather than `name`.
    pub fn display_name(&self) -> Option<&str> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|n| !n.is_empty())
        }
        non_empty(&self.name).or_else(|| non_empty(&self.text))
    }

    pub fn is_global(&self) -> bool {
        self.layer == GLOBAL_LAYER
    }
}
