use serde::{Deserialize, Serialize};

use crate::mark::{GLOBAL_LAYER, Geometry, Mark, MarkStyle, TextPosition};

pub const POI_TEXT_COLOR: &str = "#FFD700";
pub const POI_TEXT_FONT: &str = "bold 18px Arial, sans-serif";
pub const POI_POINT_COLOR: &str = "yellow";
pub const POI_POINT_BACKGROUND: &str = "rgba(255, 243, 17, 0.3)";

/// One record of `poi.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl PoiRecord {
    /// Town labels use ids in the 3000 series and render as always-visible text.
    pub fn is_label(&self) -> bool {
        self.id.starts_with('3')
    }

    pub fn into_mark(self) -> Mark {
        let label = self.is_label();
        let geometry = if label {
            Geometry::Text {
                x: self.x,
                y: self.y,
            }
        } else {
            Geometry::Point {
                x: self.x,
                y: self.y,
            }
        };
        let style = if label {
            MarkStyle {
                color: POI_TEXT_COLOR.into(),
                background: "transparent".into(),
                text_position: TextPosition::Center,
                font: Some(POI_TEXT_FONT.into()),
            }
        } else {
            MarkStyle {
                color: POI_POINT_COLOR.into(),
                background: POI_POINT_BACKGROUND.into(),
                text_position: TextPosition::None,
                font: None,
            }
        };
        let kind_class = if label { "poi-text" } else { "poi-point" };
        Mark {
            id: self.id,
            geometry,
            layer: GLOBAL_LAYER,
            visible_zoom_level: if label { 0 } else { 1 },
            style,
            class_list: vec!["poi-marker".into(), kind_class.into()],
            name: Some(self.name),
            text: None,
            desc: self.description,
            location: self.location,
            tags: self.tags.unwrap_or_default(),
        }
    }
}
