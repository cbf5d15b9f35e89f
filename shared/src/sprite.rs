use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mark::LayeredPoint;

/// `sprite_lookup.json`: tile/sprite name to every place it appears.
pub type SpriteLookup = BTreeMap<String, SpriteEntry>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpriteEntry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub coordinates: Vec<LayeredPoint>,
    /// Tile markers show at every zoom unless the lookup says otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_zoom_level: Option<u32>,
}

/// `processed_containers/{type}_processed_containers.json`, keyed by container type.
pub type ContainerFile = BTreeMap<String, ContainerSet>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerSet {
    #[serde(default)]
    pub coordinates: Vec<LayeredPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_lookup_defaults_missing_layer() {
        let json = r#"{"fridge 01": {"coordinates": [{"x": 5, "y": 6}, {"x": 7, "y": 8, "layer": 1}]}}"#;
        let lookup: SpriteLookup = serde_json::from_str(json).expect("lookup should parse");
        let entry = &lookup["fridge 01"];
        assert_eq!(entry.coordinates.len(), 2);
        assert_eq!(entry.coordinates[0].layer, 0);
        assert_eq!(entry.coordinates[1].layer, 1);
    }

    #[test]
    fn container_file_is_keyed_by_type() {
        let json = r#"{"fridge": {"coordinates": [{"x": 150, "y": 150, "layer": 0}]}}"#;
        let file: ContainerFile = serde_json::from_str(json).expect("containers should parse");
        assert_eq!(file["fridge"].coordinates[0].x, 150.0);
    }
}
