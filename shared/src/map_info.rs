use serde::{Deserialize, Serialize};

pub const DEFAULT_CELL_SIZE: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    #[default]
    Top,
    Iso,
}

impl MapType {
    pub fn as_str(self) -> &'static str {
        match self {
            MapType::Top => "top",
            MapType::Iso => "iso",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            MapType::Top => MapType::Iso,
            MapType::Iso => MapType::Top,
        }
    }
}

/// Base map descriptor (`map_info.json`): projection constants and floor range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    #[serde(rename = "type", default)]
    pub map_type: MapType,
    pub minlayer: i32,
    pub maxlayer: i32,
    #[serde(default)]
    pub x0: f64,
    #[serde(default)]
    pub y0: f64,
    /// Image pixels per square.
    pub sqr: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_cell_size")]
    pub cell_size: u32,
    /// Full image size in pixels, used for the initial fit.
    #[serde(default)]
    pub w: f64,
    #[serde(default)]
    pub h: f64,
}

fn default_scale() -> f64 {
    1.0
}

fn default_cell_size() -> u32 {
    DEFAULT_CELL_SIZE
}

impl MapInfo {
    /// Number of selectable floors. The layer range is half-open: `[minlayer, maxlayer)`.
    pub fn layers(&self) -> i32 {
        self.maxlayer - self.minlayer
    }

    pub fn clamp_layer(&self, layer: i32) -> i32 {
        if self.maxlayer <= self.minlayer {
            return self.minlayer;
        }
        layer.clamp(self.minlayer, self.maxlayer - 1)
    }
}

impl Default for MapInfo {
    fn default() -> Self {
        Self {
            map_type: MapType::Top,
            minlayer: 0,
            maxlayer: 8,
            x0: 0.0,
            y0: 0.0,
            sqr: 1.0,
            scale: 1.0,
            cell_size: DEFAULT_CELL_SIZE,
            w: 0.0,
            h: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_descriptor_with_defaults() {
        let json = r#"{"type": "iso", "minlayer": -1, "maxlayer": 8, "x0": 100, "y0": 50, "sqr": 128}"#;
        let info: MapInfo = serde_json::from_str(json).expect("map info should parse");
        assert_eq!(info.map_type, MapType::Iso);
        assert_eq!(info.cell_size, 256);
        assert_eq!(info.layers(), 9);
        assert_eq!(info.scale, 1.0);
    }

    #[test]
    fn clamp_layer_uses_half_open_range() {
        let info = MapInfo {
            minlayer: 0,
            maxlayer: 8,
            ..MapInfo::default()
        };
        assert_eq!(info.clamp_layer(8), 7);
        assert_eq!(info.clamp_layer(-3), 0);
        assert_eq!(info.clamp_layer(4), 4);
    }
}
