use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::{save_path, static_root};

/// What the catalog service found in the static root's data files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataCatalog {
    pub loaded: bool,
    pub map_info: bool,
    pub poi_count: usize,
    pub sprite_count: usize,
    /// First sprite names, for a quick look at what search will offer.
    pub sprite_sample: Vec<String>,
    pub container_types: Vec<String>,
    pub problems: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub static_root: Arc<PathBuf>,
    /// Root of the game's save folders; the save routes answer empty without it.
    pub save_path: Option<Arc<PathBuf>>,
    pub catalog: Arc<RwLock<DataCatalog>>,
}

impl AppState {
    pub fn new(static_root: PathBuf, save_path: Option<PathBuf>) -> Self {
        Self {
            static_root: Arc::new(static_root),
            save_path: save_path.map(Arc::new),
            catalog: Arc::new(RwLock::new(DataCatalog::default())),
        }
    }

    pub fn from_env() -> Self {
        Self::new(static_root(), save_path())
    }
}
