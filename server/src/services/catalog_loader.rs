use std::path::Path;

use pzmap_shared::{ContainerFile, MapInfo, PoiRecord, SpriteLookup};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::{CONTAINER_DIR, CONTAINER_FILE_SUFFIX, MAP_INFO_FILE, POI_FILE, SPRITE_LOOKUP_FILE};
use crate::state::{AppState, DataCatalog};

const SPRITE_SAMPLE_LEN: usize = 10;

pub async fn run(state: AppState) {
    let catalog = load_catalog(&state.static_root).await;
    for problem in &catalog.problems {
        warn!(problem = %problem, "data file problem");
    }
    info!(
        pois = catalog.poi_count,
        sprites = catalog.sprite_count,
        container_types = catalog.container_types.len(),
        "data catalog loaded"
    );
    *state.catalog.write().await = catalog;
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))
}

/// Validate the viewer's data files against the shared model. Unreadable
/// files become problems, never errors.
pub async fn load_catalog(root: &Path) -> DataCatalog {
    let mut catalog = DataCatalog {
        loaded: true,
        ..DataCatalog::default()
    };

    match read_json::<MapInfo>(&root.join(MAP_INFO_FILE)).await {
        Ok(_) => catalog.map_info = true,
        Err(e) => catalog.problems.push(e),
    }

    match read_json::<Vec<PoiRecord>>(&root.join(POI_FILE)).await {
        Ok(pois) => catalog.poi_count = pois.len(),
        Err(e) => catalog.problems.push(e),
    }

    match read_json::<SpriteLookup>(&root.join(SPRITE_LOOKUP_FILE)).await {
        Ok(sprites) => {
            catalog.sprite_count = sprites.len();
            catalog.sprite_sample = sprites.keys().take(SPRITE_SAMPLE_LEN).cloned().collect();
        }
        Err(e) => catalog.problems.push(e),
    }

    let container_dir = root.join(CONTAINER_DIR);
    match tokio::fs::read_dir(&container_dir).await {
        Ok(mut entries) => loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    catalog.problems.push(format!("{}: {e}", container_dir.display()));
                    break;
                }
            };
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(container_type) = file_name.strip_suffix(CONTAINER_FILE_SUFFIX) else {
                continue;
            };
            match read_json::<ContainerFile>(&entry.path()).await {
                Ok(file) if file.contains_key(container_type) => {
                    catalog.container_types.push(container_type.to_string());
                }
                Ok(_) => catalog
                    .problems
                    .push(format!("{file_name}: no \"{container_type}\" entry")),
                Err(e) => catalog.problems.push(e),
            }
        },
        Err(e) => catalog.problems.push(format!("{}: {e}", container_dir.display())),
    }
    catalog.container_types.sort();
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_counts_valid_files_and_reports_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        std::fs::write(root.join(POI_FILE), r#"[{"ID": "1", "name": "Muldraugh", "x": 1, "y": 2}]"#)
            .expect("poi");
        std::fs::write(root.join(SPRITE_LOOKUP_FILE), "{broken").expect("sprites");
        std::fs::create_dir(root.join(CONTAINER_DIR)).expect("container dir");
        std::fs::write(
            root.join(CONTAINER_DIR).join("fridge_processed_containers.json"),
            r#"{"fridge": {"coordinates": [{"x": 1, "y": 2, "layer": 0}]}}"#,
        )
        .expect("fridge");
        std::fs::write(
            root.join(CONTAINER_DIR).join("crate_processed_containers.json"),
            r#"{"other": {"coordinates": []}}"#,
        )
        .expect("crate");
        std::fs::write(root.join(CONTAINER_DIR).join("notes.txt"), "ignored").expect("notes");

        let catalog = load_catalog(root).await;
        assert!(catalog.loaded);
        assert!(!catalog.map_info);
        assert_eq!(catalog.poi_count, 1);
        assert_eq!(catalog.sprite_count, 0);
        assert_eq!(catalog.container_types, vec!["fridge"]);
        // map_info missing, sprite lookup broken, crate file without its type
        assert_eq!(catalog.problems.len(), 3, "{:?}", catalog.problems);
    }
}
