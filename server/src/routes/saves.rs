//! Read-only inspection of the game's save folders: which saves exist, which
//! game version wrote them and which map blocks they contain.

use std::path::{Component, Path, PathBuf};

use axum::Json;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::config::INDEX_PAGE;
use crate::state::AppState;

const SIGNATURE_FILE: &str = "map.bin";

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("no save path configured")]
    NoSaveRoot,
    #[error("save path {0:?} leaves the save root")]
    OutsideRoot(String),
    #[error("{0} is not a save directory")]
    NotADirectory(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SaveVersion {
    B41,
    B42,
    #[serde(rename = "unknown")]
    Unknown,
}

impl SaveVersion {
    /// `map.bin` starts with three big-endian i32s: cell width, cell height
    /// and layer count.
    pub fn from_signature(bytes: &[u8]) -> Self {
        let Some(head) = bytes.get(..12) else {
            return Self::Unknown;
        };
        let mut fields = head
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]));
        match (fields.next(), fields.next(), fields.next()) {
            (Some(300), Some(300), Some(8)) => Self::B41,
            (Some(256), Some(256), Some(32)) => Self::B42,
            _ => Self::Unknown,
        }
    }

    /// Folder holding `map_{x}_{y}.bin`, relative to the save.
    pub fn map_folder(self) -> &'static str {
        match self {
            Self::B42 => "map",
            Self::B41 | Self::Unknown => ".",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    pub version: SaveVersion,
    /// `x,y` pairs joined by `;`.
    pub blocks: String,
}

impl SaveSummary {
    pub fn unknown() -> Self {
        Self {
            version: SaveVersion::Unknown,
            blocks: String::new(),
        }
    }
}

/// `{mode}/{save}` for every save directory two levels under `root`.
pub fn list_saves(root: &Path) -> Result<Vec<String>, SaveError> {
    let mut saves = Vec::new();
    for mode in std::fs::read_dir(root)? {
        let mode = mode?;
        if !mode.file_type()?.is_dir() {
            continue;
        }
        for save in std::fs::read_dir(mode.path())? {
            let save = save?;
            if save.file_type()?.is_dir() {
                saves.push(format!(
                    "{}/{}",
                    mode.file_name().to_string_lossy(),
                    save.file_name().to_string_lossy()
                ));
            }
        }
    }
    saves.sort();
    Ok(saves)
}

/// Join a client-supplied save name onto `root`, refusing anything that could
/// step outside it.
pub fn resolve_save(root: &Path, save: &str) -> Result<PathBuf, SaveError> {
    let relative = Path::new(save);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if save.is_empty() || escapes {
        return Err(SaveError::OutsideRoot(save.to_string()));
    }
    let path = root.join(relative);
    if !path.is_dir() {
        return Err(SaveError::NotADirectory(path));
    }
    Ok(path)
}

pub fn detect_version(save_dir: &Path) -> Result<SaveVersion, SaveError> {
    match std::fs::read(save_dir.join(SIGNATURE_FILE)) {
        Ok(bytes) => Ok(SaveVersion::from_signature(&bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SaveVersion::Unknown),
        Err(e) => Err(e.into()),
    }
}

fn parse_block_name(name: &str) -> Option<(i64, i64)> {
    let (x, y) = name.strip_prefix("map_")?.strip_suffix(".bin")?.split_once('_')?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(x) || !digits(y) {
        return None;
    }
    Some((x.parse().ok()?, y.parse().ok()?))
}

pub fn scan_blocks(dir: &Path) -> Result<Vec<(i64, i64)>, SaveError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut blocks = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(block) = entry.file_name().to_str().and_then(parse_block_name) {
            blocks.push(block);
        }
    }
    blocks.sort_unstable();
    Ok(blocks)
}

pub fn inspect_save(root: &Path, save: &str) -> Result<SaveSummary, SaveError> {
    let save_dir = resolve_save(root, save)?;
    let version = detect_version(&save_dir)?;
    let blocks = scan_blocks(&save_dir.join(version.map_folder()))?
        .into_iter()
        .map(|(x, y)| format!("{x},{y}"))
        .collect::<Vec<_>>()
        .join(";");
    Ok(SaveSummary { version, blocks })
}

pub async fn index(State(state): State<AppState>) -> Response {
    match tokio::fs::read_to_string(state.static_root.join(INDEX_PAGE)).await {
        Ok(page) => Html(page).into_response(),
        Err(_) => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn list_save(State(state): State<AppState>) -> Json<Vec<String>> {
    let Some(root) = state.save_path.clone() else {
        return Json(Vec::new());
    };
    let result = tokio::task::spawn_blocking(move || list_saves(&root)).await;
    match result {
        Ok(Ok(saves)) => Json(saves),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed to list saves");
            Json(Vec::new())
        }
        Err(e) => {
            tracing::error!(error = %e, "save listing task failed");
            Json(Vec::new())
        }
    }
}

pub async fn load(State(state): State<AppState>, UrlPath(save): UrlPath<String>) -> Json<SaveSummary> {
    let Some(root) = state.save_path.clone() else {
        return Json(SaveSummary::unknown());
    };
    let result = tokio::task::spawn_blocking({
        let save = save.clone();
        move || inspect_save(&root, &save)
    })
    .await;
    match result {
        Ok(Ok(summary)) => {
            tracing::debug!(%save, version = ?summary.version, "save inspected");
            Json(summary)
        }
        Ok(Err(e)) => {
            tracing::warn!(%save, error = %e, "save not readable");
            Json(SaveSummary::unknown())
        }
        Err(e) => {
            tracing::error!(error = %e, "save inspection task failed");
            Json(SaveSummary::unknown())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(a: i32, b: i32, c: i32) -> Vec<u8> {
        [a, b, c].iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn signatures_map_to_versions() {
        assert_eq!(SaveVersion::from_signature(&signature(300, 300, 8)), SaveVersion::B41);
        assert_eq!(SaveVersion::from_signature(&signature(256, 256, 32)), SaveVersion::B42);
        assert_eq!(SaveVersion::from_signature(&signature(1, 2, 3)), SaveVersion::Unknown);
        assert_eq!(SaveVersion::from_signature(&[0, 0, 1]), SaveVersion::Unknown);
    }

    #[test]
    fn block_names_need_two_numbers() {
        assert_eq!(parse_block_name("map_10_20.bin"), Some((10, 20)));
        assert_eq!(parse_block_name("map_10_20.bin.bak"), None);
        assert_eq!(parse_block_name("map_-1_2.bin"), None);
        assert_eq!(parse_block_name("chunkdata_1_2.bin"), None);
        assert_eq!(parse_block_name("map__2.bin"), None);
    }

    #[test]
    fn rejects_paths_leaving_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            resolve_save(dir.path(), "../etc"),
            Err(SaveError::OutsideRoot(_))
        ));
        assert!(matches!(
            resolve_save(dir.path(), "/etc"),
            Err(SaveError::OutsideRoot(_))
        ));
        assert!(matches!(
            resolve_save(dir.path(), "Survivor/missing"),
            Err(SaveError::NotADirectory(_))
        ));
    }

    #[test]
    fn inspects_b42_save_from_map_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let save = dir.path().join("Survivor/run1");
        std::fs::create_dir_all(save.join("map")).expect("create save");
        std::fs::write(save.join("map.bin"), signature(256, 256, 32)).expect("signature");
        std::fs::write(save.join("map/map_3_4.bin"), b"").expect("block");
        std::fs::write(save.join("map/map_1_2.bin"), b"").expect("block");
        std::fs::write(save.join("map_9_9.bin"), b"").expect("stray block");

        let summary = inspect_save(dir.path(), "Survivor/run1").expect("inspect");
        assert_eq!(summary.version, SaveVersion::B42);
        assert_eq!(summary.blocks, "1,2;3,4");
        assert_eq!(list_saves(dir.path()).expect("list"), vec!["Survivor/run1"]);
    }

    #[test]
    fn save_without_signature_is_unknown_but_scanned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let save = dir.path().join("Sandbox/old");
        std::fs::create_dir_all(&save).expect("create save");
        std::fs::write(save.join("map_5_6.bin"), b"").expect("block");

        let summary = inspect_save(dir.path(), "Sandbox/old").expect("inspect");
        assert_eq!(summary.version, SaveVersion::Unknown);
        assert_eq!(summary.blocks, "5,6");
    }
}
