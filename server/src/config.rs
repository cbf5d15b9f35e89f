use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_PORT: u16 = 8880;
pub const DEFAULT_STATIC_ROOT: &str = "html";
pub const DEFAULT_SERVER_CONFIG: &str = "server_config.txt";

/// Index page served at `/` when present in the static root.
pub const INDEX_PAGE: &str = "pzmap.html";

pub const POI_FILE: &str = "poi.json";
pub const SPRITE_LOOKUP_FILE: &str = "sprite_lookup.json";
pub const MAP_INFO_FILE: &str = "map_info.json";
pub const CONTAINER_DIR: &str = "processed_containers";
pub const CONTAINER_FILE_SUFFIX: &str = "_processed_containers.json";

pub fn server_port() -> u16 {
    std::env::var("PZMAP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn static_root() -> PathBuf {
    std::env::var("PZMAP_STATIC_ROOT")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_ROOT))
}

pub fn server_config_path() -> PathBuf {
    std::env::var("PZMAP_SERVER_CONFIG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVER_CONFIG))
}

/// `key=value` lines; anything without `=` is ignored. A missing file is an
/// empty config.
pub fn load_server_config(path: &Path) -> HashMap<String, String> {
    let Ok(text) = std::fs::read_to_string(path) else {
        tracing::debug!(path = %path.display(), "no server config file");
        return HashMap::new();
    };
    text.lines()
        .filter_map(|line| line.trim().split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Expand `$VAR` and `${VAR}` from the environment. Unknown variables are
/// left as written.
pub fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };
        match (name.is_empty(), std::env::var(name)) {
            (false, Ok(value)) => out.push_str(&value),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}

/// Root of the game's save folders. `PZMAP_SAVE_PATH` wins over the config
/// file's `save_path`; `None` disables the save routes.
pub fn save_path() -> Option<PathBuf> {
    if let Some(value) = std::env::var("PZMAP_SAVE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
    {
        return Some(PathBuf::from(expand_env_vars(value.trim())));
    }
    load_server_config(&server_config_path())
        .get("save_path")
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| PathBuf::from(expand_env_vars(value)))
}
