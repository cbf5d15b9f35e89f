use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let static_assets = Router::new()
        .fallback_service(
            ServeDir::new(state.static_root.as_path())
                .precompressed_br()
                .precompressed_gzip(),
        )
        .layer(middleware::from_fn(set_static_cache_control));

    let app = Router::new()
        .route("/", get(routes::saves::index))
        .route("/list_save", get(routes::saves::list_save))
        .route("/load/{*save}", get(routes::saves::load))
        .route("/api/health", get(routes::api::health));

    app.fallback_service(static_assets)
        .layer(CompressionLayer::new())
        .with_state(state)
}

async fn set_static_cache_control(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    if response.status().is_success()
        && let Some(cache_control) = cache_control_for_path(&path)
    {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(cache_control),
        );
    }

    response
}

fn cache_control_for_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension().and_then(|ext| ext.to_str())?;

    if is_hashed_bundle_asset(path, ext) {
        return Some("public, max-age=31536000, immutable");
    }

    match ext {
        // Mark and search data is regenerated in place.
        "json" => Some("no-cache"),
        "dzi" | "png" | "jpg" | "jpeg" | "webp" => Some("public, max-age=86400"),
        _ => None,
    }
}

fn is_hashed_bundle_asset(path: &str, ext: &str) -> bool {
    if !matches!(ext, "wasm" | "js" | "css") {
        return false;
    }

    let Some(filename) = Path::new(path).file_name().and_then(|name| name.to_str()) else {
        return false;
    };

    filename
        .split(['-', '_', '.'])
        .any(|segment| segment.len() >= 8 && segment.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_cache_for_hashed_bundle_assets() {
        assert_eq!(
            cache_control_for_path("/pzmap-client-71578f6b278221f3_bg.wasm"),
            Some("public, max-age=31536000, immutable")
        );
        assert_eq!(cache_control_for_path("/pzmap.js"), None);
    }

    #[test]
    fn day_cache_for_deep_zoom_tiles() {
        assert_eq!(
            cache_control_for_path("/base_top.dzi"),
            Some("public, max-age=86400")
        );
        assert_eq!(
            cache_control_for_path("/base_top_files/layer0_files/12/3_4.webp"),
            Some("public, max-age=86400")
        );
    }

    #[test]
    fn data_files_are_revalidated() {
        assert_eq!(cache_control_for_path("/marks/rooms.json"), Some("no-cache"));
        assert_eq!(cache_control_for_path("/sprite_lookup.json"), Some("no-cache"));
        assert_eq!(cache_control_for_path("/"), None);
        assert_eq!(cache_control_for_path("/pzmap.html"), None);
    }
}
