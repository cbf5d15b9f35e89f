use axum::Json;
use axum::extract::State;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let catalog = state.catalog.read().await.clone();
    Json(serde_json::json!({
        "status": "ok",
        "save_inspection": state.save_path.is_some(),
        "catalog": catalog,
    }))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::Path;

    use crate::state::AppState;

    async fn spawn_test_server(state: AppState) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = crate::app::build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    fn write(path: &Path, body: &[u8]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, body).expect("write fixture");
    }

    #[tokio::test]
    async fn health_reports_catalog() {
        let root = tempfile::tempdir().expect("tempdir");
        write(
            &root.path().join("poi.json"),
            br#"[{"ID": "1", "name": "A", "x": 1, "y": 2}, {"ID": "2", "name": "B", "x": 3, "y": 4}]"#,
        );
        let state = AppState::new(root.path().to_path_buf(), None);
        crate::services::catalog_loader::run(state.clone()).await;

        let (addr, handle) = spawn_test_server(state).await;
        let body: serde_json::Value = reqwest::get(format!("http://{addr}/api/health"))
            .await
            .expect("health request")
            .json()
            .await
            .expect("health json");
        handle.abort();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["save_inspection"], false);
        assert_eq!(body["catalog"]["poi_count"], 2);
        assert_eq!(body["catalog"]["loaded"], true);
    }

    #[tokio::test]
    async fn root_serves_index_page_or_no_content() {
        let empty = tempfile::tempdir().expect("tempdir");
        let (addr, handle) = spawn_test_server(AppState::new(empty.path().to_path_buf(), None)).await;
        let resp = reqwest::get(format!("http://{addr}/")).await.expect("root request");
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);
        handle.abort();

        let root = tempfile::tempdir().expect("tempdir");
        write(&root.path().join("pzmap.html"), b"<html>map</html>");
        write(&root.path().join("marks/rooms.json"), b"[]");
        let (addr, handle) = spawn_test_server(AppState::new(root.path().to_path_buf(), None)).await;
        let resp = reqwest::get(format!("http://{addr}/")).await.expect("root request");
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.expect("body"), "<html>map</html>");

        let resp = reqwest::get(format!("http://{addr}/marks/rooms.json"))
            .await
            .expect("static request");
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get(reqwest::header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("no-cache")
        );
        handle.abort();
    }

    #[tokio::test]
    async fn save_routes_list_and_inspect() {
        let static_root = tempfile::tempdir().expect("tempdir");
        let saves = tempfile::tempdir().expect("tempdir");
        let save = saves.path().join("Survivor/run1");
        let signature: Vec<u8> = [300i32, 300, 8].iter().flat_map(|v| v.to_be_bytes()).collect();
        write(&save.join("map.bin"), &signature);
        write(&save.join("map_7_8.bin"), b"");
        write(&saves.path().join("Survivor/notes.txt"), b"not a save");

        let state = AppState::new(
            static_root.path().to_path_buf(),
            Some(saves.path().to_path_buf()),
        );
        let (addr, handle) = spawn_test_server(state).await;

        let listed: Vec<String> = reqwest::get(format!("http://{addr}/list_save"))
            .await
            .expect("list request")
            .json()
            .await
            .expect("list json");
        assert_eq!(listed, vec!["Survivor/run1"]);

        let loaded: serde_json::Value = reqwest::get(format!("http://{addr}/load/Survivor/run1"))
            .await
            .expect("load request")
            .json()
            .await
            .expect("load json");
        assert_eq!(loaded, serde_json::json!({"version": "B41", "blocks": "7,8"}));

        let missing: serde_json::Value = reqwest::get(format!("http://{addr}/load/Survivor/none"))
            .await
            .expect("load request")
            .json()
            .await
            .expect("load json");
        assert_eq!(missing, serde_json::json!({"version": "unknown", "blocks": ""}));
        handle.abort();
    }

    #[tokio::test]
    async fn save_routes_are_empty_without_save_path() {
        let root = tempfile::tempdir().expect("tempdir");
        let (addr, handle) = spawn_test_server(AppState::new(root.path().to_path_buf(), None)).await;

        let listed: Vec<String> = reqwest::get(format!("http://{addr}/list_save"))
            .await
            .expect("list request")
            .json()
            .await
            .expect("list json");
        assert!(listed.is_empty());

        let loaded: serde_json::Value = reqwest::get(format!("http://{addr}/load/any/save"))
            .await
            .expect("load request")
            .json()
            .await
            .expect("load json");
        assert_eq!(loaded["version"], "unknown");
        handle.abort();
    }
}
