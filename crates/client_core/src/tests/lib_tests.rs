use super::*;

use std::collections::HashMap;

use axum::{
    extract::{Path, Query},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn album_media(
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let authorised = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bearer secret-{id}").as_str());
    if !authorised {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"ok": false, "error": "Album is password protected"})),
        );
    }
    let page_size = query.get("pageSize").cloned().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "media": [
                {"id": "p1", "url": "/p1.jpg", "filename": page_size},
                {"id": "p2", "url": "/p2.jpg"}
            ],
            "total": 2
        })),
    )
}

async fn album_detail(Path(id): Path<String>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let authorised = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bearer secret-{id}").as_str());
    if !authorised {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"ok": false, "error": "Album is password protected"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"ok": true, "data": {"id": id, "title": "Harbour walk"}})),
    )
}

async fn album_unlock(Path(id): Path<String>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] == "hunter2" {
        (StatusCode::OK, Json(json!({"ok": true, "token": format!("secret-{id}")})))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"ok": false, "error": "Invalid password"})),
        )
    }
}

async fn spawn_album_server() -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let app = Router::new()
        .route("/api/albums/:id", get(album_detail))
        .route("/api/albums/:id/media", get(album_media))
        .route("/api/albums/:id/unlock", post(album_unlock));

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("http://{addr}"))
}

fn settings_for(base_url: String) -> Settings {
    Settings {
        base_url,
        album_page_size: 7,
        ..Settings::default()
    }
}

#[tokio::test]
async fn protected_album_unlocks_and_reloads() {
    let base_url = spawn_album_server().await.expect("spawn server");
    let client = GalleryClient::from_settings(&settings_for(base_url)).expect("client");

    let feed = Arc::new(client.album_feed(AlbumId::new("a9")));
    assert_eq!(feed.page_size(), 7);
    feed.load_initial().await;
    let locked = feed.snapshot().await;
    assert!(locked.requires_unlock);
    assert!(locked.items.is_empty());
    assert_eq!(locked.error_message, None);

    let unlock = client.album_unlock(Arc::clone(&feed));
    assert!(unlock.submit("wrong").await);
    assert_eq!(
        unlock.snapshot().await.error_message.as_deref(),
        Some("Invalid password")
    );
    assert!(feed.snapshot().await.requires_unlock);

    assert!(unlock.submit("hunter2").await);
    let unlocked = feed.snapshot().await;
    assert!(!unlocked.requires_unlock);
    assert_eq!(unlocked.items.len(), 2);
    assert_eq!(unlocked.items[0].filename.as_deref(), Some("7"));
    assert!(!unlocked.can_load_more);
    assert_eq!(
        client
            .credentials()
            .credential_for(&AlbumId::new("a9"))
            .as_deref(),
        Some("secret-a9")
    );
}

#[tokio::test]
async fn albums_share_one_credential_store() {
    let base_url = spawn_album_server().await.expect("spawn server");
    let client = GalleryClient::from_settings(&settings_for(base_url)).expect("client");
    client
        .credentials()
        .store("secret-b1".into(), &AlbumId::new("b1"));

    let feed = client.album_feed(AlbumId::new("b1"));
    feed.load_initial().await;

    let snapshot = feed.snapshot().await;
    assert!(!snapshot.requires_unlock);
    assert_eq!(snapshot.items.len(), 2);
}

#[tokio::test]
async fn album_header_unlocks_with_the_shared_store() {
    let base_url = spawn_album_server().await.expect("spawn server");
    let client = GalleryClient::from_settings(&settings_for(base_url)).expect("client");

    let header = client.album_detail(AlbumId::new("c3"));
    header.load().await;
    assert!(header.snapshot().await.requires_unlock);

    let feed = Arc::new(client.album_feed(AlbumId::new("c3")));
    assert!(client.album_unlock(feed).submit("hunter2").await);
    header.load().await;

    let snapshot = header.snapshot().await;
    assert!(!snapshot.requires_unlock);
    assert_eq!(
        snapshot.detail.map(|album| album.title),
        Some("Harbour walk".to_string())
    );
}

#[tokio::test]
async fn media_without_detail_endpoint_reports_nothing() {
    let base_url = spawn_album_server().await.expect("spawn server");
    let client = GalleryClient::from_settings(&settings_for(base_url)).expect("client");

    let detail = client.media_detail(MediaId::new("p1"));
    detail.load().await;

    let snapshot = detail.snapshot().await;
    assert_eq!(snapshot.detail, None);
    assert_eq!(snapshot.error_message, None);
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = GalleryClient::from_settings(&settings_for("::nope::".into()))
        .err()
        .expect("invalid base url");
    assert!(format!("{err:#}").contains("invalid gallery base url"));
}
