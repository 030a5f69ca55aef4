//! Test fixture creation for the database and the fake external services

use super::constants::*;
use anyhow::Result;
use axum::{extract::Json, response::Html, routing::get, routing::post, Router};
use release_index_server::catalogue::{BandDiscographyEntry, BandReference};
use release_index_server::catalogue_store::BandReferenceStore;
use release_index_server::SqliteCatalogueStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Creates a temporary database holding the band reference data.
/// Returns (temp_dir, db_path)
pub fn create_test_db() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("release-index.db");
    let store = SqliteCatalogueStore::open(&db_path)?;

    let reference = BandReference {
        id: "band-ref-1".to_string(),
        band_name: BAND_1_NAME.to_string(),
        metal_archives_id: 3860,
        genre: Some("Black Metal".to_string()),
        last_synced_at: 0,
    };
    store.upsert_band_reference(&reference)?;
    store.replace_discography(
        &reference.id,
        &[
            BandDiscographyEntry::new(&reference.id, BAND_1_ALBUM_1, "Full-length", Some(2004)),
            BandDiscographyEntry::new(&reference.id, BAND_1_ALBUM_2, "Full-length", Some(2007)),
        ],
    )?;

    Ok((dir, db_path))
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake service");
    let addr = listener.local_addr().expect("Failed to get local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}", addr)
}

fn product(title: &str, slug: &str) -> String {
    format!(r#"<div class="product"><a class="title" href="/item/{slug}">{title}</a></div>"#)
}

/// Spawns a shop serving two CD catalogue pages with [`SHOP_LISTING_COUNT`] listings.
/// Returns the URL of the first page.
pub async fn spawn_fake_shop() -> String {
    let page_1 = format!(
        "<html><body>{}{}<a class=\"next\" href=\"/cd/page/2\">Next</a></body></html>",
        product(&format!("{BAND_1_NAME} - {BAND_1_ALBUM_1}"), "autumn-aurora"),
        product(&format!("{BAND_1_NAME} - {BAND_1_UNKNOWN_ALBUM}"), "shadow-play"),
    );
    let page_2 = format!(
        "<html><body>{}{}</body></html>",
        product(&format!("{BAND_1_NAME} - {BAND_1_ALBUM_2}"), "blood-in-our-wells"),
        product(&format!("{UNRELATED_BAND_NAME} - De Mysteriis Dom Sathanas"), "dmds"),
    );

    let router = Router::new()
        .route("/cd", get(move || async move { Html(page_1) }))
        .route("/cd/page/2", get(move || async move { Html(page_2) }));
    format!("{}/cd", serve(router).await)
}

/// Picks the discography id offered for the album named in the prompt.
fn matched_album_id(prompt: &str) -> Option<String> {
    let album = prompt
        .lines()
        .find_map(|line| line.strip_prefix("Album: "))?
        .trim();
    prompt.lines().find_map(|line| {
        let (id, rest) = line.strip_prefix('[')?.split_once("] ")?;
        rest.starts_with(album).then(|| id.to_string())
    })
}

/// Spawns a fake messages API that calls every album Ukrainian and links it
/// when the album appears in the offered discography.
/// Returns (base_url, request_counter)
pub async fn spawn_fake_llm() -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let router = Router::new().route(
        "/v1/messages",
        post(move |Json(request): Json<Value>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let prompt = request["messages"][0]["content"].as_str().unwrap_or_default();
                let verdict = json!({
                    "isUkrainian": true,
                    "confidence": 0.9,
                    "analysis": "Ukrainian black metal",
                    "matchedAlbumId": matched_album_id(prompt),
                });
                Json(json!({
                    "content": [{"type": "text", "text": format!("Verdict: {verdict}")}],
                    "stop_reason": "end_turn"
                }))
            }
        }),
    );
    (serve(router).await, calls)
}
