//! Front door routes through `tower::ServiceExt::oneshot`

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use misp_global_search::api::{build_router, AppState};
use misp_global_search::config::IndexesConfig;
use misp_global_search::search::QueryComposer;
use misp_global_search::source::LocalTree;
use misp_global_search::store::{IndexStore, MemoryStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

async fn app_with(store: MemoryStore, metrics: bool) -> axum::Router {
    let composer = Arc::new(QueryComposer::new(
        Arc::new(store),
        IndexesConfig::default(),
        Duration::ZERO,
    ));
    build_router(AppState::new(composer).with_metrics(metrics))
}

async fn bootstrapped_app() -> (TempDir, axum::Router) {
    let dir = TempDir::new().unwrap();
    seed_tree(dir.path(), 0);
    let store = MemoryStore::new();
    coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())))
        .bootstrap()
        .await
        .unwrap();
    (dir, app_with(store, true).await)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (_dir, app) = bootstrapped_app().await;
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "ok");
}

#[tokio::test]
async fn test_index_list() {
    let (_dir, app) = bootstrapped_app().await;
    let (status, body) = get(app, "/indexes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indexes"][0]["name"], "misp-galaxy");
    assert_eq!(body["indexes"][2]["position"], 2);
}

#[tokio::test]
async fn test_search_passes_store_response_through() {
    let (_dir, app) = bootstrapped_app().await;
    let (status, body) = get(app, "/search?q=&index=all&page=1&pageSize=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hits"].as_array().unwrap().len(), 2);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["estimatedTotalHits"], 11);
}

#[tokio::test]
async fn test_search_with_facets() {
    let (_dir, app) = bootstrapped_app().await;
    let (status, body) = get(app, "/search?index=2&taxonomies=predicates&pageSize=abc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hits"].as_array().unwrap().len(), 3);
    assert_eq!(body["limit"], 10);
}

#[tokio::test]
async fn test_search_without_indexes() {
    let app = app_with(MemoryStore::new(), true).await;
    let (status, body) = get(app, "/search?q=apt&index=all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"hits": []}));
}

#[tokio::test]
async fn test_store_errors_map_to_bad_gateway() {
    let store = MemoryStore::new();
    // Index exists but `galaxy` was never declared filterable
    store.create_index(GALAXY_INDEX, "uuid").await.unwrap();
    let app = app_with(store, true).await;

    let (status, body) = get(app, "/search?index=0&galaxy=tool").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "STORE_ERROR");
}

#[tokio::test]
async fn test_metrics_route_follows_config() {
    misp_global_search::metrics::init_metrics().unwrap();

    let app = app_with(MemoryStore::new(), true).await;
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let app = app_with(MemoryStore::new(), false).await;
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
