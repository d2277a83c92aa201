//! Meilisearch adapter against a mocked HTTP server

use misp_global_search::config::MeilisearchConfig;
use misp_global_search::models::Record;
use misp_global_search::store::{
    FederationOptions, FilterExpr, Highlight, IndexQuery, IndexStore, MeilisearchStore,
    SearchOptions, StoreError,
};
use mockito::{Matcher, Server};
use serde_json::json;

fn store_for(server: &Server, task_timeout_secs: u64) -> MeilisearchStore {
    let config = MeilisearchConfig {
        url: server.url(),
        admin_api_key: Some("admin-key".to_string()),
        search_api_key: Some("search-key".to_string()),
        timeout_secs: 5,
        task_poll_interval_ms: 1,
        task_timeout_secs,
    };
    MeilisearchStore::new(&config).unwrap()
}

async fn task(server: &mut Server, uid: u64, body: serde_json::Value) -> mockito::Mock {
    server
        .mock("GET", format!("/tasks/{}", uid).as_str())
        .match_header("authorization", "Bearer admin-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

fn enqueued(uid: u64) -> String {
    json!({"taskUid": uid, "status": "enqueued"}).to_string()
}

#[tokio::test]
async fn test_create_index_waits_for_task() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/indexes")
        .match_header("authorization", "Bearer admin-key")
        .match_body(Matcher::Json(json!({"uid": "misp-galaxy", "primaryKey": "uuid"})))
        .with_status(202)
        .with_body(enqueued(1))
        .create_async()
        .await;
    let done = task(&mut server, 1, json!({"uid": 1, "status": "succeeded"})).await;

    let store = store_for(&server, 5);
    store.create_index("misp-galaxy", "uuid").await.unwrap();

    create.assert_async().await;
    done.assert_async().await;
}

#[tokio::test]
async fn test_existing_index_is_not_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/indexes")
        .with_status(202)
        .with_body(enqueued(2))
        .create_async()
        .await;
    task(
        &mut server,
        2,
        json!({
            "uid": 2,
            "status": "failed",
            "error": {"code": "index_already_exists", "message": "Index `misp-galaxy` already exists."}
        }),
    )
    .await;

    let store = store_for(&server, 5);
    assert!(store.create_index("misp-galaxy", "uuid").await.is_ok());
}

#[tokio::test]
async fn test_deleting_missing_index_is_not_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/indexes/misp-galaxy_new")
        .with_status(202)
        .with_body(enqueued(3))
        .create_async()
        .await;
    task(
        &mut server,
        3,
        json!({
            "uid": 3,
            "status": "failed",
            "error": {"code": "index_not_found", "message": "Index `misp-galaxy_new` not found."}
        }),
    )
    .await;

    let store = store_for(&server, 5);
    assert!(store.delete_index("misp-galaxy_new").await.is_ok());
}

#[tokio::test]
async fn test_failed_swap_task_is_reported() {
    let mut server = Server::new_async().await;
    let swap = server
        .mock("POST", "/swap-indexes")
        .match_body(Matcher::Json(json!([
            {"indexes": ["misp-galaxy", "misp-galaxy_new"]},
            {"indexes": ["misp-objects", "misp-objects_new"]}
        ])))
        .with_status(202)
        .with_body(enqueued(4))
        .create_async()
        .await;
    task(
        &mut server,
        4,
        json!({
            "uid": 4,
            "status": "failed",
            "error": {"code": "index_not_found", "message": "Indexes `misp-objects_new` not found."}
        }),
    )
    .await;

    let store = store_for(&server, 5);
    let pairs = vec![
        ("misp-galaxy".to_string(), "misp-galaxy_new".to_string()),
        ("misp-objects".to_string(), "misp-objects_new".to_string()),
    ];
    let err = store.swap(&pairs).await.unwrap_err();

    swap.assert_async().await;
    assert!(matches!(
        err,
        StoreError::TaskFailed { task_uid: 4, ref code, .. } if code == "index_not_found"
    ));
}

#[tokio::test]
async fn test_task_timeout() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/indexes/misp-objects/documents")
        .with_status(202)
        .with_body(enqueued(5))
        .create_async()
        .await;
    task(&mut server, 5, json!({"uid": 5, "status": "processing"})).await;

    let store = store_for(&server, 0);
    let record = Record::new().with("uuid", "obj-1");
    let err = store.upsert("misp-objects", &[record]).await.unwrap_err();
    assert!(matches!(err, StoreError::TaskTimeout(5)));
}

#[tokio::test]
async fn test_search_body_and_search_key() {
    let mut server = Server::new_async().await;
    let search = server
        .mock("POST", "/indexes/misp-galaxy/search")
        .match_header("authorization", "Bearer search-key")
        .match_body(Matcher::PartialJson(json!({
            "q": "apt",
            "limit": 5,
            "offset": 10,
            "filter": "galaxy = 'threat-actor'",
            "attributesToHighlight": ["*"],
            "highlightPreTag": "<mark>",
            "highlightPostTag": "</mark>"
        })))
        .with_status(200)
        .with_body(json!({"hits": [{"uuid": "a"}], "estimatedTotalHits": 1}).to_string())
        .create_async()
        .await;

    let store = store_for(&server, 5);
    let options = SearchOptions {
        limit: 5,
        offset: 10,
        filter: Some(FilterExpr::equals("galaxy", "threat-actor")),
        highlight: Some(Highlight::all_attributes()),
        facets: Vec::new(),
    };
    let result = store.search("misp-galaxy", "apt", &options).await.unwrap();

    search.assert_async().await;
    assert_eq!(result.hits().len(), 1);
    assert_eq!(result.0["estimatedTotalHits"], 1);
}

#[tokio::test]
async fn test_search_missing_index() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/indexes/nope/search")
        .with_status(404)
        .with_body(
            json!({
                "message": "Index `nope` not found.",
                "code": "index_not_found",
                "type": "invalid_request",
                "link": "https://docs.meilisearch.com/errors#index_not_found"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let store = store_for(&server, 5);
    let err = store
        .search("nope", "", &SearchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::IndexNotFound(ref index) if index == "nope"));
}

#[tokio::test]
async fn test_federated_search_body() {
    let mut server = Server::new_async().await;
    let multi = server
        .mock("POST", "/multi-search")
        .match_body(Matcher::PartialJson(json!({
            "federation": {
                "limit": 10,
                "offset": 0,
                "facetsByIndex": {"misp-galaxy": ["galaxy"]}
            },
            "queries": [
                {"indexUid": "misp-galaxy", "q": "apt", "filter": "galaxy = 'tool'"},
                {"indexUid": "misp-objects", "q": "apt"}
            ]
        })))
        .with_status(200)
        .with_body(json!({"hits": []}).to_string())
        .create_async()
        .await;

    let store = store_for(&server, 5);
    let queries = vec![
        IndexQuery::new("misp-galaxy", "apt")
            .with_filter(Some(FilterExpr::equals("galaxy", "tool")))
            .with_facets(vec!["galaxy".to_string()]),
        IndexQuery::new("misp-objects", "apt"),
    ];
    let options = FederationOptions {
        limit: 10,
        offset: 0,
        highlight: None,
    };
    let result = store.multi_search(&queries, &options).await.unwrap();

    multi.assert_async().await;
    assert!(result.hits().is_empty());
}

#[tokio::test]
async fn test_list_indexes_follows_pages() {
    let mut server = Server::new_async().await;
    let first: Vec<_> = (0..100).map(|i| json!({"uid": format!("idx-{:03}", i)})).collect();
    let page_one = server
        .mock("GET", "/indexes")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("offset".into(), "0".into()),
            Matcher::UrlEncoded("limit".into(), "100".into()),
        ]))
        .with_status(200)
        .with_body(json!({"results": first, "offset": 0, "limit": 100, "total": 101}).to_string())
        .create_async()
        .await;
    let page_two = server
        .mock("GET", "/indexes")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("offset".into(), "100".into()),
            Matcher::UrlEncoded("limit".into(), "100".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({"results": [{"uid": "misp-taxonomies"}], "offset": 100, "limit": 100, "total": 101})
                .to_string(),
        )
        .create_async()
        .await;

    let store = store_for(&server, 5);
    let names = store.list_indexes().await.unwrap();

    page_one.assert_async().await;
    page_two.assert_async().await;
    assert_eq!(names.len(), 101);
    assert_eq!(names.last().map(String::as_str), Some("misp-taxonomies"));
}

#[tokio::test]
async fn test_document_count() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/indexes/misp-objects/stats")
        .with_status(200)
        .with_body(json!({"numberOfDocuments": 342, "isIndexing": false}).to_string())
        .create_async()
        .await;

    let store = store_for(&server, 5);
    assert_eq!(store.document_count("misp-objects").await.unwrap(), 342);
}

#[tokio::test]
async fn test_unreachable_store() {
    let config = MeilisearchConfig {
        url: "http://127.0.0.1:1".to_string(),
        timeout_secs: 2,
        ..Default::default()
    };
    let store = MeilisearchStore::new(&config).unwrap();
    assert!(matches!(store.health().await, Err(StoreError::Unavailable(_))));
}
