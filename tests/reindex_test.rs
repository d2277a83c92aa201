//! Reindex coordinator behaviour against the in-memory store

mod common;

use common::*;
use misp_global_search::models::Collection;
use misp_global_search::reindex::{CyclePhase, ReindexError, ReindexMode};
use misp_global_search::source::LocalTree;
use misp_global_search::store::{IndexStore, MemoryStore};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn fixture(extra_tools: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    seed_tree(dir.path(), extra_tools);
    dir
}

async fn shadow_indexes(store: &MemoryStore) -> Vec<String> {
    store
        .list_indexes()
        .await
        .unwrap()
        .into_iter()
        .filter(|name| name.ends_with("_new"))
        .collect()
}

#[tokio::test]
async fn test_bootstrap_writes_production_directly() {
    let dir = fixture(0);
    let store = MemoryStore::new();
    let coordinator = coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())));

    let report = coordinator.bootstrap().await.unwrap();

    assert_eq!(report.mode, ReindexMode::Direct);
    assert!(!report.swap_confirmed);
    assert_eq!(production_counts(&store), [2, 2, 7]);
    assert!(shadow_indexes(&store).await.is_empty());
    assert_eq!(store.filterable_attributes(GALAXY_INDEX), vec!["galaxy"]);
    assert_eq!(
        store.filterable_attributes(TAXONOMIES_INDEX),
        vec!["version", "namespace", "predicate"]
    );
}

#[tokio::test]
async fn test_cycle_on_empty_store() {
    let dir = fixture(0);
    let store = MemoryStore::new();
    let coordinator = coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())));

    let report = coordinator.run_cycle().await.unwrap();

    assert_eq!(report.mode, ReindexMode::BlueGreen);
    assert!(report.swap_confirmed);
    assert_eq!(report.records_written(), 11);
    assert_eq!(report.retired.len(), 3);
    assert_eq!(production_counts(&store), [2, 2, 7]);
    assert!(shadow_indexes(&store).await.is_empty());
    assert_eq!(store.swap_count(), 1);
}

#[tokio::test]
async fn test_cycle_reports_file_outcomes() {
    let dir = fixture(0);
    std::fs::create_dir_all(dir.path().join("broken")).unwrap();
    std::fs::write(dir.path().join("broken/machinetag.json"), "{ not json").unwrap();

    let store = MemoryStore::new();
    let coordinator = coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())));
    let report = coordinator.run_cycle().await.unwrap();

    let galaxy = report.collection(Collection::GalaxyClusters).unwrap();
    assert_eq!(galaxy.summary.files, 2);
    assert_eq!(galaxy.summary.skipped_files, 1);
    assert_eq!(galaxy.records_written, 2);

    let taxonomies = report.collection(Collection::Taxonomies).unwrap();
    assert_eq!(taxonomies.summary.failed_files, 1);
    assert_eq!(taxonomies.records_written, 7);
    assert_eq!(report.failed_files(), 1);
}

#[tokio::test]
async fn test_invalid_document_id_fails_only_its_file() {
    let dir = fixture(0);
    write_json(
        dir.path(),
        "galaxies/bad.json",
        &json!({"name": "Bad", "namespace": "misp", "type": "bad"}),
    );
    write_json(
        dir.path(),
        "clusters/bad.json",
        &json!({"name": "Bad", "values": [{"value": "Spaced", "uuid": "bad id"}]}),
    );

    let store = MemoryStore::new();
    let coordinator = coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())));
    let report = coordinator.run_cycle().await.unwrap();

    assert!(report.swap_confirmed);
    let galaxy = report.collection(Collection::GalaxyClusters).unwrap();
    assert_eq!(galaxy.summary.failed_files, 1);
    assert_eq!(galaxy.records_written, 2);
    assert_eq!(production_counts(&store), [2, 2, 7]);
}

#[tokio::test]
async fn test_readers_never_see_a_partial_generation() {
    let dir = fixture(0);
    let memory = MemoryStore::new();
    coordinator(Arc::new(memory.clone()), Arc::new(LocalTree::new(dir.path())))
        .bootstrap()
        .await
        .unwrap();
    let before = production_counts(&memory);

    seed_tree(dir.path(), 3);
    let observing = Arc::new(ObservingStore::new(memory.clone()));
    coordinator(observing.clone(), Arc::new(LocalTree::new(dir.path())))
        .run_cycle()
        .await
        .unwrap();
    let after = production_counts(&memory);

    assert_eq!(before, [2, 2, 7]);
    assert_eq!(after, [5, 2, 7]);

    let observed = observing.observed();
    assert!(!observed.is_empty());
    for counts in observed {
        assert!(
            counts == before || counts == after,
            "reader saw {:?}, expected {:?} or {:?}",
            counts,
            before,
            after
        );
    }
}

#[tokio::test]
async fn test_swap_failure_leaves_everything_in_place() {
    let dir = fixture(0);
    let store = MemoryStore::new();
    let coordinator = coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())));
    coordinator.bootstrap().await.unwrap();

    seed_tree(dir.path(), 5);
    store.fail_next_swap();
    let err = coordinator.run_cycle().await.unwrap_err();

    assert!(matches!(err, ReindexError::Swap(_)));
    assert_eq!(production_counts(&store), [2, 2, 7]);
    // Nothing deleted: the fully built staging indexes are still there
    assert_eq!(shadow_indexes(&store).await.len(), 3);
    assert_eq!(store.documents("misp-galaxy_new").len(), 7);
    assert_eq!(coordinator.phase(Collection::GalaxyClusters), CyclePhase::Idle);
}

#[tokio::test]
async fn test_collection_failure_aborts_before_swap() {
    let dir = fixture(0);
    let store = MemoryStore::new();
    coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())))
        .bootstrap()
        .await
        .unwrap();

    seed_tree(dir.path(), 2);
    let fetcher = FailingFetcher {
        inner: LocalTree::new(dir.path()),
        failing: Collection::Objects,
    };
    let err = coordinator(Arc::new(store.clone()), Arc::new(fetcher))
        .run_cycle()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReindexError::Fetch {
            collection: Collection::Objects,
            ..
        }
    ));
    assert_eq!(production_counts(&store), [2, 2, 7]);
    assert!(shadow_indexes(&store).await.is_empty());
    assert_eq!(store.swap_count(), 0);
}

#[tokio::test]
async fn test_repeated_cycles_are_idempotent() {
    let dir = fixture(1);
    let store = MemoryStore::new();
    let coordinator = coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())));

    coordinator.run_cycle().await.unwrap();
    let first: Vec<_> = [GALAXY_INDEX, OBJECTS_INDEX, TAXONOMIES_INDEX]
        .iter()
        .map(|name| store.documents(name))
        .collect();

    coordinator.run_cycle().await.unwrap();
    let second: Vec<_> = [GALAXY_INDEX, OBJECTS_INDEX, TAXONOMIES_INDEX]
        .iter()
        .map(|name| store.documents(name))
        .collect();

    assert_eq!(first, second);
    assert_eq!(production_counts(&store), [3, 2, 7]);
}

#[tokio::test]
async fn test_stale_staging_index_is_replaced() {
    let dir = fixture(0);
    let store = MemoryStore::new();
    store.create_index("misp-objects_new", "uuid").await.unwrap();
    store
        .upsert(
            "misp-objects_new",
            &[misp_global_search::models::Record::from_value(
                serde_json::json!({"uuid": "leftover"}),
            )
            .unwrap()],
        )
        .await
        .unwrap();

    let coordinator = coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())));
    coordinator.run_cycle().await.unwrap();

    assert_eq!(store.documents(OBJECTS_INDEX).len(), 2);
    assert!(store
        .documents(OBJECTS_INDEX)
        .iter()
        .all(|r| r.get_str("uuid") != Some("leftover")));
}

#[tokio::test]
async fn test_clean_deletes_every_index() {
    let dir = fixture(0);
    let store = MemoryStore::new();
    let coordinator = coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())));
    coordinator.bootstrap().await.unwrap();
    store.create_index("unrelated", "id").await.unwrap();

    let deleted = coordinator.clean().await.unwrap();

    assert_eq!(deleted.len(), 4);
    assert!(store.list_indexes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_phases_return_to_idle() {
    let dir = fixture(0);
    let store = MemoryStore::new();
    let coordinator = coordinator(Arc::new(store.clone()), Arc::new(LocalTree::new(dir.path())));
    coordinator.run_cycle().await.unwrap();

    for (_, phase) in coordinator.phases() {
        assert_eq!(phase, CyclePhase::Idle);
    }
}
