//! End-to-end tests for full index rebuilds

mod common;

use common::*;
use oai_index_sync::models::Item;
use oai_index_sync::search::*;
use oai_index_sync::state::ItemStore;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = seeded_store(2_000).await;
    let service = service_with(backend.clone(), store, Arc::new(BuiltinMappings), 10);
    service.initialize().await.unwrap();

    assert!(service.reindex_all());
    let first = service.reindex_snapshot().unwrap();
    assert!(!service.reindex_all());

    let job = service.wait_for_reindex().await.unwrap();
    assert_eq!(job.id, first.id);
    assert_eq!(job.state, ReindexState::Completed);
    assert_eq!(job.indexed_count, 2_000);
    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items2".to_string()]
    );

    // Once the job has ended a new one is accepted.
    assert!(service.reindex_all());
    service.wait_for_reindex().await.unwrap();
}

#[tokio::test]
async fn test_cancellation_leaves_no_trace() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = seeded_store(10_000).await;
    let service = service_with(backend.clone(), store, Arc::new(BuiltinMappings), 100);
    service.initialize().await.unwrap();

    let base = chrono::Utc::now();
    for i in 0..3 {
        let item = Item::new(format!("oai:live:{}", i), base).with_format("oai_dc");
        service.upsert_document(&item).await.unwrap();
    }

    assert!(service.reindex_all());
    let progress = wait_for_progress(&service).await;
    assert!(progress.is_active());
    assert!(progress.indexed_count < progress.total_count);

    assert!(service.stop_reindex_all(5, 10).await);

    let job = service.reindex_snapshot().unwrap();
    assert_eq!(job.state, ReindexState::Cancelled);
    assert!(job.stop_requested);
    assert!(job.ended_at.is_some());
    assert!(job.indexed_count < 10_000);

    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items1".to_string()]
    );
    assert_eq!(backend.count("items1").await.unwrap(), 3);
    assert_eq!(
        backend.resolve_alias(ALIAS).await.unwrap().as_deref(),
        Some("items1")
    );
}

#[tokio::test]
async fn test_forced_cancellation_drops_partial_index() {
    let backend = Arc::new(FaultyBackend::new());
    backend.slow_upserts(20);
    let store = seeded_store(500).await;
    let service = service_with(backend.clone(), store, Arc::new(BuiltinMappings), 100);
    service.initialize().await.unwrap();

    assert!(service.reindex_all());
    let job = wait_for_new_index(&service).await;
    assert_eq!(job.new_index.as_deref(), Some("items2"));

    // A batch takes about two seconds, so only the forced abort can end it in time.
    assert!(service.stop_reindex_all(5, 20).await);

    let job = service.reindex_snapshot().unwrap();
    assert_eq!(job.state, ReindexState::Cancelled);
    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items1".to_string()]
    );
    assert_eq!(
        backend.resolve_alias(ALIAS).await.unwrap().as_deref(),
        Some("items1")
    );
}

#[tokio::test]
async fn test_stop_without_attempts_reports_failure() {
    let backend = Arc::new(FaultyBackend::new());
    backend.slow_upserts(2);
    let store = seeded_store(50).await;
    let service = service_with(backend.clone(), store, Arc::new(BuiltinMappings), 10);
    service.initialize().await.unwrap();

    assert!(service.reindex_all());
    wait_for_new_index(&service).await;

    assert!(!service.stop_reindex_all(0, 0).await);

    // The stop signal stays raised and is honoured at the next batch boundary.
    let job = service.wait_for_reindex().await.unwrap();
    assert_eq!(job.state, ReindexState::Cancelled);
    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items1".to_string()]
    );
}

#[tokio::test]
async fn test_successful_rebuild_swaps_alias() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = seeded_store(5).await;
    let service = service_with(backend.clone(), store, Arc::new(BuiltinMappings), 100);
    service.initialize().await.unwrap();

    assert!(service.reindex_all());
    let job = service.wait_for_reindex().await.unwrap();
    assert_eq!(job.state, ReindexState::Completed);
    assert_eq!(job.original_index.as_deref(), Some("items1"));
    assert_eq!(job.new_index.as_deref(), Some("items2"));

    let response = service
        .search(&SearchRequest::new(10, "oai_dc"))
        .await
        .unwrap();
    let expected: Vec<String> = (0..5).map(|i| format!("oai:repo:{:06}", i)).collect();
    assert_eq!(response.data, expected);
    assert_eq!(response.total, 5);
    assert_eq!(response.last_item_id, None);

    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items2".to_string()]
    );
    assert!(backend.count("items1").await.unwrap_err().is_not_found());

    let report = service.reindex_status();
    assert!(report.contains("Completed"));
    assert!(report.contains("new index: items2"));
    assert!(report.contains("Indexed 5 of 5 documents (100.00%)"));
}

#[tokio::test]
async fn test_empty_store_fails_without_new_index() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = seeded_store(0).await;
    let service = service_with(backend.clone(), store, Arc::new(BuiltinMappings), 100);
    service.initialize().await.unwrap();

    assert!(service.reindex_all());
    let job = service.wait_for_reindex().await.unwrap();

    assert_eq!(job.state, ReindexState::Failed);
    assert!(job.ended_at.is_some());
    assert_eq!(job.new_index, None);
    let failure = job.failure.unwrap();
    assert!(failure.starts_with("Nothing to reindex"));
    assert!(!failure.contains("Primary store error"));
    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items1".to_string()]
    );
}

#[tokio::test]
async fn test_versions_are_never_reused() {
    let backend = Arc::new(FaultyBackend::new());
    let store = seeded_store(30).await;
    let service = service_with(backend.clone(), store, Arc::new(BuiltinMappings), 10);
    service.initialize().await.unwrap();

    assert!(service.reindex_all());
    let job = service.wait_for_reindex().await.unwrap();
    assert_eq!(job.new_index.as_deref(), Some("items2"));

    backend.fail_upserts_after(15);
    assert!(service.reindex_all());
    let failed = service.wait_for_reindex().await.unwrap();
    assert_eq!(failed.state, ReindexState::Failed);
    assert_eq!(failed.new_index.as_deref(), Some("items3"));

    backend.fail_upserts_after(0);
    assert!(service.reindex_all());
    let job = service.wait_for_reindex().await.unwrap();
    assert_eq!(job.state, ReindexState::Completed);
    assert_eq!(job.original_index.as_deref(), Some("items2"));
    assert_eq!(job.new_index.as_deref(), Some("items4"));
    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items4".to_string()]
    );
}

#[tokio::test]
async fn test_backend_failure_rolls_back() {
    let backend = Arc::new(FaultyBackend::new());
    let store = seeded_store(40).await;
    let service = service_with(backend.clone(), store.clone(), Arc::new(BuiltinMappings), 10);
    service.initialize().await.unwrap();

    let live = store.get_item("oai:repo:000001").await.unwrap().unwrap();
    service.upsert_document(&live).await.unwrap();

    backend.fail_upserts_after(25);
    assert!(service.reindex_all());
    let job = service.wait_for_reindex().await.unwrap();

    assert_eq!(job.state, ReindexState::Failed);
    assert!(job.failure.as_deref().unwrap().contains("injected upsert failure"));
    assert_eq!(job.indexed_count, 20);
    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items1".to_string()]
    );
    assert_eq!(backend.count(ALIAS).await.unwrap(), 1);
}

#[tokio::test]
async fn test_alias_failure_rolls_back() {
    let backend = Arc::new(FaultyBackend::new());
    backend.fail_swap(true);
    let store = seeded_store(12).await;
    let service = service_with(backend.clone(), store, Arc::new(BuiltinMappings), 5);
    service.initialize().await.unwrap_err();

    // Bootstrap the alias by hand since swaps are failing.
    backend.fail_swap(false);
    service.initialize().await.unwrap();
    backend.fail_swap(true);

    assert!(service.reindex_all());
    let job = service.wait_for_reindex().await.unwrap();

    assert_eq!(job.state, ReindexState::Failed);
    assert_eq!(job.indexed_count, 12);
    assert_eq!(
        backend.resolve_alias(ALIAS).await.unwrap().as_deref(),
        Some("items1")
    );
    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items1".to_string()]
    );
}

#[tokio::test]
async fn test_rejected_mapping_aborts_before_copy() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("memory.json"), "[]").unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let store = seeded_store(10).await;
    let service = service_with(
        backend.clone(),
        store,
        Arc::new(DirectoryMappings::new(dir.path())),
        10,
    );

    assert!(service.reindex_all());
    let job = service.wait_for_reindex().await.unwrap();

    assert_eq!(job.state, ReindexState::Failed);
    assert_eq!(job.indexed_count, 0);
    assert!(job.failure.unwrap().contains("rejected mapping"));
    assert!(backend.list_indices(ALIAS).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_before_any_job() {
    let backend = Arc::new(InMemoryBackend::new());
    let service = service_with(backend, seeded_store(1).await, Arc::new(BuiltinMappings), 10);

    assert!(service.reindex_status().contains("Idle"));
    assert!(service.reindex_snapshot().is_none());
    assert!(service.stop_reindex_all(3, 1).await);
}

#[tokio::test]
async fn test_stop_never_touches_a_later_job() {
    let backend = Arc::new(FaultyBackend::new());
    backend.slow_upserts(20);
    let store = seeded_store(300).await;
    let service = Arc::new(service_with(
        backend.clone(),
        store,
        Arc::new(BuiltinMappings),
        100,
    ));
    service.initialize().await.unwrap();

    assert!(service.reindex_all());
    let first = wait_for_new_index(&service).await;
    assert_eq!(first.new_index.as_deref(), Some("items2"));

    let stopper = {
        let service = service.clone();
        tokio::spawn(async move { service.stop_reindex_all(3, 200).await })
    };

    // The second attempt aborts the first job; accept a new one while the
    // stop is still sleeping between attempts.
    let mut accepted = false;
    for _ in 0..400 {
        if service.reindex_all() {
            accepted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(accepted);
    backend.slow_upserts(0);
    let second = service.reindex_snapshot().unwrap();
    assert_ne!(second.id, first.id);

    assert!(stopper.await.unwrap());

    let job = service.wait_for_reindex().await.unwrap();
    assert_eq!(job.id, second.id);
    assert_eq!(job.state, ReindexState::Completed);
    assert!(!job.stop_requested);
    assert_eq!(job.new_index.as_deref(), Some("items3"));
    assert_eq!(
        backend.list_indices(ALIAS).await.unwrap(),
        vec!["items3".to_string()]
    );
}

#[tokio::test]
async fn test_engine_without_aliases_serves_initialized_index() {
    let backend = Arc::new(FaultyBackend::new());
    backend.without_aliases();
    let store = seeded_store(5).await;
    let service = service_with(backend.clone(), store.clone(), Arc::new(BuiltinMappings), 10);
    service.initialize().await.unwrap();

    for i in 0..3 {
        let item = store
            .get_item(&format!("oai:repo:{:06}", i))
            .await
            .unwrap()
            .unwrap();
        service.upsert_document(&item).await.unwrap();
    }

    // A higher version abandoned half-built, e.g. by a restart mid-rebuild.
    let mapping = BuiltinMappings.load(BackendKind::Memory).unwrap();
    assert!(backend.create_index("items2", &mapping).await.unwrap());
    let mut cursor = store.scan();
    for item in store.fetch_batch(&mut cursor, 10).await.unwrap() {
        backend
            .upsert("items2", &item.identifier, &ItemDocument::from(&item))
            .await
            .unwrap();
    }

    let response = service
        .search(&SearchRequest::new(10, "oai_dc"))
        .await
        .unwrap();
    assert_eq!(response.total, 3);

    // Without aliases the cutover cannot happen, so the rebuild rolls back.
    assert!(service.reindex_all());
    let job = service.wait_for_reindex().await.unwrap();
    assert_eq!(job.state, ReindexState::Failed);
    assert_eq!(job.original_index.as_deref(), Some("items1"));
    assert_eq!(job.new_index.as_deref(), Some("items3"));
    assert!(job.failure.unwrap().contains("swap_alias"));

    let response = service
        .search(&SearchRequest::new(10, "oai_dc"))
        .await
        .unwrap();
    assert_eq!(response.total, 3);
    assert_eq!(
        backend.inner().list_indices(ALIAS).await.unwrap(),
        vec!["items1".to_string(), "items2".to_string()]
    );
}
