//! Common test utilities for search and reindex tests
//!
//! Provides seeded stores, a ready-made service over the in-memory backend,
//! and a backend wrapper that injects failures and latency.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use oai_index_sync::models::Item;
use oai_index_sync::search::*;
use oai_index_sync::state::{InMemoryItemStore, ItemStore};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub const ALIAS: &str = "items";

/// Store holding `n` items with distinct identifiers and datestamps
pub async fn seeded_store(n: usize) -> Arc<InMemoryItemStore> {
    let store = Arc::new(InMemoryItemStore::new());
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for i in 0..n {
        let item = Item::new(format!("oai:repo:{:06}", i), base + Duration::seconds(i as i64))
            .with_set("all")
            .with_format("oai_dc");
        store.save_item(&item).await.unwrap();
    }
    store
}

pub fn memory_config() -> SearchConfig {
    SearchConfigBuilder::new()
        .backend(BackendKind::Memory)
        .alias(ALIAS)
        .build()
}

pub fn reindex_config(batch_size: usize) -> ReindexConfig {
    ReindexConfig {
        batch_size,
        ..ReindexConfig::default()
    }
}

pub fn service_with(
    backend: Arc<dyn IndexBackend>,
    store: Arc<InMemoryItemStore>,
    mappings: Arc<dyn MappingSource>,
    batch_size: usize,
) -> SearchService {
    SearchService::new(
        backend,
        store,
        mappings,
        memory_config(),
        reindex_config(batch_size),
    )
}

/// In-memory backend with switchable faults
#[derive(Clone, Default)]
pub struct FaultyBackend {
    inner: InMemoryBackend,
    fail_upserts_after: Arc<AtomicU64>,
    upserts: Arc<AtomicU64>,
    fail_swap: Arc<AtomicBool>,
    no_aliases: Arc<AtomicBool>,
    upsert_delay_ms: Arc<AtomicU64>,
}

impl FaultyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    /// Fail every upsert after `n` more succeed; 0 turns the fault off
    pub fn fail_upserts_after(&self, n: u64) {
        self.upserts.store(0, Ordering::SeqCst);
        self.fail_upserts_after.store(n, Ordering::SeqCst);
    }

    pub fn fail_swap(&self, fail: bool) {
        self.fail_swap.store(fail, Ordering::SeqCst);
    }

    /// Report alias operations as unsupported, like a Solr engine
    pub fn without_aliases(&self) {
        self.no_aliases.store(true, Ordering::SeqCst);
    }

    fn check_aliases(&self, operation: &'static str) -> SearchResult<()> {
        if self.no_aliases.load(Ordering::SeqCst) {
            return Err(SearchError::Unsupported {
                backend: "faulty",
                operation,
            });
        }
        Ok(())
    }

    /// Sleep before every upsert
    pub fn slow_upserts(&self, delay_ms: u64) {
        self.upsert_delay_ms.store(delay_ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl IndexBackend for FaultyBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn create_index(&self, name: &str, mapping: &str) -> SearchResult<bool> {
        self.inner.create_index(name, mapping).await
    }

    async fn drop_index(&self, name: &str) -> SearchResult<()> {
        self.inner.drop_index(name).await
    }

    async fn refresh(&self, name: &str) -> SearchResult<()> {
        self.inner.refresh(name).await
    }

    async fn upsert(&self, index: &str, doc_id: &str, doc: &ItemDocument) -> SearchResult<()> {
        let delay = self.upsert_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        let limit = self.fail_upserts_after.load(Ordering::SeqCst);
        let done = self.upserts.fetch_add(1, Ordering::SeqCst);
        if limit > 0 && done >= limit {
            return Err(SearchError::Transport("injected upsert failure".to_string()));
        }
        self.inner.upsert(index, doc_id, doc).await
    }

    async fn delete(&self, index: &str, doc_id: &str) -> SearchResult<()> {
        self.inner.delete(index, doc_id).await
    }

    async fn query(
        &self,
        index: &str,
        filter: &QueryFilter,
        page_size: usize,
        after: Option<&SortKey>,
    ) -> SearchResult<QueryPage> {
        self.inner.query(index, filter, page_size, after).await
    }

    async fn count(&self, index: &str) -> SearchResult<u64> {
        self.inner.count(index).await
    }

    async fn list_indices(&self, prefix: &str) -> SearchResult<Vec<String>> {
        self.inner.list_indices(prefix).await
    }

    async fn resolve_alias(&self, alias: &str) -> SearchResult<Option<String>> {
        self.check_aliases("resolve_alias")?;
        self.inner.resolve_alias(alias).await
    }

    async fn swap_alias(&self, alias: &str, from: Option<&str>, to: &str) -> SearchResult<()> {
        self.check_aliases("swap_alias")?;
        if self.fail_swap.load(Ordering::SeqCst) {
            return Err(SearchError::Transport("injected alias failure".to_string()));
        }
        self.inner.swap_alias(alias, from, to).await
    }
}

/// Yield until the running job has copied at least one batch
pub async fn wait_for_progress(service: &SearchService) -> ReindexJob {
    for _ in 0..10_000 {
        if let Some(job) = service.reindex_snapshot() {
            if job.indexed_count > 0 || !job.is_active() {
                return job;
            }
        }
        tokio::task::yield_now().await;
    }
    panic!("reindex made no progress");
}

/// Yield until the running job has created its new index
pub async fn wait_for_new_index(service: &SearchService) -> ReindexJob {
    for _ in 0..1_000 {
        if let Some(job) = service.reindex_snapshot() {
            if job.new_index.is_some() || !job.is_active() {
                return job;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("reindex never created its index");
}
