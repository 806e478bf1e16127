//! Search-engine adapters behind a single capability set.
//!
//! Every adapter sorts ascending by `(datestamp, identifier)` and treats the
//! `after` key of [`IndexBackend::query`] as a strict lower bound. Adapters never
//! retry; transport failures surface as [`SearchError::Transport`] and the caller
//! owns the retry policy. Capabilities an engine lacks return
//! [`SearchError::Unsupported`] instead of silently succeeding.

mod elasticsearch;
mod memory;
mod solr;

pub use elasticsearch::ElasticsearchBackend;
pub use memory::InMemoryBackend;
pub use solr::SolrBackend;

use crate::search::config::{BackendKind, SearchConfig};
use crate::search::cursor::SortKey;
use crate::search::document::ItemDocument;
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::{QueryFilter, QueryPage};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Which engine this adapter talks to
    fn kind(&self) -> BackendKind;

    /// Create an index with the given mapping.
    ///
    /// An index that already exists counts as success. `Ok(false)` means the
    /// engine rejected the mapping and the index must not be populated.
    async fn create_index(&self, name: &str, mapping: &str) -> SearchResult<bool>;

    /// Drop an index; `NotFound` if it does not exist
    async fn drop_index(&self, name: &str) -> SearchResult<()>;

    /// Make recent writes visible to queries
    async fn refresh(&self, name: &str) -> SearchResult<()>;

    /// Insert or replace a document
    async fn upsert(&self, index: &str, doc_id: &str, doc: &ItemDocument) -> SearchResult<()>;

    /// Remove a document; `NotFound` if it is absent
    async fn delete(&self, index: &str, doc_id: &str) -> SearchResult<()>;

    /// Up to `page_size` matching documents strictly after `after`
    async fn query(
        &self,
        index: &str,
        filter: &QueryFilter,
        page_size: usize,
        after: Option<&SortKey>,
    ) -> SearchResult<QueryPage>;

    /// Number of documents in an index
    async fn count(&self, index: &str) -> SearchResult<u64>;

    /// Names of existing indices starting with `prefix`
    async fn list_indices(&self, prefix: &str) -> SearchResult<Vec<String>>;

    /// Index the alias currently points at, if any
    async fn resolve_alias(&self, alias: &str) -> SearchResult<Option<String>>;

    /// Repoint `alias` from `from` to `to` in one atomic action
    async fn swap_alias(&self, alias: &str, from: Option<&str>, to: &str) -> SearchResult<()>;
}

/// Build the adapter selected by configuration
pub fn create_backend(config: &SearchConfig) -> SearchResult<Arc<dyn IndexBackend>> {
    match config.backend {
        BackendKind::Elasticsearch => {
            tracing::info!(url = %config.url, "Initializing Elasticsearch backend");
            Ok(Arc::new(ElasticsearchBackend::new(
                &config.url,
                config.request_timeout_secs,
            )?))
        }
        BackendKind::Solr => {
            tracing::info!(url = %config.url, "Initializing Solr backend");
            Ok(Arc::new(SolrBackend::new(
                &config.url,
                config.request_timeout_secs,
            )?))
        }
        BackendKind::Memory => {
            tracing::info!("Initializing in-memory search backend");
            Ok(Arc::new(InMemoryBackend::new()))
        }
    }
}

/// Drop an index, treating "already gone" as success
pub async fn drop_index_if_exists(backend: &dyn IndexBackend, name: &str) -> SearchResult<()> {
    match backend.drop_index(name).await {
        Err(SearchError::NotFound(_)) => Ok(()),
        other => other,
    }
}
