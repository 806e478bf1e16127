//! Public search contract used by item lifecycle code and the HTTP surface

use crate::models::Item;
use crate::search::backend::IndexBackend;
use crate::search::config::{ReindexConfig, SearchConfig};
use crate::search::cursor::{CursorPaginator, StoreCursorResolver};
use crate::search::document::ItemDocument;
use crate::search::error::{SearchError, SearchResult};
use crate::search::mapping::MappingSource;
use crate::search::query::{SearchRequest, SearchResponse};
use crate::search::reindex::naming::{latest_version, next_index_name};
use crate::search::reindex::{ReindexCoordinator, ReindexJob};
use crate::state::ItemStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Main search service
pub struct SearchService {
    backend: Arc<dyn IndexBackend>,
    mappings: Arc<dyn MappingSource>,
    paginator: CursorPaginator,
    coordinator: ReindexCoordinator,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(
        backend: Arc<dyn IndexBackend>,
        store: Arc<dyn ItemStore>,
        mappings: Arc<dyn MappingSource>,
        config: SearchConfig,
        reindex: ReindexConfig,
    ) -> Self {
        let resolver = Arc::new(StoreCursorResolver::new(store.clone()));
        let paginator = CursorPaginator::new(backend.clone(), resolver);
        let coordinator = ReindexCoordinator::new(
            backend.clone(),
            store,
            mappings.clone(),
            config.alias.clone(),
            reindex,
        );

        Self {
            backend,
            mappings,
            paginator,
            coordinator,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Make sure the alias serves an index.
    ///
    /// With no versioned index at all, version 1 is created empty. An existing
    /// version with no alias on it gets the alias, or is pinned as the serving
    /// index when the engine has no aliases. Calling this again is a no-op.
    pub async fn initialize(&self) -> SearchResult<()> {
        let alias = &self.config.alias;
        if let Some(index) = self.coordinator.active_index().await? {
            debug!(alias = %alias, index = %index, "Alias already serves an index");
            return Ok(());
        }

        let existing = self.backend.list_indices(alias).await?;
        let index = match latest_version(alias, &existing) {
            Some((_, name)) => name,
            None => {
                let kind = self.backend.kind();
                let mapping = self.mappings.load(kind).ok_or_else(|| {
                    SearchError::SchemaError(format!("no mapping resource for {} backend", kind))
                })?;
                let (_, name) = next_index_name(alias, &existing, 0);
                if !self.backend.create_index(&name, &mapping).await? {
                    return Err(SearchError::SchemaError(format!(
                        "backend rejected mapping for {}",
                        name
                    )));
                }
                name
            }
        };

        match self.backend.swap_alias(alias, None, &index).await {
            Ok(()) => {}
            Err(SearchError::Unsupported { .. }) => self.coordinator.pin_serving_index(&index),
            Err(e) => return Err(e),
        }
        info!(alias = %alias, index = %index, "Search index initialized");
        Ok(())
    }

    async fn serving_index(&self) -> SearchResult<String> {
        self.coordinator.active_index().await?.ok_or_else(|| {
            SearchError::NotFound(format!("no index behind alias {}", self.config.alias))
        })
    }

    /// Index or re-index one item in the serving index
    pub async fn upsert_document(&self, item: &Item) -> SearchResult<()> {
        let index = self.serving_index().await?;
        let doc = ItemDocument::from(item);
        self.backend.upsert(&index, &item.identifier, &doc).await?;
        debug!(index = %index, identifier = %item.identifier, deleted = item.deleted, "Item indexed");
        Ok(())
    }

    /// Remove one item from the serving index; `NotFound` if it was not indexed
    pub async fn delete_document(&self, item: &Item) -> SearchResult<()> {
        let index = self.serving_index().await?;
        self.backend.delete(&index, &item.identifier).await?;
        debug!(index = %index, identifier = %item.identifier, "Item removed from index");
        Ok(())
    }

    /// One page of identifiers in `(datestamp, identifier)` order
    pub async fn search(&self, request: &SearchRequest) -> SearchResult<SearchResponse> {
        if request.rows == 0 || request.rows > self.config.max_rows {
            return Err(SearchError::InvalidRequest(format!(
                "rows must be between 1 and {}",
                self.config.max_rows
            )));
        }
        if request.format.trim().is_empty() {
            return Err(SearchError::InvalidRequest(
                "format is required".to_string(),
            ));
        }
        if let (Some(from), Some(until)) = (request.from_date, request.until_date) {
            if from > until {
                return Err(SearchError::InvalidRequest(format!(
                    "from date {} is after until date {}",
                    from, until
                )));
            }
        }

        let index = self.serving_index().await?;
        let page = self
            .paginator
            .page(
                &index,
                &request.filter(),
                request.rows,
                request.cursor_token.as_deref(),
            )
            .await?;

        Ok(SearchResponse {
            size: page.ids.len(),
            data: page.ids,
            total: page.total,
            last_item_id: page.next_token,
        })
    }

    /// Start a background rebuild; `false` while one is running
    pub fn reindex_all(&self) -> bool {
        self.coordinator.start()
    }

    /// Cancel the running rebuild
    pub async fn stop_reindex_all(&self, attempts: u32, delay_ms: u64) -> bool {
        self.coordinator
            .stop(attempts, Duration::from_millis(delay_ms))
            .await
    }

    pub fn reindex_status(&self) -> String {
        self.coordinator.status()
    }

    pub fn reindex_snapshot(&self) -> Option<ReindexJob> {
        self.coordinator.snapshot()
    }

    /// Wait for the running rebuild, if any, and return its final record
    pub async fn wait_for_reindex(&self) -> Option<ReindexJob> {
        self.coordinator.wait().await
    }

    pub fn reindex_config(&self) -> &ReindexConfig {
        self.coordinator.config()
    }
}
