//! Deep, stable pagination over the `(datestamp, identifier)` order.
//!
//! A cursor token is the identifier of the last item returned. On the next call
//! the token is resolved against the primary store to recover the item's sort
//! key, and the backend is asked for documents strictly after that key. Because
//! identifiers are unique the order is total, so chained pages never skip or
//! repeat a document as long as existing sort keys are not rewritten.

use crate::search::backend::IndexBackend;
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::QueryFilter;
use crate::state::ItemStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Position in the index order: datestamp first, identifier as tie-break
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub datestamp: DateTime<Utc>,
    pub identifier: String,
}

impl SortKey {
    pub fn new(datestamp: DateTime<Utc>, identifier: impl Into<String>) -> Self {
        Self {
            datestamp,
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.datestamp.to_rfc3339(), self.identifier)
    }
}

/// Maps a cursor token back to the sort key it stands for
#[async_trait]
pub trait CursorResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> SearchResult<Option<SortKey>>;
}

/// Resolves tokens by looking the item up in the primary store
pub struct StoreCursorResolver {
    store: Arc<dyn ItemStore>,
}

impl StoreCursorResolver {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CursorResolver for StoreCursorResolver {
    async fn resolve(&self, token: &str) -> SearchResult<Option<SortKey>> {
        let item = self.store.get_item(token).await?;
        Ok(item.map(|item| SortKey::new(item.datestamp, item.identifier)))
    }
}

/// A page of identifiers plus the token for the next one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub ids: Vec<String>,
    pub total: u64,
    pub next_token: Option<String>,
}

/// Stateless paginator; every call is independent
pub struct CursorPaginator {
    backend: Arc<dyn IndexBackend>,
    resolver: Arc<dyn CursorResolver>,
}

impl CursorPaginator {
    pub fn new(backend: Arc<dyn IndexBackend>, resolver: Arc<dyn CursorResolver>) -> Self {
        Self { backend, resolver }
    }

    /// Fetch `rows` documents following `token`
    pub async fn page(
        &self,
        index: &str,
        filter: &QueryFilter,
        rows: usize,
        token: Option<&str>,
    ) -> SearchResult<Page> {
        if rows == 0 {
            return Err(SearchError::InvalidRequest(
                "rows must be greater than zero".to_string(),
            ));
        }

        let after = match token.filter(|t| !t.is_empty()) {
            None => None,
            Some(token) => match self.resolver.resolve(token).await? {
                Some(key) => Some(key),
                None => return Err(SearchError::InvalidCursor(token.to_string())),
            },
        };

        let page = self
            .backend
            .query(index, filter, rows, after.as_ref())
            .await?;

        // Probe past the last hit so the final page comes back without a dangling token.
        let next_token = match page.last_key() {
            None => None,
            Some(last) => {
                let peek = self.backend.query(index, filter, 1, Some(last)).await?;
                if peek.hits.is_empty() {
                    None
                } else {
                    Some(last.identifier.clone())
                }
            }
        };

        tracing::debug!(
            index = %index,
            rows = rows,
            returned = page.hits.len(),
            total = page.total,
            has_more = next_token.is_some(),
            "Paginated query executed"
        );

        Ok(Page {
            ids: page.ids(),
            total: page.total,
            next_token,
        })
    }
}
