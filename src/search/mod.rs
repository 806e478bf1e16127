//! Search-index synchronization for the item repository
//!
//! The primary store is the source of truth; a search engine holds a
//! denormalized copy of every item used for listing and harvesting. This
//! module keeps that copy in step with item writes, pages through it with
//! resumable cursors, and rebuilds it without downtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                SearchService                     │
//! ├─────────────────────────────────────────────────┤
//! │  - upsert_document()   - delete_document()      │
//! │  - search()            - reindex_all()          │
//! │  - stop_reindex_all()  - reindex_status()       │
//! └─────────────────────────────────────────────────┘
//!            │                          │
//!            ▼                          ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │   CursorPaginator    │   │  ReindexCoordinator  │
//! │  (datestamp, id)     │   │  version, copy,      │
//! │  look-ahead paging   │   │  alias swap, cancel  │
//! └──────────────────────┘   └──────────────────────┘
//!            │                          │
//!            ▼                          ▼
//! ┌─────────────────────────────────────────────────┐
//! │    IndexBackend: Elasticsearch | Solr | Memory   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use oai_index_sync::search::{
//!     create_backend, mapping_source, ReindexConfig, SearchConfig, SearchRequest, SearchService,
//! };
//! use oai_index_sync::state::create_in_memory_store;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SearchConfig::default();
//!     let backend = create_backend(&config)?;
//!     let service = SearchService::new(
//!         backend,
//!         create_in_memory_store(),
//!         mapping_source(&config),
//!         config,
//!         ReindexConfig::default(),
//!     );
//!     service.initialize().await?;
//!
//!     let page = service.search(&SearchRequest::new(100, "oai_dc")).await?;
//!     println!("{} of {} items, next: {:?}", page.size, page.total, page.last_item_id);
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
mod config;
pub mod cursor;
mod document;
mod error;
pub mod mapping;
mod query;
pub mod reindex;
mod service;

pub use backend::{
    create_backend, ElasticsearchBackend, InMemoryBackend, IndexBackend, SolrBackend,
};
pub use config::{BackendKind, ReindexConfig, SearchConfig, SearchConfigBuilder};
pub use cursor::{CursorPaginator, CursorResolver, Page, SortKey, StoreCursorResolver};
pub use document::{ItemDocument, SearchDocument};
pub use error::{SearchError, SearchResult};
pub use mapping::{mapping_source, BuiltinMappings, DirectoryMappings, MappingSource, NoMappings};
pub use query::{max_datestamp, min_datestamp, QueryFilter, QueryPage, SearchRequest, SearchResponse};
pub use reindex::{ReindexCoordinator, ReindexJob, ReindexState};
pub use service::SearchService;
