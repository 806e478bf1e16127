pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::search::SearchService;
use crate::state::ItemStore;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub store: Arc<dyn ItemStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(search: Arc<SearchService>, store: Arc<dyn ItemStore>) -> Self {
        Self {
            search,
            store,
            started_at: Instant::now(),
        }
    }
}
