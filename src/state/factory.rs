use crate::config::{StoreBackend, StoreConfig};
use crate::error::{AppError, Result};
use crate::state::{InMemoryItemStore, ItemStore, SledItemStore};
use std::sync::Arc;

/// Create an item store based on configuration
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ItemStore>> {
    match config.backend {
        StoreBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing Sled storage backend");

            let store = SledItemStore::new(path)?;
            Ok(Arc::new(store))
        }

        StoreBackend::Memory => Ok(create_in_memory_store()),
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> Arc<dyn ItemStore> {
    tracing::info!("Initializing in-memory storage backend");
    Arc::new(InMemoryItemStore::new())
}
