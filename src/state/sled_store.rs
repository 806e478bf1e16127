use crate::error::{AppError, Result};
use crate::models::Item;
use crate::state::{ItemCursor, ItemStore};
use async_trait::async_trait;
use sled::Db;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

/// Persistent item store using Sled embedded database
#[derive(Clone)]
pub struct SledItemStore {
    db: Arc<Db>,
    items_tree: sled::Tree,
}

impl SledItemStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref();
        let db = sled::open(&path)
            .map_err(|e| AppError::Store(format!("Failed to open Sled database: {}", e)))?;

        let items_tree = db
            .open_tree("items")
            .map_err(|e| AppError::Store(format!("Failed to open items tree: {}", e)))?;

        tracing::info!("Initialized Sled item store at {:?}", path_str);

        Ok(Self {
            db: Arc::new(db),
            items_tree,
        })
    }

    fn serialize_item(item: &Item) -> Result<Vec<u8>> {
        bincode::serialize(item)
            .map_err(|e| AppError::Serialization(format!("Failed to serialize item: {}", e)))
    }

    fn deserialize_item(bytes: &[u8]) -> Result<Item> {
        bincode::deserialize(bytes)
            .map_err(|e| AppError::Serialization(format!("Failed to deserialize item: {}", e)))
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| AppError::Store(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    /// Get database size in bytes
    pub fn size_on_disk(&self) -> Result<u64> {
        self.db
            .size_on_disk()
            .map_err(|e| AppError::Store(format!("Failed to get database size: {}", e)))
    }
}

#[async_trait]
impl ItemStore for SledItemStore {
    async fn save_item(&self, item: &Item) -> Result<()> {
        let value = Self::serialize_item(item)?;

        self.items_tree
            .insert(item.identifier.as_bytes(), value)
            .map_err(|e| AppError::Store(format!("Failed to save item: {}", e)))?;

        self.items_tree
            .flush()
            .map_err(|e| AppError::Store(format!("Failed to flush items tree: {}", e)))?;

        tracing::debug!(identifier = %item.identifier, "Item saved to Sled");
        Ok(())
    }

    async fn get_item(&self, identifier: &str) -> Result<Option<Item>> {
        match self.items_tree.get(identifier.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_item(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(AppError::Store(format!("Failed to get item: {}", e))),
        }
    }

    async fn delete_item(&self, identifier: &str) -> Result<()> {
        let removed = self
            .items_tree
            .remove(identifier.as_bytes())
            .map_err(|e| AppError::Store(format!("Failed to delete item: {}", e)))?;

        if removed.is_none() {
            return Err(AppError::NotFound(format!("Item {} not found", identifier)));
        }

        tracing::debug!(identifier = %identifier, "Item deleted from Sled");
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.items_tree.len() as u64)
    }

    async fn fetch_batch(&self, cursor: &mut ItemCursor, n: usize) -> Result<Vec<Item>> {
        if cursor.is_exhausted() || n == 0 {
            return Ok(Vec::new());
        }

        let lower: Bound<Vec<u8>> = match cursor.last_identifier() {
            Some(last) => Bound::Excluded(last.as_bytes().to_vec()),
            None => Bound::Unbounded,
        };

        let mut batch = Vec::with_capacity(n);
        for entry in self
            .items_tree
            .range::<Vec<u8>, _>((lower, Bound::Unbounded))
            .take(n)
        {
            let (_, value) =
                entry.map_err(|e| AppError::Store(format!("Failed to scan items: {}", e)))?;
            batch.push(Self::deserialize_item(&value)?);
        }

        cursor.advance(&batch, n);
        Ok(batch)
    }
}
