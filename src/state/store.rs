use crate::error::{AppError, Result};
use crate::models::Item;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Forward-only keyset cursor over the primary store.
///
/// Records are visited in ascending identifier order; the cursor remembers the
/// last identifier handed out so a batch never repeats a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCursor {
    last_identifier: Option<String>,
    exhausted: bool,
}

impl ItemCursor {
    pub fn last_identifier(&self) -> Option<&str> {
        self.last_identifier.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Record the outcome of a fetched batch
    pub fn advance(&mut self, batch: &[Item], requested: usize) {
        if let Some(last) = batch.last() {
            self.last_identifier = Some(last.identifier.clone());
        }
        if batch.len() < requested {
            self.exhausted = true;
        }
    }
}

/// Trait for primary-store item operations
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert or replace an item
    async fn save_item(&self, item: &Item) -> Result<()>;

    /// Get an item by identifier
    async fn get_item(&self, identifier: &str) -> Result<Option<Item>>;

    /// Delete an item
    async fn delete_item(&self, identifier: &str) -> Result<()>;

    /// Number of stored items
    async fn count(&self) -> Result<u64>;

    /// Open a cursor positioned before the first record
    fn scan(&self) -> ItemCursor {
        ItemCursor::default()
    }

    /// Fetch up to `n` records following the cursor position and advance it
    async fn fetch_batch(&self, cursor: &mut ItemCursor, n: usize) -> Result<Vec<Item>>;
}

/// In-memory item store (for development and testing)
#[derive(Clone, Default)]
pub struct InMemoryItemStore {
    items: Arc<RwLock<BTreeMap<String, Item>>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn save_item(&self, item: &Item) -> Result<()> {
        self.items
            .write()
            .insert(item.identifier.clone(), item.clone());
        tracing::debug!(identifier = %item.identifier, "Item saved");
        Ok(())
    }

    async fn get_item(&self, identifier: &str) -> Result<Option<Item>> {
        Ok(self.items.read().get(identifier).cloned())
    }

    async fn delete_item(&self, identifier: &str) -> Result<()> {
        match self.items.write().remove(identifier) {
            Some(_) => {
                tracing::debug!(identifier = %identifier, "Item deleted");
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Item {} not found", identifier))),
        }
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.items.read().len() as u64)
    }

    async fn fetch_batch(&self, cursor: &mut ItemCursor, n: usize) -> Result<Vec<Item>> {
        if cursor.is_exhausted() || n == 0 {
            return Ok(Vec::new());
        }

        let batch: Vec<Item> = {
            let items = self.items.read();
            let lower = match cursor.last_identifier() {
                Some(last) => Bound::Excluded(last.to_string()),
                None => Bound::Unbounded,
            };
            items
                .range((lower, Bound::Unbounded))
                .take(n)
                .map(|(_, item)| item.clone())
                .collect()
        };

        cursor.advance(&batch, n);
        Ok(batch)
    }
}
