//! In-process index backend used for development and tests

use super::IndexBackend;
use crate::search::config::BackendKind;
use crate::search::cursor::SortKey;
use crate::search::document::{ItemDocument, SearchDocument};
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::{QueryFilter, QueryPage};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

#[derive(Default)]
struct IndexData {
    docs: BTreeMap<SortKey, ItemDocument>,
    keys: HashMap<String, SortKey>,
}

impl IndexData {
    fn upsert(&mut self, doc: ItemDocument) {
        let key = doc.sort_key();
        if let Some(previous) = self.keys.insert(doc.document_id(), key.clone()) {
            self.docs.remove(&previous);
        }
        self.docs.insert(key, doc);
    }

    fn remove(&mut self, doc_id: &str) -> bool {
        match self.keys.remove(doc_id) {
            Some(key) => self.docs.remove(&key).is_some(),
            None => false,
        }
    }
}

#[derive(Default)]
struct State {
    indices: HashMap<String, IndexData>,
    aliases: HashMap<String, String>,
}

impl State {
    fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// Alias table and indices share one lock, so an alias swap is observed atomically.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<RwLock<State>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn mapping_is_valid(mapping: &str) -> bool {
        match serde_json::from_str::<serde_json::Value>(mapping) {
            Ok(serde_json::Value::Object(map)) => {
                map.contains_key("mappings") || map.contains_key("fields")
            }
            _ => false,
        }
    }
}

fn matches(doc: &ItemDocument, filter: &QueryFilter) -> bool {
    filter.set.as_deref().map_or(true, |set| doc.in_set(set))
        && filter
            .format
            .as_deref()
            .map_or(true, |format| doc.has_format(format))
        && doc.datestamp >= filter.from
        && doc.datestamp <= filter.until
}

#[async_trait]
impl IndexBackend for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn create_index(&self, name: &str, mapping: &str) -> SearchResult<bool> {
        if !Self::mapping_is_valid(mapping) {
            tracing::warn!(index = %name, "Rejected index mapping");
            return Ok(false);
        }

        let mut state = self.state.write();
        state.indices.entry(name.to_string()).or_default();
        tracing::debug!(index = %name, "Index created");
        Ok(true)
    }

    async fn drop_index(&self, name: &str) -> SearchResult<()> {
        let mut state = self.state.write();
        if state.indices.remove(name).is_none() {
            return Err(SearchError::NotFound(format!("index {}", name)));
        }
        state.aliases.retain(|_, target| target != name);
        tracing::debug!(index = %name, "Index dropped");
        Ok(())
    }

    async fn refresh(&self, name: &str) -> SearchResult<()> {
        let state = self.state.read();
        if state.indices.contains_key(state.resolve(name)) {
            Ok(())
        } else {
            Err(SearchError::NotFound(format!("index {}", name)))
        }
    }

    async fn upsert(&self, index: &str, doc_id: &str, doc: &ItemDocument) -> SearchResult<()> {
        if doc_id != doc.identifier {
            return Err(SearchError::InvalidRequest(format!(
                "document id {} does not match identifier {}",
                doc_id, doc.identifier
            )));
        }

        let mut state = self.state.write();
        let target = state.resolve(index).to_string();
        let data = state
            .indices
            .get_mut(&target)
            .ok_or_else(|| SearchError::NotFound(format!("index {}", index)))?;
        data.upsert(doc.clone());
        Ok(())
    }

    async fn delete(&self, index: &str, doc_id: &str) -> SearchResult<()> {
        let mut state = self.state.write();
        let target = state.resolve(index).to_string();
        let data = state
            .indices
            .get_mut(&target)
            .ok_or_else(|| SearchError::NotFound(format!("index {}", index)))?;

        if data.remove(doc_id) {
            Ok(())
        } else {
            Err(SearchError::NotFound(format!(
                "document {} in {}",
                doc_id, index
            )))
        }
    }

    async fn query(
        &self,
        index: &str,
        filter: &QueryFilter,
        page_size: usize,
        after: Option<&SortKey>,
    ) -> SearchResult<QueryPage> {
        let state = self.state.read();
        let data = state
            .indices
            .get(state.resolve(index))
            .ok_or_else(|| SearchError::NotFound(format!("index {}", index)))?;

        let total = data.docs.values().filter(|d| matches(d, filter)).count() as u64;

        let lower = match after {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        let hits = data
            .docs
            .range((lower, Bound::Unbounded))
            .filter(|(_, doc)| matches(doc, filter))
            .take(page_size)
            .map(|(key, _)| key.clone())
            .collect();

        Ok(QueryPage { hits, total })
    }

    async fn count(&self, index: &str) -> SearchResult<u64> {
        let state = self.state.read();
        state
            .indices
            .get(state.resolve(index))
            .map(|data| data.docs.len() as u64)
            .ok_or_else(|| SearchError::NotFound(format!("index {}", index)))
    }

    async fn list_indices(&self, prefix: &str) -> SearchResult<Vec<String>> {
        let state = self.state.read();
        let mut names: Vec<String> = state
            .indices
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn resolve_alias(&self, alias: &str) -> SearchResult<Option<String>> {
        Ok(self.state.read().aliases.get(alias).cloned())
    }

    async fn swap_alias(&self, alias: &str, from: Option<&str>, to: &str) -> SearchResult<()> {
        let mut state = self.state.write();

        if !state.indices.contains_key(to) {
            return Err(SearchError::NotFound(format!("index {}", to)));
        }
        if let Some(from) = from {
            if state.aliases.get(alias).map(String::as_str) != Some(from) {
                return Err(SearchError::NotFound(format!(
                    "alias {} on index {}",
                    alias, from
                )));
            }
        }

        state.aliases.insert(alias.to_string(), to.to_string());
        tracing::debug!(alias = %alias, from = ?from, to = %to, "Alias swapped");
        Ok(())
    }
}
