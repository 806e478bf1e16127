//! Search document structures and projection from primary-store items

use crate::models::Item;
use crate::search::cursor::SortKey;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Trait for documents that can be indexed and paginated
pub trait SearchDocument {
    /// Get document ID
    fn document_id(&self) -> String;

    /// Position of the document in the `(datestamp, identifier)` order
    fn sort_key(&self) -> SortKey;
}

/// Denormalized projection of an item, as stored in the search index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDocument {
    /// Item identifier (unique key)
    pub identifier: String,

    /// Primary sort key
    pub datestamp: DateTime<Utc>,

    /// Set membership
    pub sets: Vec<String>,

    /// Format membership
    pub formats: Vec<String>,

    /// Deleted-record flag
    pub deleted: bool,
}

impl From<&Item> for ItemDocument {
    fn from(item: &Item) -> Self {
        Self {
            identifier: item.identifier.clone(),
            datestamp: item.datestamp,
            sets: item.sets.iter().cloned().collect(),
            formats: item.formats.iter().cloned().collect(),
            deleted: item.deleted,
        }
    }
}

impl From<Item> for ItemDocument {
    fn from(item: Item) -> Self {
        Self::from(&item)
    }
}

impl SearchDocument for ItemDocument {
    fn document_id(&self) -> String {
        self.identifier.clone()
    }

    fn sort_key(&self) -> SortKey {
        SortKey::new(self.datestamp, self.identifier.clone())
    }
}

impl ItemDocument {
    pub fn in_set(&self, set: &str) -> bool {
        self.sets.iter().any(|s| s == set)
    }

    pub fn has_format(&self, format: &str) -> bool {
        self.formats.iter().any(|f| f == format)
    }

    /// Body for an Elasticsearch `_doc` request
    pub fn to_elasticsearch_source(&self) -> Value {
        json!({
            "identifier": self.identifier,
            "datestamp": self.datestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "sets": self.sets,
            "formats": self.formats,
            "deleted": self.deleted,
        })
    }

    /// Solr update document (`id` is the uniqueKey)
    pub fn to_solr_doc(&self) -> Value {
        json!({
            "id": self.identifier,
            "identifier": self.identifier,
            "datestamp": self.datestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "sets": self.sets,
            "formats": self.formats,
            "deleted": self.deleted,
        })
    }
}
