use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

/// A bibliographic record held in the primary store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Item {
    /// Unique OAI identifier
    #[validate(length(min = 1, max = 255))]
    pub identifier: String,

    /// Last modification datestamp
    pub datestamp: DateTime<Utc>,

    /// Deleted-record marker
    #[serde(default)]
    pub deleted: bool,

    /// Identifiers of the sets this item belongs to
    #[serde(default)]
    pub sets: BTreeSet<String>,

    /// Identifiers of the metadata formats this item is disseminated in
    #[serde(default)]
    pub formats: BTreeSet<String>,
}

impl Item {
    /// Create an item with no set or format membership
    pub fn new(identifier: impl Into<String>, datestamp: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            datestamp,
            deleted: false,
            sets: BTreeSet::new(),
            formats: BTreeSet::new(),
        }
    }

    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.sets.insert(set.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.formats.insert(format.into());
        self
    }

    /// Flag the item as deleted and bump its datestamp
    pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted = true;
        self.datestamp = at;
    }

    pub fn in_set(&self, set: &str) -> bool {
        self.sets.contains(set)
    }

    pub fn has_format(&self, format: &str) -> bool {
        self.formats.contains(format)
    }
}
