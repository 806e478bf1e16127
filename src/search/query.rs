//! Search request/response types and the backend filter specification

use crate::search::cursor::SortKey;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound used when a request omits `from`
pub fn min_datestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Upper bound used when a request omits `until`
pub fn max_datestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Filter applied by the backend; the date range is always present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Restrict to members of this set
    pub set: Option<String>,

    /// Restrict to items disseminated in this format
    pub format: Option<String>,

    /// Inclusive lower datestamp bound
    pub from: DateTime<Utc>,

    /// Inclusive upper datestamp bound
    pub until: DateTime<Utc>,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            set: None,
            format: None,
            from: min_datestamp(),
            until: max_datestamp(),
        }
    }
}

impl QueryFilter {
    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the date range, falling back to the open bounds for missing ends
    pub fn with_date_range(
        mut self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from.unwrap_or_else(min_datestamp);
        self.until = until.unwrap_or_else(max_datestamp);
        self
    }
}

/// One page of raw backend results in ascending sort order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPage {
    /// Sort keys of the returned documents
    pub hits: Vec<SortKey>,

    /// Number of documents matching the filter, ignoring pagination
    pub total: u64,
}

impl QueryPage {
    pub fn ids(&self) -> Vec<String> {
        self.hits.iter().map(|k| k.identifier.clone()).collect()
    }

    pub fn last_key(&self) -> Option<&SortKey> {
        self.hits.last()
    }
}

/// List/harvest request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Page size
    pub rows: usize,

    /// Optional set filter
    #[serde(default)]
    pub set: Option<String>,

    /// Format filter
    pub format: String,

    /// Optional inclusive lower datestamp bound
    #[serde(default)]
    pub from_date: Option<DateTime<Utc>>,

    /// Optional inclusive upper datestamp bound
    #[serde(default)]
    pub until_date: Option<DateTime<Utc>>,

    /// Identifier of the last item of the previous page
    #[serde(default)]
    pub cursor_token: Option<String>,
}

impl SearchRequest {
    pub fn new(rows: usize, format: impl Into<String>) -> Self {
        Self {
            rows,
            set: None,
            format: format.into(),
            from_date: None,
            until_date: None,
            cursor_token: None,
        }
    }

    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    pub fn with_date_range(
        mut self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.from_date = from;
        self.until_date = until;
        self
    }

    pub fn with_cursor(mut self, token: Option<String>) -> Self {
        self.cursor_token = token;
        self
    }

    /// Translate into the backend filter
    pub fn filter(&self) -> QueryFilter {
        let mut filter = QueryFilter::default()
            .with_format(self.format.clone())
            .with_date_range(self.from_date, self.until_date);
        filter.set = self.set.clone();
        filter
    }
}

/// List/harvest response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Identifiers on this page
    pub data: Vec<String>,

    /// Total matching documents
    pub total: u64,

    /// Number of identifiers on this page
    pub size: usize,

    /// Cursor for the next page; absent at end of stream
    pub last_item_id: Option<String>,
}
