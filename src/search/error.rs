//! Error types for search operations

use crate::error::AppError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Search engine unreachable or returned a malformed response
    #[error("Search transport failed: {0}")]
    Transport(String),

    /// Index, alias or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mapping could not be resolved or was rejected
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Capability not offered by this backend
    #[error("Operation not supported by {backend} backend: {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// Cursor token does not resolve to a known item
    #[error("Invalid cursor token: {0}")]
    InvalidCursor(String),

    /// Malformed request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Document (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Primary store lookup failed
    #[error("Primary store error: {0}")]
    Store(String),

    /// Rebuild found nothing to copy
    #[error("Nothing to reindex: {0}")]
    NothingToIndex(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SearchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SearchError::NotFound(_))
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Serialization(err.to_string())
    }
}

impl From<AppError> for SearchError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => SearchError::NotFound(msg),
            other => SearchError::Store(other.to_string()),
        }
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NotFound(msg) => AppError::NotFound(msg),
            SearchError::InvalidCursor(msg) | SearchError::InvalidRequest(msg) => {
                AppError::Validation(msg)
            }
            SearchError::InvalidConfiguration(msg) => AppError::Configuration(msg),
            SearchError::Transport(msg) => AppError::SearchBackend(msg),
            SearchError::Store(msg) => AppError::Store(msg),
            SearchError::Serialization(msg) => AppError::Serialization(msg),
            err @ SearchError::Unsupported { .. } => AppError::Unsupported(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_app_not_found() {
        let err: AppError = SearchError::NotFound("doc".to_string()).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_unsupported_message_names_backend() {
        let err = SearchError::Unsupported {
            backend: "solr",
            operation: "swap_alias",
        };
        assert_eq!(
            err.to_string(),
            "Operation not supported by solr backend: swap_alias"
        );
    }
}
