use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the store, the search facade and the HTTP layer
#[derive(Error, Debug)]
pub enum AppError {
    /// Primary store could not be read or written
    #[error("Store error: {0}")]
    Store(String),

    /// Item, index or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request parameters or item fields were rejected
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store or backend settings are unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stored item could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Search engine unreachable or returned a malformed response
    #[error("Search backend error: {0}")]
    SearchBackend(String),

    /// The configured backend lacks the capability
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Schema and other search failures with no closer HTTP meaning
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SearchBackend(_) => StatusCode::BAD_GATEWAY,
            AppError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Store(_)
            | AppError::Configuration(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Store(_) => "STORE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::SearchBackend(_) => "SEARCH_BACKEND_ERROR",
            AppError::Unsupported(_) => "UNSUPPORTED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Body shape: `{"error": {"code", "message", "status"}}`
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error_code = code, status_code = status.as_u16(), message = %message, "Request failed");
        } else {
            tracing::debug!(error_code = code, status_code = status.as_u16(), message = %message, "Request rejected");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
