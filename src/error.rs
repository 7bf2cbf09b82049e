use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("Image ingestion failed: {0}")]
    Ingestion(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidFileType(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Ingestion(_) | AppError::Query(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Timeouts are the only failures a caller may blindly retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Timeout(_))
    }
}

// Convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retryable = self.is_retryable();
        let error_message = match self {
            AppError::Validation(ref e) => e.as_str(),
            AppError::InvalidFileType(ref e) => e.as_str(),
            AppError::NotFound(ref e) => e.as_str(),
            AppError::Ingestion(ref e) => {
                tracing::error!("Image ingestion failed: {}", e);
                "Image processing failed"
            }
            AppError::Query(ref e) => {
                tracing::error!("Query error: {}", e);
                "Internal database error"
            }
            AppError::Timeout(ref e) => {
                tracing::warn!("Timed out: {}", e);
                "The operation timed out, please retry"
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error"
            }
        };

        let body = Json(json!({
            "status": if status.is_client_error() { "fail" } else { "error" },
            "error": status.canonical_reason().unwrap_or("Unknown error"),
            "message": error_message,
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidFileType("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Ingestion("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Query(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Timeout("x".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_only_timeouts_are_retryable() {
        assert!(AppError::Timeout("slow".into()).is_retryable());
        assert!(!AppError::Query(sqlx::Error::RowNotFound).is_retryable());
        assert!(!AppError::Ingestion("disk".into()).is_retryable());
    }
}
