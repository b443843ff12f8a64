//! # Application Error Types
//!
//! This module defines the error taxonomy used throughout the candidate intake service.
//! Validation errors are reported back to the uploader; every other variant is an
//! unrecovered pipeline failure and surfaces as a generic server error.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Upload validation errors (missing file part, empty filename)
    Validation(String),
    /// Image could not be read or decoded
    Decode(String),
    /// OCR processing errors
    Ocr(String),
    /// Database operation errors
    Database(String),
    /// File system errors
    FileSystem(String),
    /// Internal application errors
    Internal(String),
}

impl AppError {
    /// Short machine-readable label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Validation(_) => "validation",
            AppError::Decode(_) => "decode",
            AppError::Ocr(_) => "ocr",
            AppError::Database(_) => "database",
            AppError::FileSystem(_) => "filesystem",
            AppError::Internal(_) => "internal",
        }
    }

    /// HTTP status this error maps to at the boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Decode(msg) => write!(f, "[DECODE] {}", msg),
            AppError::Ocr(msg) => write!(f, "[OCR] {}", msg),
            AppError::Database(msg) => write!(f, "[DATABASE] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Keep database failures classified when they were wrapped with context
        if let Some(db_err) = err.downcast_ref::<sqlx::Error>() {
            return AppError::Database(format!("{err:#}: {db_err}"));
        }
        AppError::Internal(format!("{err:#}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<crate::ocr_errors::OcrError> for AppError {
    fn from(err: crate::ocr_errors::OcrError) -> Self {
        match err {
            crate::ocr_errors::OcrError::Decode(_) => AppError::Decode(err.to_string()),
            other => AppError::Ocr(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            AppError::Validation(msg) => (status, msg).into_response(),
            other => {
                error_logging::log_request_error(&other, other.kind());
                crate::observability::record_error_metrics(other.kind(), "http");
                (status, "Internal Server Error").into_response()
            }
        }
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log database operation errors with contextual information
    pub fn log_database_error(
        error: &impl std::fmt::Display,
        operation: &str,
        record_id: Option<i64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            record_id = ?record_id,
            "Database operation failed"
        );
    }

    /// Log OCR processing errors with document and processing context
    pub fn log_ocr_error(
        error: &impl std::fmt::Display,
        operation: &str,
        document: Option<&str>,
        file_size: Option<u64>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            document = ?document,
            file_size_bytes = ?file_size,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "OCR processing failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }

    /// Log an error that is about to be turned into a server error response
    pub fn log_request_error(error: &impl std::fmt::Display, kind: &str) {
        error!(
            error = %error,
            error_kind = %kind,
            "Request failed with unhandled pipeline error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr_errors::OcrError;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = AppError::Validation("No file uploaded".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_pipeline_errors_map_to_server_error() {
        for err in [
            AppError::Decode("bad png".to_string()),
            AppError::Ocr("engine missing".to_string()),
            AppError::Database("locked".to_string()),
            AppError::FileSystem("disk full".to_string()),
        ] {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_ocr_decode_error_keeps_decode_kind() {
        let err: AppError = OcrError::Decode("truncated".to_string()).into();
        assert_eq!(err.kind(), "decode");

        let err: AppError = OcrError::Extraction("tesseract crashed".to_string()).into();
        assert_eq!(err.kind(), "ocr");
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            AppError::Config("PORT must be a valid port number".to_string()).to_string(),
            "[CONFIG] PORT must be a valid port number"
        );
    }
}
