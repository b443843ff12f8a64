//! # OCR Error Types Module
//!
//! This module defines custom error types used throughout the OCR processing system.
//! Any of these aborts the extraction of the whole document.

/// Custom error types for OCR operations
#[derive(Debug, Clone, PartialEq)]
pub enum OcrError {
    /// File validation errors (missing, empty or oversized document)
    Validation(String),
    /// Image could not be decoded for preprocessing
    Decode(String),
    /// PDF page rasterization errors
    Rasterization(String),
    /// OCR engine initialization errors
    Initialization(String),
    /// Text extraction errors
    Extraction(String),
    /// Timeout errors
    Timeout(String),
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Validation(msg) => write!(f, "[VALIDATION] Document validation failed: {}", msg),
            OcrError::Decode(msg) => write!(f, "[DECODE] Failed to decode image: {}", msg),
            OcrError::Rasterization(msg) => write!(f, "[PDF_RASTER] Failed to rasterize PDF: {}", msg),
            OcrError::Initialization(msg) => write!(f, "[OCR_INIT] OCR engine initialization failed: {}", msg),
            OcrError::Extraction(msg) => write!(f, "[OCR_EXTRACT] Text extraction from image failed: {}", msg),
            OcrError::Timeout(msg) => write!(f, "[OCR_TIMEOUT] OCR processing timed out: {}", msg),
        }
    }
}

impl std::error::Error for OcrError {}

impl From<anyhow::Error> for OcrError {
    fn from(err: anyhow::Error) -> Self {
        OcrError::Extraction(err.to_string())
    }
}

impl From<crate::preprocessing::PreprocessingError> for OcrError {
    fn from(err: crate::preprocessing::PreprocessingError) -> Self {
        match err {
            crate::preprocessing::PreprocessingError::ImageLoad { message } => OcrError::Decode(message),
            other => OcrError::Extraction(other.to_string()),
        }
    }
}
