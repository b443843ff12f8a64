//! # OCR Configuration Module
//!
//! This module defines configuration structures for OCR processing: engine
//! language and layout settings, PDF rasterization resolution, size limits and
//! the per-document timeout.

use std::env;

use crate::errors::{AppError, AppResult};

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng";
/// Resolution used when rasterizing PDF pages
pub const DEFAULT_PDF_DPI: u32 = 200;
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // 20MB limit for uploaded documents
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of text
    #[default]
    SingleBlock = 6,
    /// Treat the image as a single text line
    SingleLine = 7,
    /// Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SparseText => "11",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract language string, e.g. "eng" or "eng+fra"
    pub languages: String,
    /// Optional tessdata directory; the system default is used when unset
    pub tessdata_dir: Option<String>,
    pub psm_mode: PageSegMode,
    pub pdf_dpi: u32,
    pub max_file_size: u64,
    /// Upper bound for recognizing one whole document
    pub operation_timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            tessdata_dir: None,
            psm_mode: PageSegMode::default(),
            pdf_dpi: DEFAULT_PDF_DPI,
            max_file_size: MAX_FILE_SIZE,
            operation_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl OcrConfig {
    /// Load OCR configuration from environment variables, falling back to defaults
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(languages) = env::var("OCR_LANGUAGES") {
            config.languages = languages;
        }
        config.tessdata_dir = env::var("TESSDATA_DIR").ok().filter(|d| !d.trim().is_empty());
        config.pdf_dpi = env::var("OCR_PDF_DPI")
            .unwrap_or_else(|_| DEFAULT_PDF_DPI.to_string())
            .parse()
            .map_err(|_| AppError::Config("OCR_PDF_DPI must be a valid number".to_string()))?;
        config.max_file_size = env::var("OCR_MAX_FILE_SIZE_BYTES")
            .unwrap_or_else(|_| MAX_FILE_SIZE.to_string())
            .parse()
            .map_err(|_| {
                AppError::Config("OCR_MAX_FILE_SIZE_BYTES must be a valid number".to_string())
            })?;
        config.operation_timeout_secs = env::var("OCR_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .map_err(|_| AppError::Config("OCR_TIMEOUT_SECS must be a valid number".to_string()))?;

        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }
        if self
            .languages
            .split('+')
            .any(|lang| lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(AppError::Config(format!(
                "languages '{}' must be '+'-separated Tesseract language codes",
                self.languages
            )));
        }
        if !(72..=600).contains(&self.pdf_dpi) {
            return Err(AppError::Config(format!(
                "pdf_dpi must be between 72 and 600, got {}",
                self.pdf_dpi
            )));
        }
        if self.max_file_size == 0 {
            return Err(AppError::Config(
                "max_file_size must be greater than 0".to_string(),
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(AppError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
