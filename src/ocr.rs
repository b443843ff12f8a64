//! # OCR Processing Module
//!
//! Turns an uploaded document into raw text with the Tesseract OCR engine.
//!
//! ## Processing
//!
//! - **Raster images** (PNG, JPEG, TIFF, BMP, ...): preprocessed once and recognized once
//! - **PDF documents**: every page is rasterized, preprocessed and recognized
//!   independently; page texts are concatenated in page order with nothing
//!   inserted between them
//!
//! A failure on any page aborts the whole document; no partial text is returned.
//!
//! ## Dependencies
//!
//! - `leptess`: Rust bindings for Tesseract OCR and Leptonica
//! - `image`: decoding and in-memory PNG encoding of preprocessed pages
//! - `pdftoppm` (poppler-utils): PDF page rasterization, see [`crate::pdf_rasterizer`]

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::errors::error_logging;
pub use crate::instance_manager::OcrInstanceManager;
pub use crate::ocr_config::{OcrConfig, PageSegMode};
pub use crate::ocr_errors::OcrError;
use crate::observability;
use crate::preprocessing::{self, PreprocessedImage};

/// Bytes at the start of every PDF file
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Kind of uploaded document, which decides how pages are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Image => "image",
            DocumentKind::Pdf => "pdf",
        }
    }
}

/// Recognized text of one document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentText {
    pub text: String,
    pub kind: DocumentKind,
    pub pages: usize,
}

/// Converts one preprocessed page into text.
///
/// Implementations block; the pipeline always calls them from a blocking thread.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, page: &PreprocessedImage) -> Result<String, OcrError>;
}

/// [`TextRecognizer`] backed by pooled Tesseract engines
pub struct TesseractRecognizer {
    config: OcrConfig,
    instances: Arc<OcrInstanceManager>,
}

impl TesseractRecognizer {
    pub fn new(config: OcrConfig, instances: Arc<OcrInstanceManager>) -> Self {
        Self { config, instances }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, page: &PreprocessedImage) -> Result<String, OcrError> {
        let png = encode_png(page)?;

        self.instances.with_instance(&self.config, |tess| {
            tess.set_image_from_mem(&png).map_err(|e| {
                OcrError::Decode(format!("Tesseract could not load preprocessed page: {e}"))
            })?;
            tess.get_utf8_text()
                .map_err(|e| OcrError::Extraction(format!("Failed to extract text from image: {e}")))
        })
    }
}

fn encode_png(page: &PreprocessedImage) -> Result<Vec<u8>, OcrError> {
    let mut png = Vec::new();
    page.image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| OcrError::Extraction(format!("Failed to encode page for OCR: {e}")))?;
    Ok(png)
}

/// Validate that `path` is a readable, non-empty document within the size limit.
///
/// Returns the file size in bytes.
pub fn validate_document(path: &Path, config: &OcrConfig) -> Result<u64, OcrError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        OcrError::Validation(format!("cannot read {} ({})", path.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(OcrError::Validation(format!(
            "path is not a file ({})",
            path.display()
        )));
    }

    let file_size = metadata.len();
    if file_size == 0 {
        return Err(OcrError::Validation(format!(
            "file is empty ({})",
            path.display()
        )));
    }
    if file_size > config.max_file_size {
        return Err(OcrError::Validation(format!(
            "file too large ({} bytes, maximum allowed: {} bytes)",
            file_size, config.max_file_size
        )));
    }

    Ok(file_size)
}

/// Decide whether `path` is a PDF or a raster image.
///
/// The extension decides first (case-insensitive `.pdf`); files without it are
/// still treated as PDFs when their content starts with the PDF signature.
pub fn detect_document_kind(path: &Path) -> Result<DocumentKind, OcrError> {
    let has_pdf_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if has_pdf_extension {
        return Ok(DocumentKind::Pdf);
    }

    let mut header = [0u8; PDF_MAGIC.len()];
    let mut file = std::fs::File::open(path)
        .map_err(|e| OcrError::Validation(format!("cannot open {} ({})", path.display(), e)))?;
    let read = file
        .read(&mut header)
        .map_err(|e| OcrError::Validation(format!("cannot read {} ({})", path.display(), e)))?;

    if read == PDF_MAGIC.len() && header == PDF_MAGIC {
        Ok(DocumentKind::Pdf)
    } else {
        Ok(DocumentKind::Image)
    }
}

/// Recognize the text of a document, blocking the calling thread.
pub fn extract_document_text_blocking(
    path: &Path,
    config: &OcrConfig,
    recognizer: &dyn TextRecognizer,
) -> Result<DocumentText, OcrError> {
    validate_document(path, config)?;
    let kind = detect_document_kind(path)?;

    match kind {
        DocumentKind::Image => {
            let page = preprocessing::preprocess_file(path)?;
            let text = recognizer.recognize(&page)?;
            Ok(DocumentText {
                text,
                kind,
                pages: 1,
            })
        }
        DocumentKind::Pdf => {
            let rasterized = crate::pdf_rasterizer::rasterize_pdf(path, config.pdf_dpi)?;
            let text = recognize_pages(rasterized.pages(), recognizer)?;

            Ok(DocumentText {
                text,
                kind,
                pages: rasterized.page_count(),
            })
        }
    }
}

/// Preprocess and recognize page rasters in order, joining their texts with no separator.
///
/// The first failing page aborts the whole document.
pub fn recognize_pages(pages: &[PathBuf], recognizer: &dyn TextRecognizer) -> Result<String, OcrError> {
    let mut text = String::new();

    for (index, page_path) in pages.iter().enumerate() {
        let page = preprocessing::preprocess_file(page_path)?;
        let page_text = recognizer.recognize(&page)?;
        debug!(
            page = index + 1,
            characters = page_text.len(),
            "Recognized PDF page"
        );
        text.push_str(&page_text);
    }

    Ok(text)
}

/// Recognize the text of a document on a blocking thread, bounded by the configured timeout.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use candidate_intake::ocr::{extract_document_text, OcrConfig, OcrInstanceManager, TesseractRecognizer};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OcrConfig::default();
/// let recognizer = Arc::new(TesseractRecognizer::new(config.clone(), Arc::new(OcrInstanceManager::new())));
///
/// let document = extract_document_text("uploads/form.pdf".as_ref(), &config, recognizer).await?;
/// println!("{} pages, {} characters", document.pages, document.text.len());
/// # Ok(())
/// # }
/// ```
#[tracing::instrument(name = "ocr", skip(path, config, recognizer), fields(document = %path.display()))]
pub async fn extract_document_text(
    path: &Path,
    config: &OcrConfig,
    recognizer: Arc<dyn TextRecognizer>,
) -> Result<DocumentText, OcrError> {
    let start_time = Instant::now();
    let timeout_duration = Duration::from_secs(config.operation_timeout_secs);
    let file_size = std::fs::metadata(path).map(|m| m.len()).ok();

    info!(document = %path.display(), "Starting OCR text extraction");

    let owned_path = path.to_path_buf();
    let owned_config = config.clone();
    let task = tokio::task::spawn_blocking(move || {
        extract_document_text_blocking(&owned_path, &owned_config, recognizer.as_ref())
    });

    // The blocking thread keeps running after a timeout; its result is discarded
    let result = match tokio::time::timeout(timeout_duration, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(OcrError::Extraction(format!(
            "OCR worker thread failed: {join_error}"
        ))),
        Err(_) => Err(OcrError::Timeout(format!(
            "OCR operation timed out after {} seconds",
            config.operation_timeout_secs
        ))),
    };

    let duration = start_time.elapsed();
    match &result {
        Ok(document) => {
            observability::record_ocr_metrics(true, duration, file_size.unwrap_or(0), document.pages);
            info!(
                kind = document.kind.as_str(),
                pages = document.pages,
                characters = document.text.len(),
                duration_ms = duration.as_millis() as u64,
                "OCR extraction completed"
            );
        }
        Err(err) => {
            observability::record_ocr_metrics(false, duration, file_size.unwrap_or(0), 0);
            if matches!(err, OcrError::Timeout(_)) {
                warn!("OCR processing timed out after {}ms", duration.as_millis());
            }
            error_logging::log_ocr_error(
                err,
                "extract_document_text",
                path.to_str(),
                file_size,
                Some(duration),
            );
        }
    }

    result
}
