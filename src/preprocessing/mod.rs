//! # Image Preprocessing Module
//!
//! Prepares scanned pages for OCR. Every page goes through the same three steps:
//!
//! 1. load as single-channel grayscale
//! 2. global binarization with Otsu's method (`thresholding`)
//! 3. 3x3 median filtering to remove speckle noise (`filtering`)
//!
//! No fixed threshold is involved: the cutoff always comes from the page's own
//! intensity histogram.

pub mod filtering;
pub mod thresholding;
pub mod types;

use std::path::Path;

use image::DynamicImage;

pub use filtering::{apply_median_filter, MEDIAN_WINDOW_RADIUS};
pub use thresholding::apply_otsu_threshold;
pub use types::{DenoisedImageResult, PreprocessedImage, PreprocessingError, ThresholdedImageResult};

/// Decode an image file and run the preprocessing pipeline on it.
pub fn preprocess_file(path: &Path) -> Result<PreprocessedImage, PreprocessingError> {
    let image = image::open(path).map_err(|e| PreprocessingError::ImageLoad {
        message: format!("{}: {}", path.display(), e),
    })?;
    preprocess_image(&image)
}

/// Decode an in-memory image buffer and run the preprocessing pipeline on it.
pub fn preprocess_bytes(bytes: &[u8]) -> Result<PreprocessedImage, PreprocessingError> {
    let image = image::load_from_memory(bytes).map_err(|e| PreprocessingError::ImageLoad {
        message: e.to_string(),
    })?;
    preprocess_image(&image)
}

/// Grayscale, binarize and denoise an already decoded image.
pub fn preprocess_image(image: &DynamicImage) -> Result<PreprocessedImage, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let gray = image.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(PreprocessingError::ImageLoad {
            message: "image has no pixels".to_string(),
        });
    }

    let thresholded = apply_otsu_threshold(&gray)?;
    let denoised = apply_median_filter(&thresholded.image)?;

    let processing_time = start_time.elapsed();
    let dimensions = denoised.image.dimensions();

    tracing::debug!(
        target: "ocr_preprocessing",
        threshold = thresholded.threshold,
        width = dimensions.0,
        height = dimensions.1,
        duration_ms = processing_time.as_millis() as u64,
        "Page preprocessed for OCR"
    );

    Ok(PreprocessedImage {
        image: denoised.image,
        threshold: thresholded.threshold,
        dimensions,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}
