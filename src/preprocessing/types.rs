//! # Shared Types for Image Preprocessing
//!
//! This module contains the shared types and error definitions used across
//! the preprocessing sub-modules.

use image::GrayImage;

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// Failed to load or decode image
    ImageLoad { message: String },
    /// Image processing operation failed
    ProcessingFailed { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::ImageLoad { message } => {
                write!(f, "Failed to load image: {}", message)
            }
            PreprocessingError::ProcessingFailed { message } => {
                write!(f, "Image processing failed: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Result of image thresholding operation.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// The thresholded binary image
    pub image: GrayImage,
    /// Optimal threshold value found by Otsu's method
    pub threshold: u8,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of image noise reduction operation.
#[derive(Debug, Clone)]
pub struct DenoisedImageResult {
    /// The denoised image
    pub image: GrayImage,
    /// Side length of the square median window (3 for 3x3)
    pub window_size: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// A grayscale, binarized and denoised page ready for OCR.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// The OCR-ready image
    pub image: GrayImage,
    /// Threshold chosen by Otsu's method
    pub threshold: u8,
    /// Image dimensions (width, height)
    pub dimensions: (u32, u32),
    /// Total preprocessing time in milliseconds
    pub processing_time_ms: u32,
}
