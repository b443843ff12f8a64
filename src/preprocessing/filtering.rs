//! # Image Filtering Module
//!
//! Speckle removal for binarized scans. A small median window removes isolated
//! noise pixels left by thresholding while keeping character edges sharp.

use image::GrayImage;
use tracing;

use super::types::{DenoisedImageResult, PreprocessingError};

/// Radius of the median window; 1 gives the 3x3 window used for every page.
pub const MEDIAN_WINDOW_RADIUS: u32 = 1;

/// Applies a 3x3 median filter to a grayscale image.
///
/// Borders are handled by clamping to the nearest edge pixel, so the output has
/// the same dimensions as the input.
///
/// # Examples
///
/// ```no_run
/// use candidate_intake::preprocessing::apply_median_filter;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gray = image::open("binary_scan.png")?.to_luma8();
/// let denoised = apply_median_filter(&gray)?;
/// assert_eq!(denoised.window_size, 3);
/// # Ok(())
/// # }
/// ```
pub fn apply_median_filter(image: &GrayImage) -> Result<DenoisedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: "cannot filter an empty image".to_string(),
        });
    }

    let filtered =
        imageproc::filter::median_filter(image, MEDIAN_WINDOW_RADIUS, MEDIAN_WINDOW_RADIUS);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Median filter completed in {}ms: window=3x3, dimensions={}x{}",
        processing_time.as_millis(),
        filtered.width(),
        filtered.height()
    );

    Ok(DenoisedImageResult {
        image: filtered,
        window_size: MEDIAN_WINDOW_RADIUS * 2 + 1,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_filter_removes_isolated_speckle() {
        let mut img = GrayImage::from_pixel(9, 9, image::Luma([255]));
        img.put_pixel(4, 4, image::Luma([0]));

        let result = apply_median_filter(&img).expect("median filter should succeed");

        assert_eq!(result.image.get_pixel(4, 4)[0], 255);
        assert_eq!(result.window_size, 3);
    }

    #[test]
    fn test_median_filter_preserves_solid_regions() {
        // Left half black, right half white: the boundary must stay where it is
        let mut img = GrayImage::new(10, 10);
        for (x, _y, pixel) in img.enumerate_pixels_mut() {
            pixel[0] = if x < 5 { 0 } else { 255 };
        }

        let result = apply_median_filter(&img).expect("median filter should succeed");

        assert_eq!(result.image.dimensions(), (10, 10));
        assert_eq!(result.image.get_pixel(3, 5)[0], 0);
        assert_eq!(result.image.get_pixel(6, 5)[0], 255);
    }

    #[test]
    fn test_median_filter_rejects_empty_image() {
        assert!(apply_median_filter(&GrayImage::new(0, 0)).is_err());
    }
}
