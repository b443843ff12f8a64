//! # Image Thresholding Module
//!
//! Binary thresholding for OCR preprocessing using Otsu's method for automatic
//! threshold selection.

use image::GrayImage;
use tracing;

use super::types::{PreprocessingError, ThresholdedImageResult};

/// Applies Otsu's thresholding algorithm to convert a grayscale image to binary (black/white).
///
/// The threshold is chosen by maximizing the between-class variance of the page's
/// own intensity histogram. Pixels strictly brighter than the threshold become 255,
/// everything else becomes 0.
///
/// # Examples
///
/// ```no_run
/// use candidate_intake::preprocessing::apply_otsu_threshold;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gray = image::open("scan.png")?.to_luma8();
/// let thresholded = apply_otsu_threshold(&gray)?;
/// println!("Optimal threshold: {}", thresholded.threshold);
/// # Ok(())
/// # }
/// ```
pub fn apply_otsu_threshold(gray: &GrayImage) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    let total_pixels = (gray.width() as u64 * gray.height() as u64) as f64;
    if total_pixels == 0.0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: "cannot threshold an empty image".to_string(),
        });
    }

    // Calculate histogram
    let mut histogram = [0u32; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let optimal_threshold = find_otsu_threshold(&histogram, total_pixels)?;

    let mut binary_img = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let binary_value = if pixel[0] > optimal_threshold { 255u8 } else { 0u8 };
        binary_img.put_pixel(x, y, image::Luma([binary_value]));
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Otsu thresholding completed in {}ms: threshold={}, dimensions={}x{}",
        processing_time.as_millis(),
        optimal_threshold,
        gray.width(),
        gray.height()
    );

    Ok(ThresholdedImageResult {
        image: binary_img,
        threshold: optimal_threshold,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Finds the optimal threshold using Otsu's method by maximizing between-class variance.
///
/// Returns 128 when the histogram has a single populated intensity (no split is possible).
fn find_otsu_threshold(histogram: &[u32; 256], total_pixels: f64) -> Result<u8, PreprocessingError> {
    let mut cumulative_sums = [0f64; 256];
    let mut cumulative_weighted_sums = [0f64; 256];

    let mut cumulative_sum = 0f64;
    let mut cumulative_weighted_sum = 0f64;
    for (i, &count) in histogram.iter().enumerate() {
        let pixel_count = count as f64;
        cumulative_sum += pixel_count;
        cumulative_weighted_sum += (i as f64) * pixel_count;

        cumulative_sums[i] = cumulative_sum;
        cumulative_weighted_sums[i] = cumulative_weighted_sum;
    }

    if (cumulative_sums[255] - total_pixels).abs() > 0.5 {
        return Err(PreprocessingError::ProcessingFailed {
            message: format!(
                "histogram covers {} pixels, expected {}",
                cumulative_sums[255], total_pixels
            ),
        });
    }

    let mut max_variance = 0f64;
    // A single-intensity page keeps 0, so every non-black pixel becomes white
    let mut optimal_threshold = 0u8;
    let total_weighted_sum = cumulative_weighted_sums[255];

    for threshold in 0..255usize {
        // Background: pixels <= threshold, foreground: pixels > threshold
        let background = cumulative_sums[threshold];
        let foreground = total_pixels - background;
        if background == 0.0 || foreground == 0.0 {
            continue;
        }

        let w0 = background / total_pixels;
        let w1 = foreground / total_pixels;
        let mu0 = cumulative_weighted_sums[threshold] / background;
        let mu1 = (total_weighted_sum - cumulative_weighted_sums[threshold]) / foreground;

        let variance = w0 * w1 * (mu0 - mu1).powi(2);
        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = threshold as u8;
        }
    }

    Ok(optimal_threshold)
}
