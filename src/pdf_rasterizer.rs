//! # PDF Rasterization Module
//!
//! Renders every page of a PDF to a PNG raster with poppler's `pdftoppm`.
//! Rasters are written into a freshly created temporary directory owned by the
//! returned [`RasterizedPdf`]; the directory and its pages are removed when that
//! value is dropped, so concurrent documents never share scratch files.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::ocr_errors::OcrError;

const PAGE_PREFIX: &str = "page";

/// Page rasters of one PDF, in page order.
#[derive(Debug)]
pub struct RasterizedPdf {
    dir: TempDir,
    pages: Vec<PathBuf>,
}

impl RasterizedPdf {
    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Scratch directory holding the rasters
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Check whether `pdftoppm` can be executed
pub fn is_rasterizer_available() -> bool {
    Command::new("pdftoppm").arg("-v").output().is_ok()
}

/// Rasterize all pages of `pdf_path` at `dpi` into a new temporary directory.
///
/// Blocks until `pdftoppm` exits.
pub fn rasterize_pdf(pdf_path: &Path, dpi: u32) -> Result<RasterizedPdf, OcrError> {
    let dir = tempfile::Builder::new()
        .prefix("pdf-pages-")
        .tempdir()
        .map_err(|e| OcrError::Rasterization(format!("cannot create scratch directory: {e}")))?;
    let output_prefix = dir.path().join(PAGE_PREFIX);

    info!(
        pdf = %pdf_path.display(),
        dpi = dpi,
        scratch = %dir.path().display(),
        "Rasterizing PDF pages"
    );

    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg(pdf_path)
        .arg(&output_prefix)
        .output()
        .map_err(|e| OcrError::Rasterization(format!("failed to run pdftoppm: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OcrError::Rasterization(format!(
            "pdftoppm exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let pages = collect_page_files(dir.path())?;
    if pages.is_empty() {
        return Err(OcrError::Rasterization(
            "pdftoppm produced no page images".to_string(),
        ));
    }

    debug!(pages = pages.len(), "PDF rasterized");
    Ok(RasterizedPdf { dir, pages })
}

/// List `page-N.png` files in `dir`, ordered by page number.
///
/// pdftoppm zero-pads page numbers to the width of the page count, so ordering
/// is done on the parsed number rather than on the file name.
fn collect_page_files(dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| OcrError::Rasterization(format!("cannot list page rasters: {e}")))?;

    let mut numbered: Vec<(u32, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| page_number(&path).map(|n| (n, path)))
        .collect();

    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

fn page_number(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let number = stem.strip_prefix(PAGE_PREFIX)?.strip_prefix('-')?;
    number.parse().ok()
}
