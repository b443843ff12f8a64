//! # OCR Tests Module
//!
//! Runs the real Tesseract and pdftoppm toolchain when it is installed; each test
//! skips itself otherwise.


use std::process::Command;
use std::sync::Arc;

use candidate_intake::instance_manager::OcrInstanceManager;
use candidate_intake::pdf_rasterizer::is_rasterizer_available;
use candidate_intake::ocr::{
    detect_document_kind, extract_document_text, validate_document, DocumentKind, OcrConfig,
    OcrError, TesseractRecognizer,
};

use test_helpers::{sample_png, write_sample_png};

fn tool_available(program: &str, arg: &str) -> bool {
    Command::new(program)
        .arg(arg)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn tesseract_available() -> bool {
    tool_available("tesseract", "--version")
}


/// One-page PDF with no content
const BLANK_PDF: &[u8] = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 72 72] >> endobj
trailer << /Root 1 0 R >>
%%EOF
";

#[test]
fn test_detect_document_kind() {
    let dir = tempfile::tempdir().unwrap();

    let png = write_sample_png(dir.path(), "page.png");
    assert_eq!(detect_document_kind(&png).unwrap(), DocumentKind::Image);

    let upper = dir.path().join("FORM.PDF");
    std::fs::write(&upper, b"anything").unwrap();
    assert_eq!(detect_document_kind(&upper).unwrap(), DocumentKind::Pdf);

    let disguised = dir.path().join("scan.bin");
    std::fs::write(&disguised, BLANK_PDF).unwrap();
    assert_eq!(detect_document_kind(&disguised).unwrap(), DocumentKind::Pdf);
}

#[test]
fn test_validate_document_limits() {
    let dir = tempfile::tempdir().unwrap();
    let config = OcrConfig {
        max_file_size: 16,
        ..OcrConfig::default()
    };

    let empty = dir.path().join("empty.png");
    std::fs::write(&empty, b"").unwrap();
    assert!(matches!(
        validate_document(&empty, &config),
        Err(OcrError::Validation(_))
    ));

    let large = write_sample_png(dir.path(), "large.png");
    assert!(matches!(
        validate_document(&large, &config),
        Err(OcrError::Validation(_))
    ));

    assert!(validate_document(&dir.path().join("missing.png"), &config).is_err());
    assert!(validate_document(&large, &OcrConfig::default()).is_ok());
    assert_eq!(
        validate_document(&large, &OcrConfig::default()).unwrap(),
        sample_png().len() as u64
    );
}

#[tokio::test]
async fn test_tesseract_reads_image() {
    if !tesseract_available() {
        eprintln!("Skipping test: tesseract not installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_png(dir.path(), "page.png");
    let config = OcrConfig::default();
    let recognizer = Arc::new(TesseractRecognizer::new(
        config.clone(),
        Arc::new(OcrInstanceManager::new()),
    ));

    match extract_document_text(&path, &config, recognizer).await {
        Ok(document) => {
            assert_eq!(document.kind, DocumentKind::Image);
            assert_eq!(document.pages, 1);
        }
        // Engine present but language data missing
        Err(OcrError::Initialization(msg)) => eprintln!("Skipping test: {msg}"),
        Err(other) => panic!("unexpected OCR failure: {other}"),
    }
}

#[tokio::test]
async fn test_pdf_pages_are_rasterized() {
    if !tesseract_available() || !is_rasterizer_available() {
        eprintln!("Skipping test: tesseract or pdftoppm not installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.pdf");
    std::fs::write(&path, BLANK_PDF).unwrap();

    let config = OcrConfig::default();
    let recognizer = Arc::new(TesseractRecognizer::new(
        config.clone(),
        Arc::new(OcrInstanceManager::new()),
    ));

    match extract_document_text(&path, &config, recognizer).await {
        Ok(document) => {
            assert_eq!(document.kind, DocumentKind::Pdf);
            assert_eq!(document.pages, 1);
        }
        Err(OcrError::Initialization(msg)) => eprintln!("Skipping test: {msg}"),
        Err(other) => panic!("unexpected OCR failure: {other}"),
    }
}
