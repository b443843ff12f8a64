//! # Candidate Intake
//!
//! A small web service that accepts scanned candidate forms (images or PDFs),
//! recognizes their text with Tesseract, extracts a fixed set of labeled
//! fields and stores each form as one row in SQLite.

pub mod config;
pub mod db;
pub mod errors;
pub mod extraction;
pub mod instance_manager;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod path_validation;
pub mod pdf_rasterizer;
pub mod pipeline;
pub mod preprocessing;
pub mod server;

// Re-export types for easier access
pub use extraction::{extract_candidate_fields, CandidateFields};
pub use pipeline::ExtractionPipeline;
