//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! Values come from environment variables (optionally seeded from a `.env`
//! file by the binary) and are validated before the server starts.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::db::DEFAULT_DATABASE_URL;
use crate::errors::{AppError, AppResult};
use crate::extraction::LabelMatchMode;
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::{OcrConfig, MAX_FILE_SIZE};
use crate::pipeline::DEFAULT_JOB_HISTORY;

/// Read an environment variable and parse it, falling back to `default` when unset
fn env_or<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

/// Parse a boolean flag the way operators tend to write them
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body for uploads
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5432,
            max_upload_bytes: MAX_FILE_SIZE as usize,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.host.trim().is_empty() {
            return Err(AppError::Config("HOST cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(AppError::Config("PORT cannot be 0".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(AppError::Config(
                "MAX_UPLOAD_BYTES must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where uploads and records are kept
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Directory that receives uploaded files
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !self.database_url.starts_with("sqlite:") {
            return Err(AppError::Config(
                "DATABASE_URL must start with 'sqlite:'".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(AppError::Config("Max connections cannot be 0".to_string()));
        }
        if self.max_connections > 100 {
            return Err(AppError::Config(
                "Max connections cannot be greater than 100".to_string(),
            ));
        }
        if self.upload_dir.as_os_str().is_empty() {
            return Err(AppError::Config("UPLOAD_DIR cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// How uploads are handed to the extraction pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineMode {
    /// The upload request waits for the record to be stored
    #[default]
    Sync,
    /// The upload is queued and tracked as a job
    Queued,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::Sync => "sync",
            PipelineMode::Queued => "queued",
        }
    }
}

impl FromStr for PipelineMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(PipelineMode::Sync),
            "queued" => Ok(PipelineMode::Queued),
            other => Err(AppError::Config(format!(
                "PIPELINE_MODE must be 'sync' or 'queued', got '{other}'"
            ))),
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: PipelineMode,
    /// Documents recognized at the same time
    pub workers: usize,
    /// Jobs waiting for a worker before uploads are refused
    pub queue_capacity: usize,
    /// Finished jobs whose status stays queryable
    pub job_history: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::default(),
            workers: 2,
            queue_capacity: 32,
            job_history: DEFAULT_JOB_HISTORY,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.workers == 0 {
            return Err(AppError::Config("PIPELINE_WORKERS cannot be 0".to_string()));
        }
        if self.workers > 64 {
            return Err(AppError::Config(
                "PIPELINE_WORKERS cannot be greater than 64".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(AppError::Config(
                "PIPELINE_QUEUE_CAPACITY cannot be 0".to_string(),
            ));
        }
        if self.job_history == 0 {
            return Err(AppError::Config(
                "PIPELINE_JOB_HISTORY cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    pub label_mode: LabelMatchMode,
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    /// OCR processing configuration
    pub ocr: OcrConfig,
    pub pipeline: PipelineConfig,
    pub extraction: ExtractionConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let server = ServerConfig {
            host: env::var("HOST").unwrap_or(defaults.server.host),
            port: env_or("PORT", defaults.server.port)?,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes)?,
        };

        let storage = StorageConfig {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.storage.database_url),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", defaults.storage.max_connections)?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.upload_dir),
        };

        let pipeline = PipelineConfig {
            mode: env_or("PIPELINE_MODE", defaults.pipeline.mode)?,
            workers: env_or("PIPELINE_WORKERS", defaults.pipeline.workers)?,
            queue_capacity: env_or("PIPELINE_QUEUE_CAPACITY", defaults.pipeline.queue_capacity)?,
            job_history: env_or("PIPELINE_JOB_HISTORY", defaults.pipeline.job_history)?,
        };

        let anchor_labels = match env::var("EXTRACTION_ANCHOR_LABELS") {
            Ok(raw) => parse_bool_flag(&raw).ok_or_else(|| {
                AppError::Config(format!(
                    "EXTRACTION_ANCHOR_LABELS must be true or false, got '{raw}'"
                ))
            })?,
            Err(_) => false,
        };
        let extraction = ExtractionConfig {
            label_mode: if anchor_labels {
                LabelMatchMode::LineStart
            } else {
                LabelMatchMode::Unanchored
            },
        };

        Ok(Self {
            server,
            storage,
            ocr: OcrConfig::from_env()?,
            pipeline,
            extraction,
            observability: ObservabilityConfig::from_env()?,
        })
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.server.validate()?;
        self.storage.validate()?;
        self.ocr.validate()?;
        self.pipeline.validate()?;
        self.observability.validate().map_err(AppError::Config)?;

        if self.observability.metrics_port == self.server.port {
            return Err(AppError::Config(
                "PORT and METRICS_PORT cannot be the same".to_string(),
            ));
        }
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: bind={}, db_url=[REDACTED], upload_dir={}, ocr_languages={}, pdf_dpi={}, pipeline_mode={}, workers={}, label_mode={}, metrics_port={}",
            self.server.bind_address(),
            self.storage.upload_dir.display(),
            self.ocr.languages,
            self.ocr.pdf_dpi,
            self.pipeline.mode.as_str(),
            self.pipeline.workers,
            self.extraction.label_mode.as_str(),
            self.observability.metrics_port
        )
    }
}
