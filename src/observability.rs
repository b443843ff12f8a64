//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Metrics collection and Prometheus export
//! - Distributed tracing with OpenTelemetry
//! - Structured logging with configurable levels

pub mod metrics;
pub mod tracing_mod;

use anyhow::Result;

use crate::observability_config::ObservabilityConfig;

pub use self::metrics::{
    check_auth, init_metrics, record_db_metrics, record_error_metrics, record_field_not_found,
    record_ocr_metrics, record_pipeline_metrics, record_queue_metrics, record_startup_metrics,
    record_upload_metrics, start_metrics_server,
};
pub use self::tracing_mod::{init_opentelemetry_tracing_with_config, init_tracing_with_config};

/// Initialize the complete observability stack with custom configuration
pub async fn init_observability_with_config(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    // Initialize tracing first
    init_tracing_with_config(config)?;

    let metrics_handle = init_metrics()?;

    init_opentelemetry_tracing_with_config(config).await?;

    start_metrics_server(metrics_handle, config).await?;

    tracing::info!(
        environment = %config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        metrics_port = %config.metrics_port,
        "Observability stack initialized successfully"
    );
    Ok(())
}
