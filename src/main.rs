use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use candidate_intake::config::{AppConfig, PipelineMode};
use candidate_intake::db;
use candidate_intake::errors::error_logging;
use candidate_intake::observability;
use candidate_intake::ocr::{OcrInstanceManager, TesseractRecognizer, TextRecognizer};
use candidate_intake::pipeline::{self, ExtractionPipeline, JobRegistry};
use candidate_intake::server::{self, AppState};
use tokio::net::TcpListener;
use tracing::info;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let startup = Instant::now();

    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Initialize complete observability stack (metrics, tracing, logging)
    observability::init_observability_with_config(&config.observability).await?;
    info!("{}", config.summary());

    tokio::fs::create_dir_all(&config.storage.upload_dir)
        .await
        .map_err(|e| {
            error_logging::log_filesystem_error(
                &e,
                "create_upload_dir",
                config.storage.upload_dir.to_str(),
                None,
            );
            e
        })
        .with_context(|| {
            format!(
                "Failed to create upload directory {}",
                config.storage.upload_dir.display()
            )
        })?;

    let pool = db::connect(&config.storage.database_url, config.storage.max_connections).await?;
    db::init_database_schema(&pool).await?;

    let recognizer: Arc<dyn TextRecognizer> = Arc::new(TesseractRecognizer::new(
        config.ocr.clone(),
        Arc::new(OcrInstanceManager::new()),
    ));

    let pipeline = Arc::new(ExtractionPipeline::new(
        config.ocr.clone(),
        recognizer,
        pool,
        config.storage.upload_dir.clone(),
        config.extraction.label_mode,
        config.pipeline.workers,
    ));
    info!(
        workers = pipeline.workers(),
        upload_dir = %pipeline.upload_dir().display(),
        "Extraction pipeline ready"
    );

    let (state, _workers) = match config.pipeline.mode {
        PipelineMode::Sync => (AppState::synchronous(pipeline), Vec::new()),
        PipelineMode::Queued => {
            let (queue, workers) = pipeline::start_job_queue(
                Arc::clone(&pipeline),
                Arc::new(JobRegistry::with_history(config.pipeline.job_history)),
                &config.pipeline,
            );
            (AppState::queued(pipeline, queue), workers)
        }
    };

    let app = server::create_router(state, config.server.max_upload_bytes);

    let listener = TcpListener::bind(config.server.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address()))?;

    observability::record_startup_metrics(startup.elapsed());
    info!(
        address = %config.server.bind_address(),
        mode = config.pipeline.mode.as_str(),
        "Candidate intake server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    Ok(())
}
