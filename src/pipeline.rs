//! # Extraction Pipeline
//!
//! Runs one uploaded document through OCR, field extraction and storage.
//!
//! OCR is CPU-bound and blocking, so every document is recognized on a
//! blocking thread while holding one permit of a shared semaphore. Uploads in
//! `sync` mode wait for their own document; in `queued` mode a small set of
//! workers drains a bounded channel and reports progress through the
//! [`JobRegistry`].

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sqlx::SqlitePool;
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db;
use crate::errors::{error_logging, AppError, AppResult};
use crate::extraction::{CandidateFields, FieldExtractor, LabelMatchMode};
use crate::observability;
use crate::ocr::{self, OcrConfig, TextRecognizer};
use crate::path_validation;

/// Name used for the job queue in metrics
pub const JOB_QUEUE_NAME: &str = "extraction_jobs";

/// Prefix of the private files uploads are written to before processing
const STAGING_PREFIX: &str = ".staging-";

/// An upload held in its own staging file inside the upload directory.
///
/// OCR always reads the staging file, so a later upload with the same name
/// cannot replace the bytes of one still waiting for a worker. [`publish`]
/// moves it to the sanitized name, where the most recently processed upload wins.
/// Dropping an unpublished upload deletes its staging file.
///
/// [`publish`]: StagedUpload::publish
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    stored_path: PathBuf,
}

impl StagedUpload {
    /// Create an empty staging file in `dir` for an upload to be stored as `stored_name`
    pub fn new_in(dir: &Path, stored_name: &str) -> AppResult<Self> {
        let stored_path = path_validation::resolve_upload_path(dir, stored_name)
            .map_err(|e| AppError::Internal(format!("unusable upload name '{stored_name}': {e}")))?;

        // The suffix keeps the extension that image decoding and PDF detection look at
        let file = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(&format!("-{stored_name}"))
            .tempfile_in(dir)
            .map_err(|e| {
                error_logging::log_filesystem_error(&e, "stage_upload", dir.to_str(), None);
                AppError::from(e)
            })?;

        Ok(Self { file, stored_path })
    }

    /// Staging file the pipeline reads
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Final location under the sanitized upload name
    pub fn stored_path(&self) -> &Path {
        &self.stored_path
    }

    /// Move the staged bytes to [`stored_path`](Self::stored_path), replacing any earlier file
    pub fn publish(self) -> AppResult<PathBuf> {
        let Self { file, stored_path } = self;
        file.persist(&stored_path).map_err(|e| {
            error_logging::log_filesystem_error(&e.error, "publish_upload", stored_path.to_str(), None);
            AppError::from(e.error)
        })?;
        Ok(stored_path)
    }
}

/// Shared preprocess → OCR → extract → store pipeline
pub struct ExtractionPipeline {
    ocr_config: OcrConfig,
    recognizer: Arc<dyn TextRecognizer>,
    pool: SqlitePool,
    upload_dir: PathBuf,
    extractor: &'static FieldExtractor,
    permits: Semaphore,
    workers: usize,
}

impl ExtractionPipeline {
    pub fn new(
        ocr_config: OcrConfig,
        recognizer: Arc<dyn TextRecognizer>,
        pool: SqlitePool,
        upload_dir: PathBuf,
        label_mode: LabelMatchMode,
        workers: usize,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            ocr_config,
            recognizer,
            pool,
            upload_dir,
            extractor: FieldExtractor::shared(label_mode),
            permits: Semaphore::new(workers),
            workers,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Number of documents that may be recognized at the same time
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Write an upload into a private staging file in the upload directory
    pub async fn save_upload(&self, original_filename: &str, data: &[u8]) -> AppResult<StagedUpload> {
        let stored_name = path_validation::upload_filename(original_filename);
        let upload = StagedUpload::new_in(&self.upload_dir, &stored_name)?;

        tokio::fs::write(upload.path(), data).await.map_err(|e| {
            error_logging::log_filesystem_error(
                &e,
                "save_upload",
                upload.path().to_str(),
                Some(data.len() as u64),
            );
            AppError::from(e)
        })?;

        debug!(
            original = %original_filename,
            staged = %upload.path().display(),
            stored = %upload.stored_path().display(),
            bytes = data.len(),
            "Upload saved"
        );
        Ok(upload)
    }

    /// Recognize a stored document and extract its candidate fields
    pub async fn extract_fields(&self, path: &Path) -> AppResult<CandidateFields> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::Internal("extraction worker pool is closed".to_string()))?;

        let document =
            ocr::extract_document_text(path, &self.ocr_config, Arc::clone(&self.recognizer)).await?;
        let fields = self.extractor.extract(&document.text);

        for field in fields.missing_labeled_fields() {
            observability::record_field_not_found(field);
        }
        Ok(fields)
    }

    /// Run the whole pipeline for one staged upload and return the new record id.
    ///
    /// The upload is published under its stored name whether or not extraction succeeds.
    #[tracing::instrument(
        name = "pipeline",
        skip(self, upload),
        fields(document = %upload.stored_path().display())
    )]
    pub async fn process_and_store(&self, upload: StagedUpload) -> AppResult<i64> {
        let start = Instant::now();

        let result = async {
            let extracted = self.extract_fields(upload.path()).await;
            let published = upload.publish();
            let fields = extracted?;
            published?;
            let record_id = db::insert_candidate(&self.pool, &fields).await.map_err(|e| {
                error_logging::log_database_error(&e, "insert_candidate", None);
                AppError::from(e)
            })?;
            Ok::<_, AppError>(record_id)
        }
        .await;

        let duration = start.elapsed();
        observability::record_pipeline_metrics(result.is_ok(), duration);
        match &result {
            Ok(record_id) => info!(
                record_id = %record_id,
                duration_ms = duration.as_millis() as u64,
                "Candidate record stored"
            ),
            Err(e) => error!(error = %e, kind = e.kind(), "Extraction pipeline failed"),
        }
        result
    }
}

/// Lifecycle of a queued extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(JobStatus::Queued),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One queued upload and its outcome
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub filename: String,
    pub record_id: Option<i64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(filename: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            filename,
            record_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Finished jobs kept for status lookups before the oldest are evicted
pub const DEFAULT_JOB_HISTORY: usize = 1000;

#[derive(Debug, Default)]
struct RegistryState {
    jobs: HashMap<Uuid, Job>,
    /// Finished job ids, oldest first
    finished: VecDeque<Uuid>,
}

/// In-memory job table; state is lost on restart.
///
/// Queued and processing jobs are always kept. Once more than `history` jobs
/// have finished, the ones that finished earliest are dropped and their status
/// URLs return 404.
#[derive(Debug)]
pub struct JobRegistry {
    state: RwLock<RegistryState>,
    history: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_history(DEFAULT_JOB_HISTORY)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: usize) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            history: history.max(1),
        }
    }

    /// Register a new job in `QUEUED` state
    pub fn create(&self, filename: &str) -> Job {
        let job = Job::new(filename.to_string());
        self.state.write().jobs.insert(job.id, job.clone());
        job
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.state.read().jobs.get(&id).cloned()
    }

    pub fn mark_processing(&self, id: Uuid) {
        self.update(id, |job| job.status = JobStatus::Processing);
    }

    pub fn mark_completed(&self, id: Uuid, record_id: i64) {
        self.update(id, |job| {
            job.status = JobStatus::Completed;
            job.record_id = Some(record_id);
        });
    }

    pub fn mark_failed(&self, id: Uuid, error: &str) {
        self.update(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
        });
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.state
            .read()
            .jobs
            .values()
            .filter(|job| job.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.state.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().jobs.is_empty()
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut Job)) {
        let mut state = self.state.write();
        let Some(job) = state.jobs.get_mut(&id) else {
            debug!(job_id = %id, "Ignoring update for unknown job");
            return;
        };

        let was_finished = job.status.is_finished();
        apply(job);
        job.updated_at = Utc::now();
        debug!(job_id = %id, status = %job.status, "Job status transition");
        let now_finished = job.status.is_finished();

        if !was_finished && now_finished {
            state.finished.push_back(id);
            while state.finished.len() > self.history {
                if let Some(evicted) = state.finished.pop_front() {
                    state.jobs.remove(&evicted);
                    debug!(job_id = %evicted, "Evicted finished job");
                }
            }
        }
    }
}

/// Work item handed to the extraction workers
#[derive(Debug)]
pub struct ExtractionJob {
    pub job_id: Uuid,
    pub upload: StagedUpload,
}

/// Why a job could not be queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    /// Every queue slot is taken
    Full,
    /// The workers have shut down
    Closed,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full => write!(f, "extraction queue is full"),
            EnqueueError::Closed => write!(f, "extraction queue is closed"),
        }
    }
}

impl std::error::Error for EnqueueError {}

/// Producer side of the bounded extraction queue
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<ExtractionJob>,
    registry: Arc<JobRegistry>,
    capacity: usize,
}

impl JobQueue {
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Register a job for `path` and hand it to the workers without waiting
    pub fn enqueue(&self, upload: StagedUpload, filename: &str) -> Result<Job, EnqueueError> {
        let job = self.registry.create(filename);

        let sent = self.sender.try_send(ExtractionJob {
            job_id: job.id,
            upload,
        });
        if let Err(e) = sent {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
                mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
            };
            self.registry.mark_failed(job.id, &reason.to_string());
            return Err(reason);
        }

        self.record_depth();
        info!(job_id = %job.id, filename = %filename, "Extraction job queued");
        Ok(job)
    }

    fn record_depth(&self) {
        observability::record_queue_metrics(
            JOB_QUEUE_NAME,
            self.capacity - self.sender.capacity(),
            self.capacity,
        );
    }
}

/// Consumer side: one of several workers sharing the queue receiver
pub struct ExtractionWorker {
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<ExtractionJob>>>,
    pipeline: Arc<ExtractionPipeline>,
    registry: Arc<JobRegistry>,
}

impl ExtractionWorker {
    pub async fn run(self) {
        info!(worker = self.id, "Extraction worker started");
        loop {
            let next = self.receiver.lock().await.recv().await;
            let Some(job) = next else { break };

            let span = tracing::info_span!("extraction_job", worker = self.id, job_id = %job.job_id);
            self.process_job(job).instrument(span).await;
        }
        info!(worker = self.id, "Extraction worker stopped: channel closed");
    }

    async fn process_job(&self, job: ExtractionJob) {
        self.registry.mark_processing(job.job_id);

        match self.pipeline.process_and_store(job.upload).await {
            Ok(record_id) => {
                self.registry.mark_completed(job.job_id, record_id);
                observability::record_upload_metrics("stored", "queued");
            }
            Err(e) => {
                // Callers only see the failure class, never field-level detail
                self.registry
                    .mark_failed(job.job_id, &format!("{} failure while processing upload", e.kind()));
                observability::record_upload_metrics("failed", "queued");
                observability::record_error_metrics(e.kind(), "worker");
            }
        }
    }
}

/// Create the job queue and spawn its workers
pub fn start_job_queue(
    pipeline: Arc<ExtractionPipeline>,
    registry: Arc<JobRegistry>,
    config: &PipelineConfig,
) -> (JobQueue, Vec<JoinHandle<()>>) {
    let capacity = config.queue_capacity.max(1);
    let (sender, receiver) = mpsc::channel(capacity);
    let receiver = Arc::new(Mutex::new(receiver));

    let handles = (0..config.workers.max(1))
        .map(|id| {
            let worker = ExtractionWorker {
                id,
                receiver: Arc::clone(&receiver),
                pipeline: Arc::clone(&pipeline),
                registry: Arc::clone(&registry),
            };
            tokio::spawn(worker.run())
        })
        .collect();

    info!(
        workers = config.workers,
        capacity = capacity,
        "Extraction job queue started"
    );
    (
        JobQueue {
            sender,
            registry,
            capacity,
        },
        handles,
    )
}
