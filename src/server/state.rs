use std::sync::Arc;

use crate::config::PipelineMode;
use crate::pipeline::{ExtractionPipeline, JobQueue, JobRegistry};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ExtractionPipeline>,
    pub jobs: Arc<JobRegistry>,
    /// Present only in queued mode
    pub queue: Option<JobQueue>,
}

impl AppState {
    /// Uploads are processed inside the request
    pub fn synchronous(pipeline: Arc<ExtractionPipeline>) -> Self {
        Self {
            pipeline,
            jobs: Arc::new(JobRegistry::new()),
            queue: None,
        }
    }

    /// Uploads are handed to the background workers behind `queue`
    pub fn queued(pipeline: Arc<ExtractionPipeline>, queue: JobQueue) -> Self {
        Self {
            pipeline,
            jobs: Arc::clone(queue.registry()),
            queue: Some(queue),
        }
    }

    pub fn mode(&self) -> PipelineMode {
        if self.queue.is_some() {
            PipelineMode::Queued
        } else {
            PipelineMode::Sync
        }
    }
}
