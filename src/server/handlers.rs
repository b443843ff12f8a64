use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::errors::{AppError, AppResult};
use crate::observability;
use crate::pipeline::EnqueueError;
use crate::server::state::AppState;
use crate::server::templates;

/// Multipart field that carries the document
pub const FILE_FIELD: &str = "file";

#[derive(Serialize)]
pub struct UploadAccepted {
    pub job_id: String,
    pub status_url: String,
}

#[derive(Serialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub status: String,
    pub filename: String,
    pub record_id: Option<i64>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub async fn upload_form() -> Html<String> {
    Html(templates::upload_page())
}

fn multipart_rejection(err: MultipartError) -> Response {
    tracing::warn!(error = %err, "Rejected malformed upload");
    observability::record_upload_metrics("rejected", "any");
    (err.status(), err.body_text()).into_response()
}

fn validation_rejection(message: &str) -> Response {
    observability::record_upload_metrics("rejected", "any");
    AppError::Validation(message.to_string()).into_response()
}

#[tracing::instrument(skip(state, multipart))]
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(Option<String>, Bytes)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_rejection(e),
        };

        let is_file = field.name() == Some(FILE_FIELD) && upload.is_none();
        let file_name = field.file_name().map(str::to_string);
        // Other fields are drained and ignored
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => return multipart_rejection(e),
        };
        if is_file {
            upload = Some((file_name, data));
        }
    }

    let Some((file_name, data)) = upload else {
        return validation_rejection("No file uploaded");
    };
    let Some(file_name) = file_name.filter(|name| !name.is_empty()) else {
        return validation_rejection("No file selected");
    };

    tracing::info!(filename = %file_name, bytes = data.len(), mode = state.mode().as_str(), "Upload received");

    let upload = match state.pipeline.save_upload(&file_name, &data).await {
        Ok(upload) => upload,
        Err(e) => return e.into_response(),
    };

    match &state.queue {
        None => match state.pipeline.process_and_store(upload).await {
            Ok(_) => {
                observability::record_upload_metrics("stored", "sync");
                Redirect::to("/records").into_response()
            }
            Err(e) => {
                observability::record_upload_metrics("failed", "sync");
                e.into_response()
            }
        },
        Some(queue) => match queue.enqueue(upload, &file_name) {
            Ok(job) => {
                observability::record_upload_metrics("accepted", "queued");
                let status_url = format!("/jobs/{}", job.id);
                (
                    StatusCode::ACCEPTED,
                    [(header::LOCATION, status_url.clone())],
                    Json(UploadAccepted {
                        job_id: job.id.to_string(),
                        status_url,
                    }),
                )
                    .into_response()
            }
            Err(EnqueueError::Full) => {
                observability::record_upload_metrics("rejected", "queued");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Too many uploads waiting, try again later",
                )
                    .into_response()
            }
            Err(e @ EnqueueError::Closed) => AppError::Internal(e.to_string()).into_response(),
        },
    }
}

pub async fn records(State(state): State<AppState>) -> AppResult<Html<String>> {
    let records = db::list_candidates(state.pipeline.pool()).await?;
    Ok(Html(templates::records_page(&records)))
}

#[tracing::instrument(skip(state))]
pub async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    let id = match Uuid::parse_str(&job_id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid job ID: {}", job_id),
                }),
            )
                .into_response();
        }
    };

    match state.jobs.get(id) {
        Some(job) => (
            StatusCode::OK,
            Json(JobStatusResponse {
                id: job.id.to_string(),
                status: job.status.as_str().to_string(),
                filename: job.filename,
                record_id: job.record_id,
                error: job.error,
            }),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Job not found: {}", job_id),
            }),
        )
            .into_response(),
    }
}

pub async fn health(State(state): State<AppState>) -> Response {
    match db::ping(state.pipeline.pool()).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable").into_response()
        }
    }
}
