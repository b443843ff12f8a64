//! End-to-end tests of the HTTP surface with a canned recognizer.


use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use candidate_intake::config::PipelineConfig;
use candidate_intake::db;
use candidate_intake::extraction::NOT_FOUND;
use candidate_intake::pipeline::{self, JobRegistry};
use candidate_intake::server::{self, AppState};
use tower::ServiceExt;

use test_helpers::{
    multipart_body, multipart_content_type, sample_png, setup_test_database, test_pipeline,
    FailingRecognizer, FakeRecognizer,
};

const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(body))
        .expect("valid request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn sync_app(pipeline: Arc<candidate_intake::ExtractionPipeline>) -> Router {
    server::create_router(AppState::synchronous(pipeline), MAX_UPLOAD_BYTES)
}

#[tokio::test]
async fn test_upload_form_is_served() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let app = sync_app(test_pipeline(pool, dir.path(), Arc::new(FakeRecognizer::new(""))));

    let response = app.oneshot(get_request("/")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("name=\"file\""));
    Ok(())
}

#[tokio::test]
async fn test_upload_without_file_part_is_rejected() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let app = sync_app(test_pipeline(
        pool.clone(),
        dir.path(),
        Arc::new(FakeRecognizer::new("Name: Bob\n")),
    ));

    let body = multipart_body("comment", None, b"hello");
    let response = app.oneshot(upload_request(body)).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "No file uploaded");
    assert_eq!(db::count_candidates(&pool).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_upload_with_empty_filename_is_rejected() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let app = sync_app(test_pipeline(
        pool.clone(),
        dir.path(),
        Arc::new(FakeRecognizer::new("Name: Bob\n")),
    ));

    let body = multipart_body("file", Some(""), b"");
    let response = app.oneshot(upload_request(body)).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "No file selected");
    assert_eq!(db::count_candidates(&pool).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_sync_upload_stores_record_and_redirects() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let upload_dir = tempfile::tempdir()?;
    let app = sync_app(test_pipeline(
        pool.clone(),
        upload_dir.path(),
        Arc::new(FakeRecognizer::new("Name: Bob\nDOB: 1990-01-01\n")),
    ));

    let body = multipart_body("file", Some("form.png"), &sample_png());
    let response = app.oneshot(upload_request(body)).await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).map(|v| v.as_bytes()),
        Some(&b"/records"[..])
    );

    let records = db::list_candidates(&pool).await?;
    assert_eq!(records.len(), 1);
    let fields = &records[0].fields;
    assert_eq!(fields.name, "Bob");
    assert_eq!(fields.dob, "1990-01-01");
    assert_eq!(fields.email, NOT_FOUND);
    assert_eq!(fields.phone, NOT_FOUND);
    assert_eq!(fields.address, NOT_FOUND);
    assert_eq!(fields.training, "");
    assert_eq!(fields.certifications, "");
    assert_eq!(fields.family, "");

    assert!(upload_dir.path().join("form.png").exists());
    drop(dir);
    Ok(())
}

#[tokio::test]
async fn test_sync_upload_with_ocr_failure_returns_server_error() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let app = sync_app(test_pipeline(
        pool.clone(),
        dir.path(),
        Arc::new(FailingRecognizer),
    ));

    let body = multipart_body("file", Some("form.png"), &sample_png());
    let response = app.oneshot(upload_request(body)).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(db::count_candidates(&pool).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_undecodable_upload_is_not_stored() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let app = sync_app(test_pipeline(
        pool.clone(),
        dir.path(),
        Arc::new(FakeRecognizer::new("Name: Bob\n")),
    ));

    let body = multipart_body("file", Some("notes.png"), b"definitely not an image");
    let response = app.oneshot(upload_request(body)).await?;

    assert!(response.status().is_server_error());
    assert_eq!(db::count_candidates(&pool).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let pipeline = test_pipeline(
        pool.clone(),
        dir.path(),
        Arc::new(FakeRecognizer::new("Name: Bob\n")),
    );
    let app = server::create_router(AppState::synchronous(pipeline), 64);

    let body = multipart_body("file", Some("form.png"), &sample_png());
    let response = app.oneshot(upload_request(body)).await?;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(db::count_candidates(&pool).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_records_page_escapes_stored_values() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let app = sync_app(test_pipeline(
        pool.clone(),
        dir.path(),
        Arc::new(FakeRecognizer::new("Name: <i>Mallory</i>\n")),
    ));

    let body = multipart_body("file", Some("form.png"), &sample_png());
    let response = app.clone().oneshot(upload_request(body)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app.oneshot(get_request("/records")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("&lt;i&gt;Mallory&lt;/i&gt;"));
    assert!(!html.contains("<i>Mallory</i>"));
    Ok(())
}

#[tokio::test]
async fn test_queued_upload_completes_job() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let pipeline = test_pipeline(
        pool.clone(),
        dir.path(),
        Arc::new(FakeRecognizer::new("Name: Bob\nDOB: 1990-01-01\n")),
    );
    let (queue, _workers) = pipeline::start_job_queue(
        Arc::clone(&pipeline),
        Arc::new(JobRegistry::new()),
        &PipelineConfig::default(),
    );
    let app = server::create_router(AppState::queued(pipeline, queue), MAX_UPLOAD_BYTES);

    let body = multipart_body("file", Some("form.png"), &sample_png());
    let response = app.clone().oneshot(upload_request(body)).await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let accepted: serde_json::Value = serde_json::from_str(&body_string(response).await)?;
    let status_url = accepted["status_url"]
        .as_str()
        .expect("status_url in response")
        .to_string();
    assert_eq!(status_url, format!("/jobs/{}", accepted["job_id"].as_str().unwrap()));

    let mut last_status = String::new();
    for _ in 0..100 {
        let response = app.clone().oneshot(get_request(&status_url)).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let job: serde_json::Value = serde_json::from_str(&body_string(response).await)?;
        last_status = job["status"].as_str().unwrap_or_default().to_string();
        if last_status == "COMPLETED" {
            assert_eq!(job["record_id"].as_i64(), Some(1));
            break;
        }
        assert_ne!(last_status, "FAILED", "job failed: {job}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(last_status, "COMPLETED");

    let records = db::list_candidates(&pool).await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fields.name, "Bob");
    Ok(())
}

#[tokio::test]
async fn test_job_status_rejects_bad_and_unknown_ids() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let app = sync_app(test_pipeline(pool, dir.path(), Arc::new(FakeRecognizer::new(""))));

    let response = app.clone().oneshot(get_request("/jobs/not-a-uuid")).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let unknown = format!("/jobs/{}", uuid::Uuid::new_v4());
    let response = app.oneshot(get_request(&unknown)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: serde_json::Value = serde_json::from_str(&body_string(response).await)?;
    assert!(error["error"].as_str().unwrap_or_default().contains("Job not found"));
    Ok(())
}

#[tokio::test]
async fn test_health_reports_database_state() -> Result<()> {
    let (dir, pool) = setup_test_database().await?;
    let app = sync_app(test_pipeline(
        pool.clone(),
        dir.path(),
        Arc::new(FakeRecognizer::new("")),
    ));

    let response = app.clone().oneshot(get_request("/health")).await?;
    assert_eq!(response.status(), StatusCode::OK);

    pool.close().await;
    let response = app.oneshot(get_request("/health")).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}
