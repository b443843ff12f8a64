
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use candidate_intake::config::PipelineConfig;
use candidate_intake::db;
use candidate_intake::pipeline::{self, JobRegistry, JobStatus};

use test_helpers::{sample_png_sized, setup_test_database, test_pipeline, PageSizeRecognizer};

#[tokio::test]
async fn test_same_name_uploads_keep_their_own_bytes() -> Result<()> {
    let (_db_dir, pool) = setup_test_database().await?;
    let upload_dir = tempfile::tempdir()?;
    let pipeline = test_pipeline(pool.clone(), upload_dir.path(), Arc::new(PageSizeRecognizer));

    let first_png = sample_png_sized(48, 32);
    let second_png = sample_png_sized(64, 32);
    let first = pipeline.save_upload("form.png", &first_png).await?;
    let second = pipeline.save_upload("form.png", &second_png).await?;
    assert_ne!(first.path(), second.path());

    let first_id = pipeline.process_and_store(first).await?;
    let second_id = pipeline.process_and_store(second).await?;

    let records = db::list_candidates(&pool).await?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, first_id);
    assert_eq!(records[0].fields.name, "48x32");
    assert_eq!(records[1].id, second_id);
    assert_eq!(records[1].fields.name, "64x32");

    // The last processed upload owns the stored name and no staging files remain
    let stored = upload_dir.path().join("form.png");
    assert_eq!(std::fs::read(&stored)?, second_png);
    assert_eq!(std::fs::read_dir(upload_dir.path())?.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_queued_same_name_uploads_are_extracted_separately() -> Result<()> {
    let (_db_dir, pool) = setup_test_database().await?;
    let upload_dir = tempfile::tempdir()?;
    let pipeline = test_pipeline(pool.clone(), upload_dir.path(), Arc::new(PageSizeRecognizer));
    let (queue, _workers) = pipeline::start_job_queue(
        Arc::clone(&pipeline),
        Arc::new(JobRegistry::new()),
        &PipelineConfig::default(),
    );

    let mut jobs = Vec::new();
    for width in [40, 56, 72] {
        let upload = pipeline
            .save_upload("form.png", &sample_png_sized(width, 32))
            .await?;
        jobs.push(queue.enqueue(upload, "form.png")?);
    }

    for _ in 0..200 {
        let finished = jobs
            .iter()
            .filter_map(|job| queue.registry().get(job.id))
            .filter(|job| job.status.is_finished())
            .count();
        if finished == jobs.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(queue.registry().count_with_status(JobStatus::Completed), 3);

    let mut names: Vec<String> = db::list_candidates(&pool)
        .await?
        .into_iter()
        .map(|record| record.fields.name)
        .collect();
    names.sort();
    assert_eq!(names, ["40x32", "56x32", "72x32"]);
    Ok(())
}

#[tokio::test]
async fn test_failed_extraction_still_keeps_the_upload() -> Result<()> {
    let (_db_dir, pool) = setup_test_database().await?;
    let upload_dir = tempfile::tempdir()?;
    let pipeline = test_pipeline(pool.clone(), upload_dir.path(), Arc::new(PageSizeRecognizer));

    let upload = pipeline.save_upload("notes.png", b"not an image").await?;
    assert!(pipeline.process_and_store(upload).await.is_err());

    assert_eq!(db::count_candidates(&pool).await?, 0);
    assert!(upload_dir.path().join("notes.png").exists());
    Ok(())
}
