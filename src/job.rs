//! Batch orchestration: the one entry point that wires the pipeline stages
//! together and persists their output.
//!
//! A job is identified by a caller-chosen id. [`run_batch`] resolves the
//! prompt and client once, dispatches every page through the bounded gate,
//! cleans successful transcriptions, and writes the per-page artifacts plus
//! the `summary.json` record. [`get_summary`] reads a persisted summary back
//! without touching the pipeline.

use crate::config::{active_prompt, BatchConfig};
use crate::error::NotemarkError;
use crate::outcome::{JobSummary, PageOutcome, PageRecord};
use crate::pipeline::dispatch::dispatch_pages;
use crate::pipeline::inference::{VisionClient, VisionInference};
use crate::pipeline::postprocess::clean_markdown;
use crate::storage::{FsResultStore, ResultStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Run one batch: one inference call per page, results persisted under
/// `<output_root>/<job_id>/`.
///
/// Every page produces exactly one record, success or failure; a failing page
/// never affects its siblings. The returned summary lists records in input
/// order and is identical to the persisted `summary.json`.
///
/// # Errors
/// Fails only on job-level conditions: no usable client credential, or an
/// output directory that cannot be written. Per-page inference failures are
/// contained in the summary, not raised.
pub async fn run_batch(
    job_id: &str,
    page_paths: &[PathBuf],
    config: &BatchConfig,
) -> Result<JobSummary, NotemarkError> {
    let prompt = config.prompt.clone().unwrap_or_else(active_prompt);

    let client: Arc<dyn VisionInference> = match &config.client {
        Some(client) => Arc::clone(client),
        None => Arc::new(VisionClient::from_config(config, &prompt)?),
    };

    info!(
        "Starting job '{}': {} pages, concurrency {}",
        job_id,
        page_paths.len(),
        config.concurrency
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_batch_start(page_paths.len());
    }

    let records = dispatch_pages(
        client,
        page_paths,
        config.concurrency,
        config.progress_callback.as_ref(),
    )
    .await;

    let records: Vec<PageRecord> = records
        .into_iter()
        .map(|record| match record.outcome {
            PageOutcome::Success { content, tokens } => PageRecord {
                filename: record.filename,
                outcome: PageOutcome::Success {
                    content: clean_markdown(&content),
                    tokens,
                },
            },
            error => PageRecord {
                filename: record.filename,
                outcome: error,
            },
        })
        .collect();

    let store = FsResultStore::new(&config.output_root);
    for record in &records {
        if let PageOutcome::Success { content, .. } = &record.outcome {
            store.write_page(job_id, &record.filename, content)?;
        }
    }

    let summary = JobSummary::from_records(records);
    store.write_summary(job_id, &summary)?;

    info!(
        "Job '{}' complete: {}/{} pages succeeded",
        job_id, summary.success, summary.total
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_batch_complete(summary.total, summary.success);
    }

    Ok(summary)
}

/// Read a previously persisted job summary from `<output_root>/<job_id>/`.
pub fn get_summary(output_root: &Path, job_id: &str) -> Result<JobSummary, NotemarkError> {
    FsResultStore::new(output_root).read_summary(job_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_batch_writes_empty_summary() {
        let dir = tempfile::tempdir().unwrap();
        let config = BatchConfig::builder()
            .api_key("sk-test")
            .output_root(dir.path())
            .build()
            .unwrap();

        let summary = run_batch("empty-job", &[], &config).await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success, 0);
        assert!(summary.failed.is_empty());

        let back = get_summary(dir.path(), "empty-job").unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn unknown_job_summary_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = get_summary(dir.path(), "never-ran").unwrap_err();
        assert!(matches!(err, NotemarkError::SummaryNotFound { .. }));
    }
}
