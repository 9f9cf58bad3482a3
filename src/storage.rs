//! Persistence of job results: per-page Markdown artifacts and the summary.
//!
//! Job state lives on the filesystem — one directory per job id holding
//! `<page-stem>.md` files and a `summary.json`. The [`ResultStore`] trait
//! isolates that choice behind a small interface so an in-memory or database
//! backend could be substituted without touching pipeline logic.

use crate::error::NotemarkError;
use crate::outcome::JobSummary;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage interface for job output artifacts.
pub trait ResultStore: Send + Sync {
    /// Write one successful page's Markdown artifact.
    ///
    /// The artifact is named after the page filename's stem with an `.md`
    /// extension and is prefixed with a heading line carrying the original
    /// filename.
    fn write_page(&self, job_id: &str, filename: &str, content: &str)
        -> Result<(), NotemarkError>;

    /// Persist the job summary. Called exactly once, after all dispatch work
    /// for the job completes; the artifact is immutable afterwards.
    fn write_summary(&self, job_id: &str, summary: &JobSummary) -> Result<(), NotemarkError>;

    /// Read back a persisted summary.
    ///
    /// Idempotent: repeated reads return identical content until a new run
    /// of the same job id overwrites it.
    fn read_summary(&self, job_id: &str) -> Result<JobSummary, NotemarkError>;
}

/// Filesystem-backed [`ResultStore`] rooted at an output directory.
#[derive(Debug, Clone)]
pub struct FsResultStore {
    root: PathBuf,
}

impl FsResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding all artifacts of one job.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Path of the summary artifact for one job.
    pub fn summary_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join("summary.json")
    }

    fn ensure_job_dir(&self, job_id: &str) -> Result<PathBuf, NotemarkError> {
        let dir = self.job_dir(job_id);
        std::fs::create_dir_all(&dir).map_err(|e| NotemarkError::OutputWrite {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }
}

/// Artifact filename for a page: the filename's stem plus `.md`.
pub(crate) fn page_artifact_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    format!("{stem}.md")
}

impl ResultStore for FsResultStore {
    fn write_page(
        &self,
        job_id: &str,
        filename: &str,
        content: &str,
    ) -> Result<(), NotemarkError> {
        let dir = self.ensure_job_dir(job_id)?;
        let path = dir.join(page_artifact_name(filename));
        let body = format!("# {filename}\n\n{content}");
        std::fs::write(&path, body).map_err(|e| NotemarkError::OutputWrite {
            path: path.clone(),
            source: e,
        })?;
        debug!("Wrote page artifact {}", path.display());
        Ok(())
    }

    fn write_summary(&self, job_id: &str, summary: &JobSummary) -> Result<(), NotemarkError> {
        let dir = self.ensure_job_dir(job_id)?;
        let path = dir.join("summary.json");
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| NotemarkError::Internal(format!("serialise summary: {}", e)))?;

        // Atomic write: temp file + rename, so a crash mid-write can never
        // leave a summary that parses but misses pages.
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| NotemarkError::OutputWrite {
            path: path.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|e| NotemarkError::OutputWrite {
            path: path.clone(),
            source: e,
        })?;
        debug!("Wrote summary {}", path.display());
        Ok(())
    }

    fn read_summary(&self, job_id: &str) -> Result<JobSummary, NotemarkError> {
        let path = self.summary_path(job_id);
        if !path.exists() {
            return Err(NotemarkError::SummaryNotFound {
                job_id: job_id.to_string(),
            });
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| NotemarkError::SummaryRead {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| NotemarkError::SummaryRead {
            path,
            detail: e.to_string(),
        })
    }
}
