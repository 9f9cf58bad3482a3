//! Error types for the notemark library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`NotemarkError`] — **Fatal**: the batch cannot proceed at all (document
//!   cannot be rasterised, no API key, summary missing). Returned as
//!   `Err(NotemarkError)` from the top-level entry points in [`crate::job`].
//!
//! * [`InferenceError`] — **Contained**: a single page's inference call failed
//!   (timeout, transport error, structured error payload from the service).
//!   Recorded as that page's `error` string in the [`crate::outcome::JobSummary`]
//!   and never allowed to abort sibling pages.
//!
//! The separation is the pipeline's failure-isolation contract: nothing below
//! the page-call boundary terminates the dispatcher, while anything at or
//! above the job boundary surfaces whole.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the notemark library.
///
/// Per-page inference failures use [`InferenceError`] and are stored inside
/// the job summary rather than propagated here.
#[derive(Debug, Error)]
pub enum NotemarkError {
    // ── Rasterisation errors ──────────────────────────────────────────────
    /// The input document cannot be opened or parsed.
    ///
    /// Raised before any dispatch begins; a rasterisation failure is always
    /// whole-document, never per-page.
    #[error("Cannot open document '{path}': {detail}")]
    DocumentFormat { path: PathBuf, detail: String },

    /// A page failed to render or its image file could not be written.
    ///
    /// Also fatal for the whole rasterisation step — any partial page files
    /// are removed before this is returned.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterizeFailed { page: usize, detail: String },

    /// Could not bind to a pdfium shared library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Job errors ────────────────────────────────────────────────────────
    /// No API credential was supplied for the inference endpoint.
    #[error("No API key configured for the inference endpoint.\nSet DASHSCOPE_API_KEY or pass one via BatchConfig::builder().api_key(..).")]
    MissingApiKey,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Result store errors ───────────────────────────────────────────────
    /// A summary was requested for a job id with no persisted summary.
    #[error("No summary found for job '{job_id}'")]
    SummaryNotFound { job_id: String },

    /// The persisted summary exists but could not be read or parsed.
    #[error("Failed to read summary '{path}': {detail}")]
    SummaryRead { path: PathBuf, detail: String },

    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A contained error for a single page's inference call.
///
/// Converted to a human-readable `error` string in the page's summary record.
/// The batch continues regardless of how many pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum InferenceError {
    /// The call exceeded the per-call timeout.
    #[error("inference call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Network-level failure (connect, TLS, read).
    #[error("transport error: {detail}")]
    Transport { detail: String },

    /// The service returned a structured error payload instead of content.
    ///
    /// The service's message is preserved verbatim for diagnostics.
    #[error("service error: {message}")]
    Service { message: String },

    /// The response was 2xx but not in the expected shape.
    #[error("malformed response: {detail}")]
    Malformed { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_format_display() {
        let e = NotemarkError::DocumentFormat {
            path: PathBuf::from("notes.pdf"),
            detail: "bad xref table".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.pdf"), "got: {msg}");
        assert!(msg.contains("bad xref table"));
    }

    #[test]
    fn summary_not_found_display() {
        let e = NotemarkError::SummaryNotFound {
            job_id: "j-42".into(),
        };
        assert!(e.to_string().contains("j-42"));
    }

    #[test]
    fn service_error_preserves_message_verbatim() {
        let e = InferenceError::Service {
            message: "Free allocated quota exceeded.".into(),
        };
        assert!(e.to_string().contains("Free allocated quota exceeded."));
    }

    #[test]
    fn timeout_display() {
        let e = InferenceError::Timeout { secs: 120 };
        assert!(e.to_string().contains("120s"));
    }

    #[test]
    fn inference_error_round_trips_through_json() {
        let e = InferenceError::Transport {
            detail: "connection reset".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: InferenceError = serde_json::from_str(&json).unwrap();
        assert!(back.to_string().contains("connection reset"));
    }
}
