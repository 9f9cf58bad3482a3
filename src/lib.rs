//! # notemark
//!
//! Batch conversion of document pages into structured Markdown notes using a
//! vision-language model behind an OpenAI-compatible endpoint.
//!
//! ## Pipeline
//!
//! ```text
//!   PDF document ──► rasterize ──► page PNGs (2x, zero-padded names)
//!                                     │
//!   page images ─────────────────────►│
//!                                     ▼
//!                        encode (base64 data URL)
//!                                     │
//!                                     ▼
//!               dispatch ── bounded fan-out, one call per page ──► inference
//!                                     │
//!                                     ▼
//!                      postprocess (Markdown cleanup)
//!                                     │
//!                                     ▼
//!          storage: <stem>.md per page + summary.json per job
//! ```
//!
//! Per-page failures are contained: a timeout or service error on one page
//! becomes a failure record in the summary while its siblings proceed. Only
//! job-level conditions (no credential, unwritable output) surface as errors
//! from [`run_batch`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use notemark::{rasterize, run_batch, BatchConfig};
//! use std::path::Path;
//!
//! # async fn demo() -> Result<(), notemark::NotemarkError> {
//! let config = BatchConfig::builder()
//!     .api_key(std::env::var("DASHSCOPE_API_KEY").unwrap_or_default())
//!     .output_root("output")
//!     .build()?;
//!
//! let pages = rasterize(Path::new("notes.pdf"), Path::new("output/job-1/pages")).await?;
//! let summary = run_batch("job-1", &pages, &config).await?;
//! println!("{}/{} pages succeeded", summary.success, summary.total);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod outcome;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod storage;

pub use config::{
    active_prompt, init_active_prompt, replace_active_prompt, BatchConfig, BatchConfigBuilder,
    PromptConfig, DEFAULT_API_BASE, DEFAULT_CONCURRENCY, DEFAULT_MODEL,
};
pub use error::{InferenceError, NotemarkError};
pub use job::{get_summary, run_batch};
pub use outcome::{JobSummary, PageOutcome, PageRecord};
pub use pipeline::dispatch::dispatch_pages;
pub use pipeline::encode::{encode_page, EncodedPage};
pub use pipeline::inference::{Transcription, VisionClient, VisionInference};
pub use pipeline::postprocess::clean_markdown;
pub use pipeline::rasterize::rasterize;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use storage::{FsResultStore, ResultStore};
