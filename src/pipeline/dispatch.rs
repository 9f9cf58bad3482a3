//! Bounded-concurrency fan-out of inference calls and ordered fan-in.
//!
//! All per-page calls flow through a single `buffer_unordered` gate, so at
//! most `concurrency` calls are in flight at once — the pipeline's one
//! backpressure mechanism. Completion order is irrelevant: every worker
//! returns a record keyed by its page's filename, and fan-in restores the
//! input ordering before the records are handed to the persister.
//!
//! The completion contract is exactly-once: the dispatcher returns only after
//! every page has produced precisely one [`PageRecord`], success or failure.
//! A failing page never aborts or delays its siblings.

use crate::outcome::{PageOutcome, PageRecord};
use crate::pipeline::encode;
use crate::pipeline::inference::VisionInference;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Run one inference call per page, at most `concurrency` in flight.
///
/// Returns exactly one record per input path, in input order.
pub async fn dispatch_pages(
    client: Arc<dyn VisionInference>,
    page_paths: &[PathBuf],
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> Vec<PageRecord> {
    let mut indexed: Vec<(usize, PageRecord)> = stream::iter(
        page_paths
            .iter()
            .enumerate()
            .map(|(idx, path)| {
                let client = Arc::clone(&client);
                let path = path.clone();
                let progress = progress.cloned();
                async move {
                    if let Some(ref cb) = progress {
                        cb.on_page_start(&page_filename(&path));
                    }
                    let record = process_one(&client, &path).await;
                    if let Some(ref cb) = progress {
                        match &record.outcome {
                            PageOutcome::Success { content, .. } => {
                                cb.on_page_complete(&record.filename, content.len())
                            }
                            PageOutcome::Error { error } => {
                                cb.on_page_error(&record.filename, error.clone())
                            }
                        }
                    }
                    (idx, record)
                }
            }),
    )
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    // Restore input order; completion order is an accident of network timing.
    indexed.sort_by_key(|(idx, _)| *idx);
    indexed.into_iter().map(|(_, record)| record).collect()
}

/// The association key for a page: its basename.
fn page_filename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Encode and transcribe one page, containing every failure as a record.
async fn process_one(client: &Arc<dyn VisionInference>, path: &Path) -> PageRecord {
    let filename = page_filename(path);

    let page = match encode::encode_page(path) {
        Ok(page) => page,
        Err(e) => {
            return PageRecord {
                filename,
                outcome: PageOutcome::Error {
                    error: e.to_string(),
                },
            }
        }
    };

    match client.transcribe(&page).await {
        Ok(t) => {
            debug!("{}: {} chars, {} tokens", filename, t.text.len(), t.tokens);
            PageRecord {
                filename,
                outcome: PageOutcome::Success {
                    content: t.text,
                    tokens: t.tokens,
                },
            }
        }
        Err(e) => PageRecord {
            filename,
            outcome: PageOutcome::Error {
                error: e.to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::pipeline::encode::EncodedPage;
    use crate::pipeline::inference::Transcription;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Double that answers after a per-page delay, failing named pages.
    struct ScriptedClient {
        fail: Vec<String>,
        delay_ms: u64,
    }

    #[async_trait]
    impl VisionInference for ScriptedClient {
        async fn transcribe(&self, page: &EncodedPage) -> Result<Transcription, InferenceError> {
            // First page waits longest so completion order inverts input order.
            let extra = if page.filename.contains('1') { 30 } else { 0 };
            tokio::time::sleep(Duration::from_millis(self.delay_ms + extra)).await;
            if self.fail.iter().any(|f| f == &page.filename) {
                Err(InferenceError::Timeout { secs: 120 })
            } else {
                Ok(Transcription {
                    text: format!("## {}", page.filename),
                    tokens: 10,
                })
            }
        }
    }

    fn write_pages(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| {
                let p = dir.join(n);
                std::fs::write(&p, b"png-bytes").unwrap();
                p
            })
            .collect()
    }

    #[tokio::test]
    async fn one_record_per_page_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_pages(dir.path(), &["page_1.png", "page_2.png", "page_3.png"]);
        let client = Arc::new(ScriptedClient {
            fail: vec![],
            delay_ms: 5,
        });

        let records = dispatch_pages(client, &paths, 3, None).await;

        let names: Vec<&str> = records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["page_1.png", "page_2.png", "page_3.png"]);
        assert!(records.iter().all(|r| r.outcome.is_success()));
    }

    #[tokio::test]
    async fn failure_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_pages(dir.path(), &["page_1.png", "page_2.png", "page_3.png"]);
        let client = Arc::new(ScriptedClient {
            fail: vec!["page_2.png".into()],
            delay_ms: 1,
        });

        let records = dispatch_pages(client, &paths, 3, None).await;

        assert_eq!(records.len(), 3);
        assert!(records[0].outcome.is_success());
        assert!(!records[1].outcome.is_success());
        assert!(records[2].outcome.is_success());
    }

    #[tokio::test]
    async fn progress_fires_one_start_and_one_settle_per_page() {
        use crate::progress::BatchProgressCallback;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counting {
            starts: AtomicUsize,
            completes: AtomicUsize,
            errors: AtomicUsize,
        }
        impl BatchProgressCallback for Counting {
            fn on_page_start(&self, _filename: &str) {
                self.starts.fetch_add(1, Ordering::SeqCst);
            }
            fn on_page_complete(&self, _filename: &str, _content_len: usize) {
                self.completes.fetch_add(1, Ordering::SeqCst);
            }
            fn on_page_error(&self, _filename: &str, _error: String) {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let paths = write_pages(dir.path(), &["page_1.png", "page_2.png", "page_3.png"]);
        let client = Arc::new(ScriptedClient {
            fail: vec!["page_2.png".into()],
            delay_ms: 1,
        });
        let counting = Arc::new(Counting {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        });
        let progress: ProgressCallback = counting.clone();

        dispatch_pages(client, &paths, 3, Some(&progress)).await;

        assert_eq!(counting.starts.load(Ordering::SeqCst), 3);
        assert_eq!(counting.completes.load(Ordering::SeqCst), 2);
        assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreadable_page_becomes_failure_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_pages(dir.path(), &["page_1.png"]);
        paths.push(dir.path().join("missing.png"));

        let client = Arc::new(ScriptedClient {
            fail: vec![],
            delay_ms: 0,
        });
        let records = dispatch_pages(client, &paths, 3, None).await;

        assert_eq!(records.len(), 2);
        assert!(records[0].outcome.is_success());
        match &records[1].outcome {
            PageOutcome::Error { error } => assert!(error.contains("missing.png")),
            other => panic!("expected error record, got {other:?}"),
        }
    }
}
