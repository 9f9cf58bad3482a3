//! Progress-callback trait for per-page batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! real-time events as the dispatcher settles each page.
//!
//! Callbacks are the least-invasive integration point: callers can forward
//! events to a channel, a WebSocket, or a terminal progress bar without the
//! library knowing how the host application communicates. The trait is
//! `Send + Sync` because pages settle concurrently.

use std::sync::Arc;

/// Called by the batch pipeline as each page settles.
///
/// Events are keyed by the page's filename, matching how results are
/// associated in the summary. `on_page_complete` and `on_page_error` may be
/// called concurrently from different tasks; implementations must guard
/// shared mutable state.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any inference call is issued.
    fn on_batch_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's inference call is issued.
    fn on_page_start(&self, filename: &str) {
        let _ = filename;
    }

    /// Called when a page's call returns content.
    fn on_page_complete(&self, filename: &str, content_len: usize) {
        let _ = (filename, content_len);
    }

    /// Called when a page's call fails.
    fn on_page_error(&self, filename: &str, error: String) {
        let _ = (filename, error);
    }

    /// Called once after every page has produced exactly one result.
    fn on_batch_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        final_success: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_page_start(&self, _filename: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _filename: &str, _content_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, _filename: &str, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.final_success.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_page_start("page_1.png");
        cb.on_page_complete("page_1.png", 42);
        cb.on_page_error("page_2.png", "timeout".into());
        cb.on_batch_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            final_success: AtomicUsize::new(0),
        };
        cb.on_batch_start(3);
        for name in ["a.png", "b.png", "c.png"] {
            cb.on_page_start(name);
        }
        cb.on_page_complete("a.png", 10);
        cb.on_page_complete("b.png", 20);
        cb.on_page_error("c.png", "boom".into());
        cb.on_batch_complete(3, 2);

        assert_eq!(cb.starts.load(Ordering::SeqCst), 3);
        assert_eq!(cb.completes.load(Ordering::SeqCst), 2);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
        assert_eq!(cb.final_success.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopProgressCallback>();
        let cb: Arc<dyn BatchProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
    }
}
