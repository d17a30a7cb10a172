//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ScraperConfigBuilder::progress_callback`] to receive
//! events as the batch helpers process each certificate.
//!
//! # Why callbacks instead of channels?
//!
//! A callback is the least-invasive integration point: callers can forward
//! events to a channel, a log sink or a terminal progress bar without the
//! library knowing how the host application communicates. The trait is
//! `Send + Sync` because documents are processed concurrently.
//!
//! # Example
//!
//! ```rust
//! use sat_csf_scraper::{BatchProgressCallback, ScraperConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     scraped: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, _index: usize, _total: usize, name: &str, scraped: bool) {
//!         if scraped {
//!             self.scraped.fetch_add(1, Ordering::SeqCst);
//!         }
//!         eprintln!("done: {name}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { scraped: AtomicUsize::new(0) });
//!
//! let config = ScraperConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch helpers as they process each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_document_start` and `on_document_complete` may
/// be called concurrently from different tasks; protect shared mutable state
/// with `Mutex` or atomics.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any document is processed.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document starts.
    ///
    /// # Arguments
    /// * `index`: 0-based position of the document in the batch
    /// * `total`: batch size
    /// * `name`: display filename
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document's record is ready.
    ///
    /// # Arguments
    /// * `scraped`: whether web scraping succeeded for this document
    fn on_document_complete(&self, index: usize, total: usize, name: &str, scraped: bool) {
        let _ = (index, total, name, scraped);
    }

    /// Called once after every document has produced a record.
    fn on_batch_complete(&self, total_documents: usize, scraped_count: usize) {
        let _ = (total_documents, scraped_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScraperConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        scraped: AtomicUsize,
        batch_total: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total_documents: usize) {
            self.batch_total.store(total_documents, Ordering::SeqCst);
        }

        fn on_document_start(&self, _index: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _index: usize, _total: usize, _name: &str, scraped: bool) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            if scraped {
                self.scraped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_document_start(0, 3, "a.pdf");
        cb.on_document_complete(0, 3, "a.pdf", false);
        cb.on_batch_complete(3, 0);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(2);
        tracker.on_document_start(0, 2, "a.pdf");
        tracker.on_document_complete(0, 2, "a.pdf", true);
        tracker.on_document_start(1, 2, "b.pdf");
        tracker.on_document_complete(1, 2, "b.pdf", false);

        assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.scraped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
        cb.on_document_complete(0, 1, "x.pdf", true);
    }
}
