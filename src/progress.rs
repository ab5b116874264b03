//! Progress-callback trait for per-page note-generation events.
//!
//! Inject an [`Arc<dyn NotesProgressCallback>`] via
//! [`crate::config::NotesConfigBuilder::progress_callback`] to receive events
//! as the generator walks the pages. The core never touches the terminal; a
//! progress bar, a log shipper or a test recorder all subscribe the same way.
//!
//! # Example
//!
//! ```rust
//! use pdf2notes::{NotesProgressCallback, NotesConfig, PageOutcome, UsageStats};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl NotesProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page: usize, total: usize, outcome: &PageOutcome, usage: &UsageStats) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("page {page} ({done}/{total}) ok={} tokens={}", outcome.is_success(), usage.total_tokens);
//!     }
//! }
//!
//! let config = NotesConfig::builder()
//!     .api_key("sk-...")
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::generate::{PageOutcome, RunSummary};
use crate::usage::UsageStats;
use std::sync::Arc;

/// Called by [`crate::generate::NoteGenerator`] as it processes each page.
///
/// Pages are processed sequentially, so events for one run arrive in page
/// order and never overlap. All methods default to no-ops.
pub trait NotesProgressCallback: Send + Sync {
    /// Called once before the first page, with the number of pages to process.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the model request for a page is sent.
    ///
    /// # Arguments
    /// * `page`        — 1-indexed page number as it appears in the output
    /// * `total_pages` — pages in this run
    fn on_page_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called after a page reaches a terminal state and its note is on disk.
    ///
    /// Under the `abort` strategy the failing page still gets this event,
    /// although nothing was written for it.
    ///
    /// # Arguments
    /// * `outcome` — success with the interpretation, or the page error
    /// * `usage`   — cumulative usage snapshot after this page
    fn on_page_complete(
        &self,
        page: usize,
        total_pages: usize,
        outcome: &PageOutcome,
        usage: &UsageStats,
    ) {
        let _ = (page, total_pages, outcome, usage);
    }

    /// Called once after the last page when the run was not aborted.
    fn on_run_complete(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl NotesProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::NotesConfig`].
pub type ProgressCallback = Arc<dyn NotesProgressCallback>;
