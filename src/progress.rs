//! Progress-callback trait for per-chunk run events.
//!
//! Inject an [`Arc<dyn InversionProgressCallback>`] via
//! [`crate::config::InversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the document.
//!
//! Events are emitted by the coordinator only, one per completion message it
//! receives from the worker pool. Workers never touch progress state, so the
//! callback observes a single, serial stream of events even though chunks run
//! in parallel.
//!
//! # Example
//!
//! ```rust
//! use pdf_invert::{InversionConfig, InversionProgressCallback, PageRange};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl InversionProgressCallback for Log {
//!     fn on_chunk_complete(&self, range: PageRange, completed: usize, total: usize) {
//!         eprintln!("{range} done ({completed}/{total})");
//!     }
//! }
//!
//! let config = InversionConfig::builder()
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use crate::plan::PageRange;
use std::sync::Arc;

/// Called by the coordinator as chunks complete.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait InversionProgressCallback: Send + Sync {
    /// Called once after planning, before any worker starts.
    fn on_run_start(&self, total_pages: usize, total_chunks: usize) {
        let _ = (total_pages, total_chunks);
    }

    /// Called once per chunk, in completion order (not page order).
    ///
    /// # Arguments
    /// * `range`     — the chunk that just finished
    /// * `completed` — chunks finished so far, including this one
    /// * `total`     — chunks in the plan
    fn on_chunk_complete(&self, range: PageRange, completed: usize, total: usize) {
        let _ = (range, completed, total);
    }

    /// Called for the chunk failure that aborts the run.
    fn on_chunk_error(&self, range: PageRange, error: &str) {
        let _ = (range, error);
    }

    /// Called when every chunk is done and merging begins.
    fn on_merge_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called once after the output has been written.
    fn on_run_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl InversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::InversionConfig`].
pub type ProgressCallback = Arc<dyn InversionProgressCallback>;
