//! Result types returned by a successful run.

use crate::plan::PageRange;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The outcome of a successful inversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InversionOutput {
    /// Where the inverted document was written.
    pub output_path: PathBuf,
    /// Pages in the output; always equal to the source page count.
    pub page_count: usize,
    /// Ranges that contributed to the output, in page order.
    pub manifest: Vec<PageRange>,
    pub stats: InversionStats,
}

/// Timing and sizing figures for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InversionStats {
    pub total_pages: usize,
    pub chunks: usize,
    pub chunk_size: usize,
    pub workers: usize,
    /// Wall-clock time spent in the worker pool.
    pub transform_duration_ms: u64,
    pub merge_duration_ms: u64,
    pub total_duration_ms: u64,
    pub output_bytes: u64,
}
