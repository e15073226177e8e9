//! Chunk planning: split a page count into contiguous, ordered page ranges.
//!
//! Every range becomes one unit of parallel work. The planner is a pure
//! function of the page count and configuration, so the plan can be computed
//! (and printed with `--dry-run`) before anything touches the filesystem.
//!
//! ## Size tiers
//!
//! | Pages      | Chunk size |
//! |------------|------------|
//! | > 1000     | 10         |
//! | > 500      | 15         |
//! | otherwise  | 20         |
//!
//! Bigger documents get smaller chunks: per-worker memory stays bounded and the
//! progress bar moves in finer steps. A manual chunk size overrides the tiers.

use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open interval `[start, end)` of zero-based page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of pages covered by the range.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, page: usize) -> bool {
        page >= self.start && page < self.end
    }

    /// Iterate the page indices of the range in ascending order.
    pub fn pages(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1-indexed and inclusive, the way people count pages.
        write!(f, "pages {}-{}", self.start + 1, self.end)
    }
}

/// The ordered set of ranges for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub total_pages: usize,
    pub chunk_size: usize,
    /// Worker slots the pool will actually use: never more than the number of ranges.
    pub workers: usize,
    pub ranges: Vec<PageRange>,
}

/// Chunk size picked by the size-tier policy.
pub fn tiered_chunk_size(total_pages: usize) -> usize {
    if total_pages > 1000 {
        10
    } else if total_pages > 500 {
        15
    } else {
        20
    }
}

impl ChunkPlan {
    /// Plan `total_pages` for a pool of `concurrency` workers.
    ///
    /// `chunk_size` overrides the tier policy when set.
    pub fn new(
        total_pages: usize,
        concurrency: usize,
        chunk_size: Option<usize>,
    ) -> Result<Self, PlanError> {
        if total_pages == 0 {
            return Err(PlanError::EmptyDocument);
        }
        if concurrency == 0 {
            return Err(PlanError::ZeroConcurrency);
        }
        let chunk_size = match chunk_size {
            Some(0) => return Err(PlanError::ZeroChunkSize),
            Some(n) => n,
            None => tiered_chunk_size(total_pages),
        };

        let ranges: Vec<PageRange> = (0..total_pages)
            .step_by(chunk_size)
            .map(|start| PageRange::new(start, (start + chunk_size).min(total_pages)))
            .collect();

        Ok(Self {
            total_pages,
            chunk_size,
            workers: concurrency.min(ranges.len()),
            ranges,
        })
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
