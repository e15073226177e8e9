//! Chunk worker: render, invert and persist one page range.
//!
//! A worker is plain blocking code. The pool runs each one on tokio's blocking
//! thread pool because rasterisation is CPU-bound and pdfium is not async-safe.

use super::document::RasterDocument;
use super::invert::invert_page;
use super::render::{PageSource, RasterPage};
use crate::error::TransformError;
use crate::plan::PageRange;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// One unit of work: a page range of a source document and the path its
/// artifact must be written to.
#[derive(Debug, Clone)]
pub struct ChunkJob {
    pub range: PageRange,
    pub source: PathBuf,
    pub artifact: PathBuf,
}

/// The persisted result of a completed [`ChunkJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkArtifact {
    pub range: PageRange,
    pub path: PathBuf,
    pub pages: usize,
}

/// Run `job` to completion.
///
/// `cancel` is polled before each page; once it is set the job stops with
/// [`TransformError::Cancelled`]. On any error the artifact file is removed,
/// so a failed job never leaves anything behind.
pub fn run_chunk(
    job: &ChunkJob,
    source: &dyn PageSource,
    cancel: &AtomicBool,
) -> Result<ChunkArtifact, TransformError> {
    let started = Instant::now();
    let mut document = RasterDocument::new();

    source.render_range(&job.source, job.range, &mut |page: RasterPage| {
        if cancel.load(Ordering::Relaxed) {
            return Err(TransformError::Cancelled);
        }
        let page_num = page.index + 1;
        let page = invert_page(page);
        document
            .append_page(&page.image, page.width_pt, page.height_pt)
            .map_err(|e| TransformError::AppendFailed {
                page: page_num,
                detail: e.to_string(),
            })
    })?;

    if document.page_count() != job.range.len() {
        return Err(TransformError::RenderFailed {
            page: job.range.start + document.page_count() + 1,
            detail: format!(
                "source yielded {} of {} pages",
                document.page_count(),
                job.range.len()
            ),
        });
    }

    let pages = document.page_count();
    if let Err(detail) = document.save(&job.artifact, false) {
        remove_partial(&job.artifact);
        return Err(TransformError::PersistFailed {
            path: job.artifact.clone(),
            detail,
        });
    }

    debug!(
        range = %job.range,
        pages,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Chunk written"
    );

    Ok(ChunkArtifact {
        range: job.range,
        path: job.artifact.clone(),
        pages,
    })
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial artifact {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial artifact {}: {}", path.display(), e),
    }
}
