//! Merger: splice chunk artifacts into the final document in page order.
//!
//! Artifacts reach the merger in completion order. Sorting them by range start
//! is the only ordering step in the whole pipeline, and the integrity check in
//! front of it guarantees the sorted list is exactly the plan.

use super::document::RasterDocument;
use super::worker::ChunkArtifact;
use crate::error::{InvertError, MergeIntegrityError};
use crate::plan::{ChunkPlan, PageRange};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// What the merger produced.
#[derive(Debug, Clone)]
pub struct MergeSummary {
    pub pages: usize,
    pub manifest: Vec<PageRange>,
    pub output_bytes: u64,
}

/// Check `artifacts` against `plan` and return them sorted by range start.
pub fn order_artifacts(
    plan: &ChunkPlan,
    artifacts: Vec<ChunkArtifact>,
) -> Result<Vec<ChunkArtifact>, MergeIntegrityError> {
    let mut by_start: BTreeMap<usize, ChunkArtifact> = BTreeMap::new();
    for artifact in artifacts {
        let range = artifact.range;
        if by_start.insert(range.start, artifact).is_some() {
            return Err(MergeIntegrityError::DuplicateRange(range));
        }
    }

    let mut ordered = Vec::with_capacity(plan.ranges.len());
    for planned in &plan.ranges {
        let artifact = by_start
            .remove(&planned.start)
            .ok_or(MergeIntegrityError::MissingRange(*planned))?;
        if artifact.range != *planned {
            return Err(MergeIntegrityError::UnexpectedRange(artifact.range));
        }
        if artifact.pages != planned.len() {
            return Err(MergeIntegrityError::PageCountMismatch {
                range: *planned,
                expected: planned.len(),
                found: artifact.pages,
            });
        }
        ordered.push(artifact);
    }

    if let Some((_, extra)) = by_start.into_iter().next() {
        return Err(MergeIntegrityError::UnexpectedRange(extra.range));
    }
    Ok(ordered)
}

/// Merge `artifacts` into `output`.
///
/// Each artifact file is deleted as soon as its pages are in the output
/// document. The output appears atomically: it is written to a temporary
/// file next to `output` and renamed into place only once complete, so a
/// failed merge never leaves a half-written file at `output`.
pub fn merge_artifacts(
    plan: &ChunkPlan,
    artifacts: Vec<ChunkArtifact>,
    output: &Path,
    compact: bool,
) -> Result<MergeSummary, InvertError> {
    let ordered = order_artifacts(plan, artifacts)?;
    info!("Merging {} chunks into {}", ordered.len(), output.display());

    let mut document = RasterDocument::new();
    let mut manifest = Vec::with_capacity(ordered.len());

    for artifact in ordered {
        let chunk = lopdf::Document::load(&artifact.path).map_err(|e| InvertError::MergeFailed {
            path: artifact.path.clone(),
            detail: e.to_string(),
        })?;

        let found = chunk.get_pages().len();
        if found != artifact.range.len() {
            return Err(MergeIntegrityError::PageCountMismatch {
                range: artifact.range,
                expected: artifact.range.len(),
                found,
            }
            .into());
        }

        document
            .append_document(chunk)
            .map_err(|e| InvertError::MergeFailed {
                path: artifact.path.clone(),
                detail: e.to_string(),
            })?;

        if let Err(e) = std::fs::remove_file(&artifact.path) {
            warn!("Could not remove merged artifact {}: {}", artifact.path.display(), e);
        }
        debug!(range = %artifact.range, "Merged chunk");
        manifest.push(artifact.range);
    }

    let pages = document.page_count();
    let output_bytes = persist_atomically(document, output, compact)?;

    Ok(MergeSummary {
        pages,
        manifest,
        output_bytes,
    })
}

fn persist_atomically(
    document: RasterDocument,
    output: &Path,
    compact: bool,
) -> Result<u64, InvertError> {
    let write_failed = |detail: String| InvertError::OutputWriteFailed {
        path: output.to_path_buf(),
        detail,
    };

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| write_failed(e.to_string()))?;

    // Dropped (and deleted) on every early return below.
    let mut tmp = tempfile::Builder::new()
        .prefix(".pdfinvert-")
        .suffix(".pdf.tmp")
        .tempfile_in(&parent)
        .map_err(|e| write_failed(e.to_string()))?;

    {
        let mut writer = std::io::BufWriter::new(tmp.as_file_mut());
        document.write_to(&mut writer, compact).map_err(write_failed)?;
        writer.flush().map_err(|e| write_failed(e.to_string()))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| write_failed(e.to_string()))?;

    let bytes = tmp
        .as_file()
        .metadata()
        .map(|m| m.len())
        .map_err(|e| write_failed(e.to_string()))?;

    tmp.persist(output)
        .map_err(|e| write_failed(e.error.to_string()))?;
    Ok(bytes)
}
