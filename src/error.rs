//! Error types for the pdf-invert library.
//!
//! The taxonomy mirrors the stages of a run:
//!
//! * [`PlanError`] — the document or configuration cannot be planned. Raised
//!   before any directory is created or any worker is started.
//! * [`TransformError`] — one page (or one artifact) of a chunk failed. Never
//!   returned on its own: the worker fails the whole chunk and the
//!   coordinator wraps it in [`InvertError::ChunkFailed`] with the range.
//! * [`MergeIntegrityError`] — the artifacts handed to the merger do not
//!   match the plan. The run must never produce a document with missing pages.
//! * [`InvertError`] — everything the top-level `invert*` functions return.
//!
//! Cleanup problems are not errors: they are logged and collected in
//! [`crate::pipeline::workspace::CleanupReport`], never escalated.

use crate::plan::PageRange;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-invert library.
#[derive(Debug, Error)]
pub enum InvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The page count or chunk configuration cannot be planned.
    #[error("Cannot plan conversion: {0}")]
    Planning(#[from] PlanError),

    /// A worker could not finish its chunk. The whole run is aborted.
    #[error("Chunk {range} failed: {source}")]
    ChunkFailed {
        range: PageRange,
        #[source]
        source: TransformError,
    },

    /// A worker panicked while processing its chunk.
    #[error("Worker for {range} panicked: {detail}")]
    WorkerPanicked { range: PageRange, detail: String },

    /// The completed artifacts do not match the planned ranges.
    #[error("Merge integrity check failed: {0}")]
    MergeIntegrity(#[from] MergeIntegrityError),

    /// An artifact could not be read or spliced into the output.
    #[error("Failed to merge '{path}': {detail}")]
    MergeFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the run's temporary namespace directory.
    #[error("Failed to create work directory '{path}': {source}")]
    WorkspaceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output PDF.
    #[error("Failed to write output file '{path}': {detail}")]
    OutputWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Point PDFIUM_LIB_PATH (or --pdfium-lib) at an existing libpdfium, or install\n\
one where the system loader can find it. Pre-built libraries are available\n\
from https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvertError {
    /// The page range this error is attributed to, if any.
    pub fn range(&self) -> Option<PageRange> {
        match self {
            InvertError::ChunkFailed { range, .. } | InvertError::WorkerPanicked { range, .. } => {
                Some(*range)
            }
            InvertError::MergeIntegrity(e) => Some(e.range()),
            _ => None,
        }
    }
}

/// The document or configuration cannot be split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("document has no pages")]
    EmptyDocument,

    #[error("chunk size must be at least 1")]
    ZeroChunkSize,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// A failure while transforming or persisting one chunk.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// The worker could not open its own handle on the source.
    #[error("could not open source '{path}': {detail}")]
    OpenFailed { path: PathBuf, detail: String },

    /// Page rasterisation failed.
    #[error("page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The inverted raster could not be added to the chunk document.
    #[error("page {page}: could not append inverted page: {detail}")]
    AppendFailed { page: usize, detail: String },

    /// The chunk document could not be written to disk.
    #[error("could not persist artifact '{path}': {detail}")]
    PersistFailed { path: PathBuf, detail: String },

    /// Another chunk failed first and cooperative cancellation is enabled.
    #[error("cancelled after another chunk failed")]
    Cancelled,
}

/// The artifact set handed to the merger does not match the plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeIntegrityError {
    #[error("no artifact for {0}")]
    MissingRange(PageRange),

    #[error("more than one artifact for {0}")]
    DuplicateRange(PageRange),

    #[error("artifact for {0} does not belong to the plan")]
    UnexpectedRange(PageRange),

    #[error("artifact for {range} holds {found} pages, expected {expected}")]
    PageCountMismatch {
        range: PageRange,
        expected: usize,
        found: usize,
    },
}

impl MergeIntegrityError {
    pub fn range(&self) -> PageRange {
        match self {
            MergeIntegrityError::MissingRange(r)
            | MergeIntegrityError::DuplicateRange(r)
            | MergeIntegrityError::UnexpectedRange(r) => *r,
            MergeIntegrityError::PageCountMismatch { range, .. } => *range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_failure_names_the_range() {
        let e = InvertError::ChunkFailed {
            range: PageRange::new(20, 40),
            source: TransformError::RenderFailed {
                page: 27,
                detail: "bad stream".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("pages 21-40"), "got: {msg}");
        assert!(msg.contains("page 27"), "got: {msg}");
        assert_eq!(e.range(), Some(PageRange::new(20, 40)));
    }

    #[test]
    fn planning_error_display() {
        let e = InvertError::from(PlanError::EmptyDocument);
        assert!(e.to_string().contains("no pages"));
        assert_eq!(e.range(), None);
    }

    #[test]
    fn merge_integrity_display() {
        let e = InvertError::from(MergeIntegrityError::MissingRange(PageRange::new(40, 47)));
        assert!(e.to_string().contains("pages 41-47"));
        assert_eq!(e.range(), Some(PageRange::new(40, 47)));
    }

    #[test]
    fn page_count_mismatch_display() {
        let e = MergeIntegrityError::PageCountMismatch {
            range: PageRange::new(0, 20),
            expected: 20,
            found: 19,
        };
        let msg = e.to_string();
        assert!(msg.contains("19"));
        assert!(msg.contains("20"));
    }
}
