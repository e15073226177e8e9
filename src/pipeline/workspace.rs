//! Per-run temporary namespace for chunk artifacts, and its cleanup.
//!
//! Layout:
//!
//! ```text
//! <work_dir>/<input stem>.<run id>.pdfinvert/
//!     chunk_00000_00020.pdf
//!     chunk_00020_00040.pdf
//!     …
//! ```
//!
//! The run id is a fresh UUID, so two runs never share a namespace, even when
//! they process the same input file at the same time. The range bounds in
//! each file name keep concurrently written chunks apart within a run.

use crate::error::InvertError;
use crate::plan::PageRange;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const NAMESPACE_SUFFIX: &str = "pdfinvert";

/// The temporary directory owned by one run.
///
/// Dropping a `Workspace` runs [`Workspace::cleanup`], so artifacts are removed
/// on every exit path, including early returns and unwinding.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    run_id: Uuid,
}

/// What a cleanup pass did. Problems are warnings, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed_files: usize,
    pub removed_dir: bool,
    pub warnings: Vec<String>,
}

impl Workspace {
    /// Create a fresh namespace under `root` for a run over `input`.
    pub fn create(root: &Path, input: &Path) -> Result<Self, InvertError> {
        let run_id = Uuid::new_v4();
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let dir = root.join(format!("{stem}.{}.{NAMESPACE_SUFFIX}", run_id.simple()));

        std::fs::create_dir_all(&dir).map_err(|source| InvertError::WorkspaceFailed {
            path: dir.clone(),
            source,
        })?;
        debug!(dir = %dir.display(), "Created run namespace");

        Ok(Self { dir, run_id })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Where the worker for `range` writes its artifact.
    pub fn artifact_path(&self, range: PageRange) -> PathBuf {
        self.dir
            .join(format!("chunk_{:05}_{:05}.pdf", range.start, range.end))
    }

    /// Remove every file left in the namespace, then the directory itself.
    ///
    /// Best-effort and idempotent: a namespace that is already gone yields an
    /// empty report.
    pub fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                report.warn(format!("cannot list {}: {e}", self.dir.display()));
                return report;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    report.warn(format!("cannot read entry in {}: {e}", self.dir.display()));
                    continue;
                }
            };
            match std::fs::remove_file(&path) {
                Ok(()) => report.removed_files += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => report.warn(format!("cannot remove {}: {e}", path.display())),
            }
        }

        match std::fs::remove_dir(&self.dir) {
            Ok(()) => report.removed_dir = true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => report.warn(format!("cannot remove {}: {e}", self.dir.display())),
        }

        if report.removed_files > 0 || report.removed_dir {
            debug!(
                files = report.removed_files,
                dir = %self.dir.display(),
                "Cleaned up run namespace"
            );
        }
        report
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl CleanupReport {
    fn warn(&mut self, message: String) {
        warn!("cleanup: {}", message);
        self.warnings.push(message);
    }
}
