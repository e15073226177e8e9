//! Input validation: make sure the user-supplied path is a readable PDF.
//!
//! We check the `%PDF` magic bytes before planning so callers get a
//! meaningful error rather than a rasteriser failure in every worker.

use crate::error::InvertError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate existence, read permission and PDF magic bytes.
pub fn validate_input(path: &Path) -> Result<PathBuf, InvertError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(InvertError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
                return Err(InvertError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(InvertError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(InvertError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}
