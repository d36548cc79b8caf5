//! Directory scanning: input folder to an ordered list of image files.
//!
//! Only plain files whose extension is `.jpeg`, `.jpg`, or `.png`
//! (case-insensitive) qualify. Subdirectories are never entered and
//! non-image entries are silently excluded. A missing or unreadable
//! input directory is fatal for the whole run; there is nothing useful
//! to do without input.

use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions that qualify a file for processing (lowercase).
const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png"];

/// Check whether a path carries a qualifying image extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// List qualifying image files in `dir`, sorted by file name.
///
/// Sorting makes row order deterministic: repeated runs over an
/// unchanged folder produce byte-identical workbooks regardless of the
/// platform's directory enumeration order.
///
/// # Errors
/// * [`ExtractError::InputDirNotFound`] if `dir` does not exist
/// * [`ExtractError::NotADirectory`] if `dir` is not a directory
/// * [`ExtractError::InputDirNotReadable`] on permission failure
pub fn scan_images(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    if !dir.exists() {
        return Err(ExtractError::InputDirNotFound {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(ExtractError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ExtractError::InputDirNotReadable {
                path: dir.to_path_buf(),
            }
        } else {
            ExtractError::Internal(format!("Failed to read directory {}: {e}", dir.display()))
        }
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            ExtractError::Internal(format!("Failed to read directory entry: {e}"))
        })?;
        let path = entry.path();
        if path.is_file() && is_image_file(&path) {
            files.push(path);
        }
    }

    files.sort();
    debug!("Scanned {}: {} image files", dir.display(), files.len());
    Ok(files)
}
